use crate::model::*;
use crate::tree::FileSystemTree;

/// One row per node reachable from the root, parents first.
pub fn to_csv(tree: &FileSystemTree, mut w: impl std::io::Write) -> csv::Result<()> {
    let arena = tree.arena();
    let mut writer = csv::Writer::from_writer(&mut w);
    writer.write_record(["path", "name", "kind", "size", "modified"])?;
    for id in arena.preorder(tree.root_id()) {
        let n = &arena[id];
        let kind = match n.kind {
            NodeKind::File { .. } => "file",
            NodeKind::Dir { .. } => "dir",
        };
        writer.write_record([
            arena.path(id),
            n.name.clone(),
            kind.to_string(),
            arena.subtree_size(id).to_string(),
            n.modified.to_rfc3339(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_json(tree: &FileSystemTree) -> serde_json::Value {
    let arena = tree.arena();
    serde_json::json!({
        "root": tree.root_id().0,
        "trash": tree.trash_id().0,
        "cwd": tree.cwd_path(),
        "disk_usage": tree.get_disk_usage(),
        "max_disk_size": tree.limits().max_disk_size,
        "nodes": arena.preorder(tree.root_id()).into_iter().map(|id| {
            let n = &arena[id];
            serde_json::json!({
                "id": id.0,
                "parent": n.parent.as_ref().map(|p| p.0),
                "path": arena.path(id),
                "name": n.name,
                "kind": match n.kind { NodeKind::File { .. } => "file", NodeKind::Dir { .. } => "dir" },
                "size": arena.subtree_size(id),
                "children": n.children().iter().map(|c| c.0).collect::<Vec<_>>()
            })
        }).collect::<Vec<_>>()
    })
}
