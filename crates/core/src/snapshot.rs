//! Save and load a whole tree, usage counter and cursor included.
//!
//! The blob is JSON. Nodes are written in ascending id order and every link is
//! an id, so saving a loaded snapshot reproduces the original bytes.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::arena::Arena;
use crate::config::Limits;
use crate::error::{FsError, FsResult};
use crate::model::{NodeId, TreeNode};
use crate::tree::FileSystemTree;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    limits: Limits,
    root: NodeId,
    trash: NodeId,
    cwd: NodeId,
    disk_usage: u64,
    next_id: u64,
    nodes: Vec<TreeNode>,
}

pub fn save(tree: &FileSystemTree) -> FsResult<Vec<u8>> {
    let snap = Snapshot {
        version: SNAPSHOT_VERSION,
        limits: tree.limits,
        root: tree.root,
        trash: tree.trash,
        cwd: tree.cwd,
        disk_usage: tree.disk_usage,
        next_id: tree.arena.next_id(),
        nodes: tree.arena.iter().cloned().collect(),
    };
    let blob = serde_json::to_vec(&snap)?;
    debug!(nodes = snap.nodes.len(), bytes = blob.len(), "saved snapshot");
    Ok(blob)
}

pub fn load(blob: &[u8]) -> FsResult<FileSystemTree> {
    let snap: Snapshot = serde_json::from_slice(blob)?;
    if snap.version != SNAPSHOT_VERSION {
        return Err(FsError::Snapshot(format!(
            "unsupported version {} (expected {SNAPSHOT_VERSION})",
            snap.version
        )));
    }
    if snap.limits.max_children == 0 {
        return Err(FsError::Snapshot("max_children is zero".into()));
    }

    let mut nodes = BTreeMap::new();
    for node in snap.nodes {
        if node.id.0 >= snap.next_id {
            return Err(FsError::Snapshot(format!(
                "{} is not below next id {}",
                node.id, snap.next_id
            )));
        }
        if let Some(dup) = nodes.insert(node.id, node) {
            return Err(FsError::Snapshot(format!("{} listed twice", dup.id)));
        }
    }
    for node in nodes.values() {
        if node.original_parent.is_some() && node.parent != Some(snap.trash) {
            return Err(FsError::Snapshot(format!(
                "{} remembers an original parent outside the trash",
                node.id
            )));
        }
    }

    let tree = FileSystemTree {
        limits: snap.limits,
        arena: Arena::from_parts(nodes, snap.next_id),
        root: snap.root,
        trash: snap.trash,
        cwd: snap.cwd,
        disk_usage: snap.disk_usage,
    };
    tree.check_consistency()?;
    debug!(nodes = tree.arena.len(), usage = tree.disk_usage, "loaded snapshot");
    Ok(tree)
}

pub fn save_to_path(tree: &FileSystemTree, path: impl AsRef<Path>) -> FsResult<()> {
    let path = path.as_ref();
    std::fs::write(path, save(tree)?)?;
    info!(path = %path.display(), "snapshot written");
    Ok(())
}

pub fn load_from_path(path: impl AsRef<Path>) -> FsResult<FileSystemTree> {
    let path = path.as_ref();
    let tree = load(&std::fs::read(path)?)?;
    info!(path = %path.display(), "snapshot read");
    Ok(tree)
}
