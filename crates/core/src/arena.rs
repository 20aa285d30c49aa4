use std::collections::BTreeMap;
use std::ops::Index;

use tracing::warn;

use crate::error::{FsError, FsResult};
use crate::model::*;

/// Owns every node of a tree. Directories refer to their children by id and
/// children refer back to their parent by id; neither link owns anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arena {
    nodes: BTreeMap<NodeId, TreeNode>,
    next_id: u64,
}

impl Index<NodeId> for Arena {
    type Output = TreeNode;

    fn index(&self, id: NodeId) -> &TreeNode {
        &self.nodes[&id]
    }
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(nodes: BTreeMap<NodeId, TreeNode>, next_id: u64) -> Self {
        Self { nodes, next_id }
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn alloc_dir(&mut self, name: &str) -> NodeId {
        let id = self.alloc_id();
        self.nodes.insert(id, TreeNode::new_dir(id, name));
        id
    }

    pub fn alloc_file(&mut self, name: &str, size: u64, content: Option<Content>) -> NodeId {
        let id = self.alloc_id();
        self.nodes.insert(id, TreeNode::new_file(id, name, size, content));
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.values()
    }

    /// Ancestor names joined by the delimiter, root excluded. The root is `/`.
    pub fn path(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut cur = self.get(id);
        while let Some(node) = cur {
            let Some(parent) = node.parent else { break };
            parts.push(node.name.as_str());
            cur = self.get(parent);
        }
        if parts.is_empty() {
            return PATH_DELIMITER.to_string();
        }
        parts.reverse();
        let mut path = String::new();
        for part in parts {
            path.push(PATH_DELIMITER);
            path.push_str(part);
        }
        path
    }

    pub fn has_child(&self, dir: NodeId, name: &str) -> bool {
        self.find_child(dir, name).is_some()
    }

    fn find_child(&self, dir: NodeId, name: &str) -> Option<(usize, NodeId)> {
        self.get(dir)?
            .children()
            .iter()
            .enumerate()
            .find(|(_, c)| self[**c].name == name)
            .map(|(i, c)| (i, *c))
    }

    /// Fails with `CapacityExceeded` when `dir` already holds `limit` children.
    pub fn check_room(&self, dir: NodeId, limit: Option<usize>) -> FsResult<()> {
        let node = self.dir(dir)?;
        if let Some(limit) = limit {
            if node.children().len() >= limit {
                let dir = self.path(dir);
                warn!(%dir, limit, "directory is full");
                return Err(FsError::CapacityExceeded { dir, limit });
            }
        }
        Ok(())
    }

    /// Everything `add_child` would check, without mutating.
    pub fn check_insert(&self, dir: NodeId, name: &str, limit: Option<usize>) -> FsResult<()> {
        self.check_room(dir, limit)?;
        if self.has_child(dir, name) {
            return Err(FsError::NameCollision {
                name: name.to_string(),
                dir: self.path(dir),
            });
        }
        Ok(())
    }

    pub fn add_child(&mut self, dir: NodeId, child: NodeId, limit: Option<usize>) -> FsResult<()> {
        let name = self
            .get(child)
            .map(|c| c.name.clone())
            .ok_or_else(|| self.missing(child))?;
        self.check_insert(dir, &name, limit)?;

        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = Some(dir);
        }
        if let Some(d) = self.nodes.get_mut(&dir) {
            if let NodeKind::Dir { children } = &mut d.kind {
                children.push(child);
            }
            d.touch_modified();
        }
        Ok(())
    }

    pub fn get_child(&self, dir: NodeId, name: &str) -> FsResult<NodeId> {
        self.dir(dir)?;
        self.find_child(dir, name)
            .map(|(_, id)| id)
            .ok_or_else(|| FsError::NotFound {
                name: name.to_string(),
                dir: self.path(dir),
            })
    }

    /// Detaches the named child. The node stays in the arena with no parent.
    pub fn remove_child(&mut self, dir: NodeId, name: &str) -> FsResult<NodeId> {
        self.dir(dir)?;
        let (index, id) = self.find_child(dir, name).ok_or_else(|| FsError::NotFound {
            name: name.to_string(),
            dir: self.path(dir),
        })?;

        if let Some(d) = self.nodes.get_mut(&dir) {
            if let NodeKind::Dir { children } = &mut d.kind {
                children.remove(index);
            }
            d.touch_modified();
        }
        if let Some(c) = self.nodes.get_mut(&id) {
            c.parent = None;
        }
        Ok(id)
    }

    /// Ids of the subtree rooted at `id`, parents before children.
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let Some(node) = self.get(cur) else { continue };
            out.push(cur);
            stack.extend(node.children().iter().rev().copied());
        }
        out
    }

    /// Sum of file sizes under `id`, `id` included.
    pub fn subtree_size(&self, id: NodeId) -> u64 {
        self.preorder(id)
            .into_iter()
            .map(|n| self[n].size())
            .sum()
    }

    /// Drops a detached subtree from the arena.
    pub fn remove_subtree(&mut self, id: NodeId) {
        for n in self.preorder(id) {
            self.nodes.remove(&n);
        }
    }

    /// Deep copy of the subtree at `id` under fresh ids and fresh timestamps.
    /// The copy is detached; content is duplicated, never shared.
    pub fn clone_subtree(&mut self, id: NodeId) -> FsResult<NodeId> {
        let top = self.clone_node(id)?;
        let mut stack = vec![(id, top)];
        while let Some((src, dst)) = stack.pop() {
            let children = self.get(src).map(|n| n.children().to_vec()).unwrap_or_default();
            for child in children {
                let copy = self.clone_node(child)?;
                if let Some(n) = self.nodes.get_mut(&copy) {
                    n.parent = Some(dst);
                }
                if let Some(NodeKind::Dir { children }) =
                    self.nodes.get_mut(&dst).map(|n| &mut n.kind)
                {
                    children.push(copy);
                }
                stack.push((child, copy));
            }
        }
        Ok(top)
    }

    // One node, no children linked yet.
    fn clone_node(&mut self, id: NodeId) -> FsResult<NodeId> {
        let src = self.get(id).ok_or_else(|| self.missing(id))?;
        let name = src.name.clone();
        let file = match &src.kind {
            NodeKind::File { size, content } => Some((*size, content.clone())),
            NodeKind::Dir { .. } => None,
        };
        Ok(match file {
            Some((size, content)) => self.alloc_file(&name, size, content),
            None => self.alloc_dir(&name),
        })
    }

    /// True when `ancestor` is `id` itself or lies on its parent chain.
    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if n == ancestor {
                return true;
            }
            cur = self.get(n).and_then(|node| node.parent);
        }
        false
    }

    pub fn rename(&mut self, id: NodeId, name: String) {
        if let Some(n) = self.nodes.get_mut(&id) {
            n.name = name;
        }
    }

    fn dir(&self, id: NodeId) -> FsResult<&TreeNode> {
        let node = self.get(id).ok_or_else(|| self.missing(id))?;
        if !node.is_dir() {
            return Err(FsError::NotADirectory(self.path(id)));
        }
        Ok(node)
    }

    pub(crate) fn missing(&self, id: NodeId) -> FsError {
        FsError::NotFound {
            name: id.to_string(),
            dir: "the tree".into(),
        }
    }
}
