use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use crate::arena::Arena;
use crate::config::Limits;
use crate::error::{FsError, FsResult};
use crate::model::*;
use crate::naming::{copy_name, trash_name, validate_name};

pub const ROOT_NAME: &str = "C:";
pub const TRASH_NAME: &str = ".trash";

/// The simulated drive: a capacity-bounded K-ary tree with a trash directory,
/// a working-directory cursor and a disk quota.
///
/// `disk_usage` always equals the sum of file sizes reachable from the root,
/// trash included. Every mutating operation validates first and mutates second,
/// so a failed call leaves the tree untouched.
#[derive(Debug, Clone)]
pub struct FileSystemTree {
    pub(crate) limits: Limits,
    pub(crate) arena: Arena,
    pub(crate) root: NodeId,
    pub(crate) trash: NodeId,
    pub(crate) cwd: NodeId,
    pub(crate) disk_usage: u64,
}

impl FileSystemTree {
    pub fn new(limits: Limits) -> FsResult<Self> {
        if limits.max_children == 0 {
            return Err(FsError::InvalidArgument(
                "max_children must leave room for the trash".into(),
            ));
        }
        let mut arena = Arena::new();
        let root = arena.alloc_dir(ROOT_NAME);
        let trash = arena.alloc_dir(TRASH_NAME);
        arena.add_child(root, trash, Some(limits.max_children))?;
        Ok(Self {
            limits,
            arena,
            root,
            trash,
            cwd: root,
            disk_usage: 0,
        })
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn trash_id(&self) -> NodeId {
        self.trash
    }

    pub fn cwd_id(&self) -> NodeId {
        self.cwd
    }

    pub fn cwd_path(&self) -> String {
        self.arena.path(self.cwd)
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.arena.get(id)
    }

    pub fn path_of(&self, id: NodeId) -> FsResult<String> {
        self.lookup(id)?;
        Ok(self.arena.path(id))
    }

    pub fn get_disk_usage(&self) -> u64 {
        self.disk_usage
    }

    pub fn free_space(&self) -> u64 {
        self.limits.max_disk_size.saturating_sub(self.disk_usage)
    }

    /// True for the trash itself and anything below it.
    pub fn is_in_trash(&self, id: NodeId) -> bool {
        self.arena.is_descendant_of(id, self.trash)
    }

    fn capacity_of(&self, dir: NodeId) -> Option<usize> {
        if dir == self.trash && self.limits.exempt_trash {
            None
        } else {
            Some(self.limits.max_children)
        }
    }

    fn lookup(&self, id: NodeId) -> FsResult<&TreeNode> {
        self.arena.get(id).ok_or_else(|| self.arena.missing(id))
    }

    fn writable_dir(&self, id: NodeId) -> FsResult<()> {
        let node = self.lookup(id)?;
        if !node.is_dir() {
            return Err(FsError::NotADirectory(self.arena.path(id)));
        }
        if self.is_in_trash(id) {
            return Err(FsError::InTrash(self.arena.path(id)));
        }
        Ok(())
    }

    fn reserve(&self, bytes: u64) -> FsResult<()> {
        let fits = self
            .disk_usage
            .checked_add(bytes)
            .is_some_and(|total| total <= self.limits.max_disk_size);
        if !fits {
            let available = self.free_space();
            warn!(requested = bytes, available, "disk quota exceeded");
            return Err(FsError::QuotaExceeded {
                requested: bytes,
                available,
            });
        }
        Ok(())
    }

    // ---- navigation ----

    #[instrument(skip(self))]
    pub fn mkdir(&mut self, name: &str) -> FsResult<NodeId> {
        validate_name(name)?;
        self.writable_dir(self.cwd)?;
        self.arena.check_insert(self.cwd, name, self.capacity_of(self.cwd))?;

        let id = self.arena.alloc_dir(name);
        self.arena.add_child(self.cwd, id, self.capacity_of(self.cwd))?;
        debug!(path = %self.arena.path(id), "created directory");
        Ok(id)
    }

    pub fn cd(&mut self, name: &str) -> FsResult<()> {
        if name == ".." {
            if let Some(parent) = self.arena[self.cwd].parent {
                self.cwd = parent;
            }
            return Ok(());
        }
        let id = self.arena.get_child(self.cwd, name)?;
        self.cd_to(id)
    }

    /// Moves the cursor straight to `id`, e.g. to the folder holding a search hit.
    pub fn cd_to(&mut self, id: NodeId) -> FsResult<()> {
        if !self.lookup(id)?.is_dir() {
            return Err(FsError::NotADirectory(self.arena.path(id)));
        }
        self.cwd = id;
        Ok(())
    }

    pub fn ls(&self) -> Vec<String> {
        self.child_names(self.cwd)
    }

    pub fn ls_trash(&self) -> Vec<String> {
        self.child_names(self.trash)
    }

    fn child_names(&self, dir: NodeId) -> Vec<String> {
        self.child_names_of(&self.arena[dir])
    }

    pub fn stat(&self, name: &str) -> FsResult<NodeStat> {
        let id = self.arena.get_child(self.cwd, name)?;
        Ok(self.stat_id(id))
    }

    fn stat_id(&self, id: NodeId) -> NodeStat {
        let node = &self.arena[id];
        let kind = match node.kind {
            NodeKind::File { .. } => EntryKind::File,
            NodeKind::Dir { .. } => EntryKind::Dir,
        };
        NodeStat {
            id,
            name: node.name.clone(),
            path: self.arena.path(id),
            kind,
            created: node.created,
            modified: node.modified,
            accessed: node.accessed,
            size: self.arena.subtree_size(id),
            children: self.child_names_of(node),
        }
    }

    fn child_names_of(&self, node: &TreeNode) -> Vec<String> {
        node.children()
            .iter()
            .map(|c| self.arena[*c].name.clone())
            .collect()
    }

    /// Resolves `/a/b` from the root or `a/../b` from the cursor.
    pub fn resolve_path(&self, path: &str) -> FsResult<NodeId> {
        let mut cur = if path.starts_with(PATH_DELIMITER) {
            self.root
        } else {
            self.cwd
        };
        for part in path.split(PATH_DELIMITER) {
            match part {
                "" | "." => {}
                ".." => {
                    if let Some(parent) = self.arena[cur].parent {
                        cur = parent;
                    }
                }
                name => {
                    if !self.arena[cur].is_dir() {
                        return Err(FsError::NotADirectory(self.arena.path(cur)));
                    }
                    cur = self.arena.get_child(cur, name)?;
                }
            }
        }
        Ok(cur)
    }

    // ---- file lifecycle ----

    /// Creates a file in the cursor directory. When `content` is given its byte
    /// length must equal `size`.
    #[instrument(skip(self, content))]
    pub fn touch(&mut self, name: &str, size: u64, content: Option<Content>) -> FsResult<NodeId> {
        validate_name(name)?;
        if let Some(c) = &content {
            if c.len() != size {
                return Err(FsError::InvalidArgument(format!(
                    "size {size} does not match content length {}",
                    c.len()
                )));
            }
        }
        self.writable_dir(self.cwd)?;
        self.reserve(size)?;
        self.arena.check_insert(self.cwd, name, self.capacity_of(self.cwd))?;

        let id = self.arena.alloc_file(name, size, content);
        self.arena.add_child(self.cwd, id, self.capacity_of(self.cwd))?;
        self.disk_usage += size;
        debug!(path = %self.arena.path(id), size, usage = self.disk_usage, "created file");
        Ok(id)
    }

    /// Creates a file whose size is the byte length of `content`.
    pub fn touch_with(&mut self, name: &str, content: impl Into<Content>) -> FsResult<NodeId> {
        let content = content.into();
        self.touch(name, content.len(), Some(content))
    }

    #[instrument(skip(self))]
    pub fn update_file_size(&mut self, file: NodeId, new_size: u64) -> FsResult<()> {
        let old = match &self.lookup(file)?.kind {
            NodeKind::File { size, .. } => *size,
            NodeKind::Dir { .. } => return Err(FsError::IsADirectory(self.arena.path(file))),
        };
        if new_size > old {
            self.reserve(new_size - old)?;
        }

        self.disk_usage = self.disk_usage - old + new_size;
        if let Some(node) = self.arena.get_mut(file) {
            if let NodeKind::File { size, .. } = &mut node.kind {
                *size = new_size;
            }
            node.touch_modified();
        }
        debug!(old, new_size, usage = self.disk_usage, "resized file");
        Ok(())
    }

    /// Replaces a file's content. The quota is checked against the new length
    /// before anything is written.
    pub fn write_file(&mut self, file: NodeId, content: impl Into<Content>) -> FsResult<()> {
        let content = content.into();
        if self.lookup(file)?.is_dir() {
            return Err(FsError::IsADirectory(self.arena.path(file)));
        }
        if self.is_in_trash(file) {
            return Err(FsError::InTrash(self.arena.path(file)));
        }
        self.update_file_size(file, content.len())?;
        if let Some(node) = self.arena.get_mut(file) {
            if let NodeKind::File { content: slot, .. } = &mut node.kind {
                *slot = Some(content);
            }
        }
        Ok(())
    }

    pub fn edit(&mut self, name: &str, content: impl Into<Content>) -> FsResult<()> {
        let id = self.arena.get_child(self.cwd, name)?;
        self.write_file(id, content)
    }

    pub fn read_file(&mut self, file: NodeId) -> FsResult<Option<&Content>> {
        if self.lookup(file)?.is_dir() {
            return Err(FsError::IsADirectory(self.arena.path(file)));
        }
        Ok(self.arena.get_mut(file).and_then(|node| {
            node.touch_accessed();
            node.content()
        }))
    }

    pub fn cat(&mut self, name: &str) -> FsResult<Option<&Content>> {
        let id = self.arena.get_child(self.cwd, name)?;
        self.read_file(id)
    }

    // ---- trash ----

    /// Removes a child of the cursor directory, either into the trash or for good.
    /// Inside the trash every removal is permanent.
    #[instrument(skip(self))]
    pub fn rm(&mut self, name: &str, to_trash: bool) -> FsResult<()> {
        let id = self.arena.get_child(self.cwd, name)?;
        if id == self.trash {
            return Err(FsError::InvalidArgument("the trash cannot be removed".into()));
        }
        let size_to_free = self.arena.subtree_size(id);

        if to_trash && !self.is_in_trash(self.cwd) {
            let new_name = trash_name(name, |n| self.arena.has_child(self.trash, n));
            self.arena.check_room(self.trash, self.capacity_of(self.trash))?;

            self.arena.remove_child(self.cwd, name)?;
            self.arena.rename(id, new_name);
            if let Some(node) = self.arena.get_mut(id) {
                node.original_parent = Some(self.cwd);
            }
            self.arena.add_child(self.trash, id, self.capacity_of(self.trash))?;
            debug!(path = %self.arena.path(id), "moved to trash");
        } else {
            self.arena.remove_child(self.cwd, name)?;
            self.arena.remove_subtree(id);
            self.disk_usage -= size_to_free;
            debug!(name, freed = size_to_free, "deleted permanently");
        }
        Ok(())
    }

    /// Moves a trashed node back to `target`, its original parent, or the root,
    /// in that order of preference. A clashing name gets a numeric suffix.
    #[instrument(skip(self))]
    pub fn restore(&mut self, name: &str, target: Option<NodeId>) -> FsResult<NodeId> {
        let id = self.arena.get_child(self.trash, name)?;
        let target = match target {
            Some(t) => {
                self.writable_dir(t)?;
                t
            }
            None => self.arena[id]
                .original_parent
                .filter(|p| self.is_live_dir(*p))
                .unwrap_or(self.root),
        };

        let new_name = trash_name(name, |n| self.arena.has_child(target, n));
        self.arena.check_room(target, self.capacity_of(target))?;

        self.arena.remove_child(self.trash, name)?;
        self.arena.rename(id, new_name);
        if let Some(node) = self.arena.get_mut(id) {
            node.original_parent = None;
        }
        self.arena.add_child(target, id, self.capacity_of(target))?;
        debug!(path = %self.arena.path(id), "restored from trash");
        Ok(id)
    }

    fn is_live_dir(&self, id: NodeId) -> bool {
        self.arena.get(id).is_some_and(|n| n.is_dir())
            && self.arena.is_descendant_of(id, self.root)
            && !self.is_in_trash(id)
    }

    /// Permanently discards trashed nodes: all of them, or only `names`.
    /// Returns the number of bytes released from the quota.
    #[instrument(skip(self))]
    pub fn empty_trash(&mut self, names: Option<&[String]>) -> FsResult<u64> {
        let victims: Vec<NodeId> = match names {
            None => self.arena[self.trash].children().to_vec(),
            Some(names) => {
                let mut seen = HashSet::new();
                let mut ids = Vec::new();
                for name in names {
                    let id = self.arena.get_child(self.trash, name)?;
                    if seen.insert(id) {
                        ids.push(id);
                    }
                }
                ids
            }
        };

        let mut freed = 0;
        for id in victims {
            if self.arena.is_descendant_of(self.cwd, id) {
                self.cwd = self.trash;
            }
            let size = self.arena.subtree_size(id);
            let name = self.arena[id].name.clone();
            self.arena.remove_child(self.trash, &name)?;
            self.arena.remove_subtree(id);
            self.disk_usage -= size;
            freed += size;
        }
        debug!(freed, usage = self.disk_usage, "emptied trash");
        Ok(freed)
    }

    // ---- copy / paste ----

    /// Duplicates `node` and its whole subtree into `target` (default: the cursor).
    /// The copy gets fresh ids and timestamps and shares nothing with the source.
    #[instrument(skip(self))]
    pub fn copy_node(&mut self, node: NodeId, target: Option<NodeId>) -> FsResult<NodeId> {
        let src = self.lookup(node)?;
        if node == self.root || node == self.trash {
            return Err(FsError::InvalidArgument(format!(
                "{} cannot be copied",
                self.arena.path(node)
            )));
        }
        let base = src.name.clone();
        let target = target.unwrap_or(self.cwd);
        self.writable_dir(target)?;

        let bytes = self.arena.subtree_size(node);
        self.reserve(bytes)?;
        let name = copy_name(&base, |n| self.arena.has_child(target, n));
        self.arena.check_room(target, self.capacity_of(target))?;

        let copy = self.arena.clone_subtree(node)?;
        self.arena.rename(copy, name);
        if let Err(e) = self.arena.add_child(target, copy, self.capacity_of(target)) {
            self.arena.remove_subtree(copy);
            return Err(e);
        }
        self.disk_usage += bytes;
        debug!(path = %self.arena.path(copy), bytes, "pasted copy");
        Ok(copy)
    }

    /// `copy_node` for a child of the cursor directory.
    pub fn copy(&mut self, name: &str, target: Option<NodeId>) -> FsResult<NodeId> {
        let id = self.arena.get_child(self.cwd, name)?;
        self.copy_node(id, target)
    }

    // ---- search ----

    pub fn search(&self, query: &str, from: Option<NodeId>) -> FsResult<Vec<SearchHit>> {
        let from = from.unwrap_or(self.root);
        self.lookup(from)?;
        crate::search::substring(&self.arena, from, query)
    }

    pub fn fuzzy_search(&self, query: &str, from: Option<NodeId>) -> FsResult<Vec<SearchHit>> {
        let from = from.unwrap_or(self.root);
        self.lookup(from)?;
        crate::search::fuzzy(&self.arena, from, query)
    }

    // ---- consistency ----

    /// Walks the whole tree and checks every structural invariant: parent links,
    /// single ownership, name uniqueness, fan-out and the usage counter.
    pub fn check_consistency(&self) -> FsResult<()> {
        let bad = |msg: String| Err(FsError::Snapshot(msg));

        for (id, what) in [(self.root, "root"), (self.trash, "trash"), (self.cwd, "cwd")] {
            match self.arena.get(id) {
                Some(n) if n.is_dir() => {}
                _ => return bad(format!("{what} {id} is not a directory")),
            }
        }
        if self.arena[self.root].parent.is_some() {
            return bad("root has a parent".into());
        }
        if self.arena[self.trash].parent != Some(self.root) {
            return bad("trash is not a child of root".into());
        }

        let mut seen = HashSet::new();
        let mut total: u64 = 0;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                return bad(format!("{id} is reachable twice"));
            }
            let node = &self.arena[id];
            total = total.saturating_add(node.size());

            let children = node.children();
            if let Some(limit) = self.capacity_of(id) {
                if children.len() > limit {
                    return bad(format!("{id} holds {} children", children.len()));
                }
            }
            let mut names = HashSet::new();
            for child in children {
                let Some(c) = self.arena.get(*child) else {
                    return bad(format!("{id} lists missing child {child}"));
                };
                if c.parent != Some(id) {
                    return bad(format!("{child} does not point back at {id}"));
                }
                if validate_name(&c.name).is_err() || !names.insert(c.name.as_str()) {
                    return bad(format!("bad or duplicate name '{}' in {id}", c.name));
                }
                stack.push(*child);
            }
        }

        if seen.len() != self.arena.len() {
            return bad(format!(
                "{} nodes are unreachable",
                self.arena.len() - seen.len()
            ));
        }
        if total != self.disk_usage {
            return bad(format!(
                "disk usage is {} but files add up to {total}",
                self.disk_usage
            ));
        }
        if total > self.limits.max_disk_size {
            return bad("disk usage exceeds the quota".into());
        }
        Ok(())
    }
}
