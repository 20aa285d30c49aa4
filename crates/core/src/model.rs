use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator between path components. The root's path is the separator alone.
pub const PATH_DELIMITER: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Payload of a file. Its byte length is what the file is billed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
}

impl Content {
    pub fn len(&self) -> u64 {
        match self {
            Content::Text(s) => s.len() as u64,
            Content::Bytes(b) => b.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s),
            Content::Bytes(_) => None,
        }
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

impl From<Vec<u8>> for Content {
    fn from(b: Vec<u8>) -> Self {
        Content::Bytes(b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    File {
        size: u64,
        content: Option<Content>,
    },
    Dir {
        children: Vec<NodeId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub name: String,
    pub parent: Option<NodeId>,
    /// Where the node lived before it was moved to the trash. Only set while trashed.
    pub original_parent: Option<NodeId>,
    pub kind: NodeKind,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
}

impl TreeNode {
    pub fn new_dir(id: NodeId, name: impl Into<String>) -> Self {
        Self::new(id, name.into(), NodeKind::Dir { children: Vec::new() })
    }

    pub fn new_file(id: NodeId, name: impl Into<String>, size: u64, content: Option<Content>) -> Self {
        Self::new(id, name.into(), NodeKind::File { size, content })
    }

    fn new(id: NodeId, name: String, kind: NodeKind) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            parent: None,
            original_parent: None,
            kind,
            created: now,
            modified: now,
            accessed: now,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Dir { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    /// Billed size of a file; directories have none of their own.
    pub fn size(&self) -> u64 {
        match &self.kind {
            NodeKind::File { size, .. } => *size,
            NodeKind::Dir { .. } => 0,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Dir { children } => children,
            NodeKind::File { .. } => &[],
        }
    }

    pub fn content(&self) -> Option<&Content> {
        match &self.kind {
            NodeKind::File { content, .. } => content.as_ref(),
            NodeKind::Dir { .. } => None,
        }
    }

    pub fn touch_modified(&mut self) {
        let now = Utc::now();
        self.modified = now;
        self.accessed = now;
    }

    pub fn touch_accessed(&mut self) {
        self.accessed = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Dir,
}

/// Descriptor returned by `stat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStat {
    pub id: NodeId,
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
    /// Size for files, recursive file total for directories.
    pub size: u64,
    /// Child names in insertion order; empty for files.
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub id: NodeId,
    pub path: String,
}
