use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_CHILDREN: usize = 5;
pub const DEFAULT_MAX_DISK_SIZE: u64 = 1024 * 10240;

/// Limits fixed when a tree is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Fan-out cap for every directory.
    pub max_children: usize,
    /// Total bytes that live and trashed files may occupy.
    pub max_disk_size: u64,
    /// When set, the trash directory ignores `max_children`.
    #[serde(default)]
    pub exempt_trash: bool,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_children: DEFAULT_MAX_CHILDREN,
            max_disk_size: DEFAULT_MAX_DISK_SIZE,
            exempt_trash: false,
        }
    }
}

impl Limits {
    pub fn new(max_children: usize, max_disk_size: u64) -> Self {
        Self {
            max_children,
            max_disk_size,
            exempt_trash: false,
        }
    }

    pub fn with_exempt_trash(mut self, exempt: bool) -> Self {
        self.exempt_trash = exempt;
        self
    }
}
