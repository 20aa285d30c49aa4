//! karyfs-core: an in-memory, capacity-bounded K-ary tree that simulates a
//! drive with a trash directory and a disk quota.

pub mod arena;
pub mod config;
pub mod error;
pub mod export;
pub mod human;
pub mod logging;
pub mod model;
pub mod naming;
pub mod search;
pub mod snapshot;
pub mod tree;

pub use arena::Arena;
pub use config::*;
pub use error::{FsError, FsResult};
pub use model::*;
pub use tree::*;
