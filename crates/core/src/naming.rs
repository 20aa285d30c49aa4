//! Name validation and collision resolution.

use crate::error::{FsError, FsResult};
use crate::model::PATH_DELIMITER;

pub fn validate_name(name: &str) -> FsResult<()> {
    if name.is_empty() {
        return Err(FsError::InvalidArgument("name cannot be empty".into()));
    }
    if name == "." || name == ".." {
        return Err(FsError::InvalidArgument(format!("'{name}' is reserved")));
    }
    if name.contains(PATH_DELIMITER) {
        return Err(FsError::InvalidArgument(format!(
            "'{name}' contains '{PATH_DELIMITER}'"
        )));
    }
    Ok(())
}

/// `base`, then `base_1`, `base_2`, ... whichever is free first.
pub fn trash_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 1u64;
    loop {
        let candidate = format!("{base}_{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// `base`, then `base - Copy`, then `base - Copy(2)`, `base - Copy(3)`, ...
pub fn copy_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let first = format!("{base} - Copy");
    if !taken(&first) {
        return first;
    }
    let mut n = 2u64;
    loop {
        let candidate = format!("{base} - Copy({n})");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
