//! Filesystem utilities

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Ensure a directory exists, creating it and its parents if necessary
pub fn ensure_dir_exists(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path)
}

/// Create the parent directory of a file path so the file can be written
pub fn ensure_parent_dir(file_path: &Path) -> io::Result<()> {
    match file_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir_exists(parent),
        _ => Ok(()),
    }
}

/// Path of the yearly observation file for a file prefix: `<dir>/<prefix>_<year>.csv`
pub fn yearly_file_path(dir: &Path, prefix: &str, year: i32) -> PathBuf {
    dir.join(format!("{}_{}.csv", prefix, year))
}
