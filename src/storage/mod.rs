//! File system storage management
//!
//! The [`Storage`] trait is the narrow capability the file operations use;
//! [`LocalStorage`] implements it on the local filesystem.

mod local;

pub use local::LocalStorage;

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::sanitizer::SanitizedPath;

/// A directory entry as reported by storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub is_dir: bool,
}

/// Raw directory and file primitives rooted at a base directory.
///
/// Paths are always sanitized before they get here.
pub trait Storage: Send + Sync {
    /// Absolute base directory every path is resolved against
    fn base_dir(&self) -> &Path;

    /// Entries whose metadata cannot be read are skipped, not fatal.
    fn read_directory(&self, path: &SanitizedPath) -> io::Result<Vec<EntryInfo>>;

    /// Writes the whole stream, creating parent directories as needed.
    /// Returns the number of bytes written.
    fn write(&self, path: &SanitizedPath, reader: &mut dyn Read) -> io::Result<u64>;

    /// Recursive; removing a missing path succeeds.
    fn remove(&self, path: &SanitizedPath) -> io::Result<()>;

    /// Moves `from` to `to`; an empty destination is rejected.
    fn rename(&self, from: &SanitizedPath, to: &SanitizedPath) -> io::Result<()>;

    /// Creates the directory and missing parents; existing directories are fine.
    fn create_directory(&self, path: &SanitizedPath) -> io::Result<()>;

    fn absolute_path(&self, path: &SanitizedPath) -> PathBuf {
        path.resolve_under(self.base_dir())
    }
}
