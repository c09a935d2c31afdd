//! Local filesystem storage
//!
//! Thin wrappers over `std::fs` rooted at the configured base directory.

use log::{debug, info, warn};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::sanitizer::SanitizedPath;
use crate::storage::{EntryInfo, Storage};

pub struct LocalStorage {
    base_dir: PathBuf,
    dir_permissions: u32,
}

impl LocalStorage {
    pub fn new(base_dir: impl Into<PathBuf>, dir_permissions: u32) -> Self {
        Self {
            base_dir: base_dir.into(),
            dir_permissions,
        }
    }

    /// Creates the base directory if needed and anchors the storage at its
    /// canonical path.
    pub fn create(base_dir: impl AsRef<Path>, dir_permissions: u32) -> io::Result<Self> {
        let storage = Self::new(base_dir.as_ref(), dir_permissions);
        storage.create_dir_all(base_dir.as_ref())?;
        let base_dir = fs::canonicalize(base_dir.as_ref())?;
        info!("Storage root: {}", base_dir.display());
        Ok(Self::new(base_dir, dir_permissions))
    }

    #[cfg(unix)]
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        use std::os::unix::fs::DirBuilderExt;

        fs::DirBuilder::new()
            .recursive(true)
            .mode(self.dir_permissions)
            .create(path)
    }

    #[cfg(not(unix))]
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let _ = self.dir_permissions;
        fs::create_dir_all(path)
    }
}

fn reject_root(path: &SanitizedPath, action: &str) -> io::Result<()> {
    if path.is_root() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot {action} the base directory"),
        ));
    }
    Ok(())
}

impl Storage for LocalStorage {
    fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn read_directory(&self, path: &SanitizedPath) -> io::Result<Vec<EntryInfo>> {
        let full_path = self.absolute_path(path);

        let mut files = Vec::new();
        for entry in fs::read_dir(&full_path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();

            // Follows symlinks, so a dangling link fails here and is skipped
            match fs::metadata(entry.path()) {
                Ok(metadata) => files.push(EntryInfo {
                    name,
                    is_dir: metadata.is_dir(),
                }),
                Err(e) => warn!("Failed to get info for {}: {}", name, e),
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(
            "Read directory {} - {} entries",
            full_path.display(),
            files.len()
        );

        Ok(files)
    }

    fn write(&self, path: &SanitizedPath, reader: &mut dyn Read) -> io::Result<u64> {
        reject_root(path, "write to")?;

        let full_path = self.absolute_path(path);
        let parent = full_path.parent().unwrap_or(&self.base_dir);
        self.create_dir_all(parent)?;

        // Staged under a short random hidden name in the target folder; the
        // temp file is removed on drop unless it was persisted
        let mut staged = NamedTempFile::new_in(parent)?;
        let written = io::copy(reader, &mut staged)?;
        staged.flush()?;
        staged.persist(&full_path).map_err(|e| e.error)?;

        info!("Stored {} ({} bytes)", full_path.display(), written);
        Ok(written)
    }

    fn remove(&self, path: &SanitizedPath) -> io::Result<()> {
        reject_root(path, "remove")?;

        let full_path = self.absolute_path(path);
        let metadata = match fs::symlink_metadata(&full_path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let result = if metadata.is_dir() {
            fs::remove_dir_all(&full_path)
        } else {
            fs::remove_file(&full_path)
        };

        match result {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn rename(&self, from: &SanitizedPath, to: &SanitizedPath) -> io::Result<()> {
        if to.is_root() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty destination path",
            ));
        }
        reject_root(from, "rename")?;

        fs::rename(self.absolute_path(from), self.absolute_path(to))
    }

    fn create_directory(&self, path: &SanitizedPath) -> io::Result<()> {
        self.create_dir_all(&self.absolute_path(path))
    }
}
