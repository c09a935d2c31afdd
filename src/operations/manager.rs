//! File operations engine

use log::{debug, info};
use std::fs::{self, File};
use std::io::{self, Read};

use crate::config::FileConfig;
use crate::error::{BrowserError, ErrorKind};
use crate::operations::archive::write_folder_archive;
use crate::operations::{
    EXTENSION_ZIP, FileData, HEADER_CONTENT_DISPOSITION, HEADER_CONTENT_LENGTH,
    HEADER_CONTENT_TYPE, MIME_OCTET_STREAM, MIME_ZIP, ResponseSink, attachment_disposition,
};
use crate::sanitizer::{PathSanitizer, SanitizedPath};
use crate::storage::Storage;

/// Name offered for an archive of the base directory when it has none.
const DEFAULT_ARCHIVE_STEM: &str = "archive";

/// List, upload, delete, rename, create and serve entries under the
/// storage base directory.
///
/// All calls are synchronous; nothing here locks or schedules.
pub struct FileManager<S> {
    storage: S,
    sanitizer: PathSanitizer,
}

impl<S: Storage> FileManager<S> {
    /// Compiles the name pattern from `file_config` once for the lifetime
    /// of the manager.
    pub fn new(storage: S, file_config: &FileConfig) -> Result<Self, regex::Error> {
        let sanitizer = PathSanitizer::new(
            storage.base_dir(),
            file_config.max_name_length,
            &file_config.valid_name_regex,
        )?;

        Ok(Self { storage, sanitizer })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn sanitize(&self, raw: &str) -> Result<SanitizedPath, BrowserError> {
        let path = self.sanitizer.sanitize(raw)?;
        debug!("Sanitized '{}' -> '{}'", raw, path);
        Ok(path)
    }

    /// Entries of a folder in the order storage reports them.
    pub fn list(&self, path: &str) -> Result<Vec<FileData>, BrowserError> {
        let path = self.sanitize(path)?;

        let entries = self
            .storage
            .read_directory(&path)
            .map_err(|e| BrowserError::from_io(format!("could not read directory '{path}'"), e))?;

        Ok(entries
            .into_iter()
            .map(|entry| FileData {
                name: entry.name,
                is_dir: entry.is_dir,
            })
            .collect())
    }

    /// Stores the whole stream at `path`; returns the byte count.
    pub fn upload_file(&self, path: &str, reader: &mut dyn Read) -> Result<u64, BrowserError> {
        let path = self.sanitize(path)?;

        let written = self
            .storage
            .write(&path, reader)
            .map_err(|e| BrowserError::from_io(format!("failed to upload file to '{path}'"), e))?;

        info!("File uploaded: {} ({} bytes)", path, written);
        Ok(written)
    }

    /// Removes a file or a whole folder. A missing path is not an error.
    pub fn delete(&self, path: &str) -> Result<(), BrowserError> {
        let path = self.sanitize(path)?;

        match self.storage.remove(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Delete of missing '{}' treated as done", path);
            }
            Err(e) => {
                return Err(BrowserError::from_io(
                    format!("could not delete file/folder '{path}'"),
                    e,
                ));
            }
        }

        info!("File or folder deleted: {}", path);
        Ok(())
    }

    pub fn rename(&self, old_path: &str, new_path: &str) -> Result<(), BrowserError> {
        let old_path = self.sanitize(old_path)?;
        let new_path = self.sanitize(new_path)?;

        self.storage.rename(&old_path, &new_path).map_err(|e| {
            BrowserError::from_io(format!("could not rename '{old_path}' to '{new_path}'"), e)
        })?;

        info!("File or folder renamed: {} -> {}", old_path, new_path);
        Ok(())
    }

    pub fn create_folder(&self, path: &str) -> Result<(), BrowserError> {
        let path = self.sanitize(path)?;

        self.storage
            .create_directory(&path)
            .map_err(|e| BrowserError::from_io(format!("could not create folder '{path}'"), e))?;

        info!("Folder created: {}", path);
        Ok(())
    }

    /// Streams one file into `sink` as an attachment; returns bytes sent.
    pub fn serve_file<W>(&self, path: &str, sink: &mut W) -> Result<u64, BrowserError>
    where
        W: ResponseSink + ?Sized,
    {
        let path = self.sanitize(path)?;
        let full_path = self.storage.absolute_path(&path);

        let metadata = fs::metadata(&full_path)
            .map_err(|e| BrowserError::from_io(format!("failed to stat file at '{path}'"), e))?;
        if metadata.is_dir() {
            return Err(BrowserError::new(
                ErrorKind::FileNotFound,
                format!("'{path}' is a folder, not a file"),
            ));
        }

        let mut file = File::open(&full_path)
            .map_err(|e| BrowserError::from_io(format!("failed to open file at '{path}'"), e))?;

        let mime_type = mime_guess::from_path(&full_path)
            .first()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_else(|| MIME_OCTET_STREAM.to_string());
        let file_name = path.file_name().unwrap_or_default();

        sink.set_header(HEADER_CONTENT_TYPE, &mime_type);
        sink.set_header(HEADER_CONTENT_DISPOSITION, &attachment_disposition(file_name));
        sink.set_header(HEADER_CONTENT_LENGTH, &metadata.len().to_string());

        let sent = io::copy(&mut file, sink)
            .and_then(|n| sink.flush().map(|_| n))
            .map_err(|e| BrowserError::from_io(format!("failed to send file '{path}'"), e))?;

        info!("File served: {} ({} bytes, {})", path, sent, mime_type);
        Ok(sent)
    }

    /// Streams a zip of the folder's non-hidden files into `sink`; returns
    /// the number of archived files.
    ///
    /// Bytes already written stay written if the walk fails part way.
    pub fn serve_folder_as_zip<W>(&self, path: &str, sink: &mut W) -> Result<usize, BrowserError>
    where
        W: ResponseSink + ?Sized,
    {
        let path = self.sanitize(path)?;
        let full_path = self.storage.absolute_path(&path);

        let metadata = fs::metadata(&full_path)
            .map_err(|e| BrowserError::from_io(format!("could not stat folder '{path}'"), e))?;
        if !metadata.is_dir() {
            return Err(BrowserError::new(
                ErrorKind::FileNotFound,
                format!("could not stat folder '{path}': not a folder"),
            ));
        }

        let zip_name = format!("{}{}", self.archive_stem(&path), EXTENSION_ZIP);
        sink.set_header(HEADER_CONTENT_TYPE, MIME_ZIP);
        sink.set_header(HEADER_CONTENT_DISPOSITION, &attachment_disposition(&zip_name));

        let archived = write_folder_archive(&full_path, sink)
            .map_err(|e| e.wrap(format!("failed to create zip for folder '{path}'")))?;

        info!("Folder served as {}: {} ({} files)", zip_name, path, archived);
        Ok(archived)
    }

    fn archive_stem(&self, path: &SanitizedPath) -> String {
        match path.file_name() {
            Some(name) => name.to_string(),
            None => self
                .storage
                .base_dir()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| DEFAULT_ARCHIVE_STEM.to_string()),
        }
    }
}
