//! Upload and download policy
//!
//! Size limits and forbidden extensions are enforced at the boundary,
//! before the file operations are called.

use std::io::{self, Read};

use crate::config::BrowserConfig;
use crate::error::{BrowserError, ErrorKind};

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    max_upload_size: u64,
    forbidden_extensions: Vec<String>,
}

impl UploadPolicy {
    pub fn new(max_upload_size: u64, forbidden_extensions: Vec<String>) -> Self {
        Self {
            max_upload_size,
            forbidden_extensions,
        }
    }

    pub fn from_config(config: &BrowserConfig) -> Self {
        Self::new(
            config.server.max_upload_size,
            config.file.forbidden_extensions.clone(),
        )
    }

    /// Pre-check on the length the client announced. An absent length
    /// passes; the reader from [`Self::limit`] is what bounds the bytes
    /// actually received.
    pub fn check_declared_size(&self, declared: Option<u64>) -> Result<(), BrowserError> {
        match declared {
            Some(size) if size > self.max_upload_size => Err(self.too_large(size)),
            _ => Ok(()),
        }
    }

    /// Matches the lower-cased extension exactly, or the file name by prefix.
    pub fn is_forbidden(&self, file_name: &str) -> bool {
        let extension = extension_of(file_name).to_lowercase();
        self.forbidden_extensions
            .iter()
            .filter(|forbidden| !forbidden.is_empty())
            .any(|forbidden| extension == *forbidden || file_name.starts_with(forbidden.as_str()))
    }

    pub fn check_file_name(&self, file_name: &str) -> Result<(), BrowserError> {
        if self.is_forbidden(file_name) {
            return Err(BrowserError::new(
                ErrorKind::UnsupportedOperation,
                format!("file '{file_name}' has a forbidden extension"),
            ));
        }
        Ok(())
    }

    /// Wraps `reader` so that reading past the maximum upload size fails.
    pub fn limit<R: Read>(&self, reader: R) -> SizeLimitedReader<R> {
        SizeLimitedReader {
            inner: reader,
            max: self.max_upload_size,
            received: 0,
        }
    }

    fn too_large(&self, size: u64) -> BrowserError {
        BrowserError::new(
            ErrorKind::UnsupportedOperation,
            format!("file size {} exceeds maximum {}", size, self.max_upload_size),
        )
    }
}

/// Extension including the dot, taken from the last `.` of the name
/// (`.env` for `.env`, empty for `Makefile`).
fn extension_of(file_name: &str) -> &str {
    file_name
        .rfind('.')
        .map(|idx| &file_name[idx..])
        .unwrap_or("")
}

/// Reader that errors with `UnsupportedOperation` once more than `max`
/// bytes went through it.
pub struct SizeLimitedReader<R> {
    inner: R,
    max: u64,
    received: u64,
}

impl<R> SizeLimitedReader<R> {
    pub fn received(&self) -> u64 {
        self.received
    }
}

impl<R: Read> Read for SizeLimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.received += n as u64;
        if self.received > self.max {
            return Err(BrowserError::new(
                ErrorKind::UnsupportedOperation,
                format!("upload exceeds maximum {} bytes", self.max),
            )
            .into());
        }
        Ok(n)
    }
}
