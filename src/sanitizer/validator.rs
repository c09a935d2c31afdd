//! Path validation
//!
//! Confinement, length and naming checks applied to every path before it
//! reaches storage.

use regex::Regex;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::{BrowserError, ErrorKind};
use crate::sanitizer::normalize::{self, CURRENT_DIR, PARENT_DIR};

/// A normalized relative path proven to stay inside the base directory.
///
/// Only [`PathSanitizer::sanitize`] creates these. `"."` is the base
/// directory itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SanitizedPath(String);

impl SanitizedPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == CURRENT_DIR
    }

    /// Last segment, `None` for the base directory.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            Some(normalize::base_name(&self.0))
        }
    }

    /// Parent folder as a sanitized path (`"."` at top level).
    pub fn parent(&self) -> SanitizedPath {
        match self.0.rfind('/') {
            Some(idx) => SanitizedPath(self.0[..idx].to_string()),
            None => SanitizedPath(CURRENT_DIR.to_string()),
        }
    }

    /// Joins onto a base directory; the root maps to the base itself.
    pub fn resolve_under(&self, base: &Path) -> PathBuf {
        if self.is_root() {
            base.to_path_buf()
        } else {
            self.0.split('/').fold(base.to_path_buf(), |acc, seg| acc.join(seg))
        }
    }
}

impl fmt::Display for SanitizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validates raw paths against a fixed base directory.
///
/// The name pattern is compiled once here and must match a whole basename.
#[derive(Debug, Clone)]
pub struct PathSanitizer {
    base_dir: PathBuf,
    max_name_length: usize,
    valid_name: Regex,
}

impl PathSanitizer {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        max_name_length: usize,
        valid_name_pattern: &str,
    ) -> Result<Self, regex::Error> {
        let valid_name = Regex::new(&format!("^(?:{valid_name_pattern})$"))?;
        let base_dir = PathBuf::from(normalize::clean(&base_dir.into().to_string_lossy()));

        Ok(Self {
            base_dir,
            max_name_length,
            valid_name,
        })
    }

    /// Normalizes `raw` and checks confinement, length and naming, in that
    /// order. The first failing check decides the error.
    pub fn sanitize(&self, raw: &str) -> Result<SanitizedPath, BrowserError> {
        let clean = normalize::clean(raw);

        if normalize::is_absolute(&clean) {
            return Err(BrowserError::new(
                ErrorKind::PathTraversal,
                format!("absolute paths are not allowed: '{raw}'"),
            ));
        }

        self.check_confinement(raw, &clean)?;

        if clean.len() > self.max_name_length {
            return Err(BrowserError::new(
                ErrorKind::PathTooLong,
                format!(
                    "path '{}' too long ({} > {})",
                    raw,
                    clean.len(),
                    self.max_name_length
                ),
            ));
        }

        let base = normalize::base_name(&clean);
        if !base.is_empty() && base != CURRENT_DIR && !self.valid_name.is_match(base) {
            return Err(BrowserError::new(
                ErrorKind::InvalidName,
                format!("base name '{base}' is invalid"),
            ));
        }

        Ok(SanitizedPath(clean))
    }

    /// Resolves `clean` under the base directory and requires the relative
    /// path back from the base to stay free of parent segments.
    fn check_confinement(&self, raw: &str, clean: &str) -> Result<(), BrowserError> {
        let traversal = || {
            BrowserError::new(
                ErrorKind::PathTraversal,
                format!("path traversal detected: '{raw}'"),
            )
        };

        // A normalized path still opening with `..` left the base on the way
        if normalize::base_name(clean) == PARENT_DIR || clean.starts_with("../") {
            return Err(traversal());
        }

        let mut resolved = self.base_dir.clone();
        for segment in clean.split('/') {
            match segment {
                "" | CURRENT_DIR => {}
                PARENT_DIR => {
                    if !resolved.pop() {
                        return Err(traversal());
                    }
                }
                name => resolved.push(name),
            }
        }

        let relative = resolved
            .strip_prefix(&self.base_dir)
            .map_err(|_| traversal())?;

        if relative
            .components()
            .next()
            .is_some_and(|c| c == Component::ParentDir)
        {
            return Err(traversal());
        }

        Ok(())
    }
}
