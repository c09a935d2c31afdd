//! Streaming zip assembly
//!
//! Walks a folder depth-first and writes each non-hidden file straight into
//! the response; nothing is staged on disk.

use log::{debug, error};
use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::Path;
use walkdir::{DirEntry, WalkDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{BrowserError, ErrorKind};
use crate::operations::HIDDEN_FILE_PREFIX;

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_string_lossy()
        .starts_with(HIDDEN_FILE_PREFIX)
}

/// Writes a zip of `root` into `sink` and returns how many files it holds.
///
/// The zip writer is finished on every path. If the walk failed, a finish
/// failure is only logged and the walk error is returned.
pub(crate) fn write_folder_archive<W>(root: &Path, sink: &mut W) -> Result<usize, BrowserError>
where
    W: Write + ?Sized,
{
    let mut zip = ZipWriter::new_stream(sink);

    let walked = append_tree(&mut zip, root);
    let finished = zip.finish();

    match (walked, finished) {
        (Ok(count), Ok(_)) => Ok(count),
        (Ok(_), Err(e)) => Err(BrowserError::from_zip("failed to close zip writer", e)),
        (Err(e), Ok(_)) => Err(e),
        (Err(e), Err(close_err)) => {
            error!("Failed to close zip writer: {}", close_err);
            Err(e)
        }
    }
}

fn append_tree<W: Write + Seek>(zip: &mut ZipWriter<W>, root: &Path) -> Result<usize, BrowserError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    // The served folder itself is never pruned, even if its name is hidden
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    let mut archived = 0;
    for entry in walker {
        let entry = entry.map_err(|e| {
            let context = format!(
                "failed to walk '{}'",
                e.path().unwrap_or(root).display()
            );
            BrowserError::from_io(context, io::Error::from(e))
        })?;

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if file_type.is_symlink() && entry.path().is_dir() {
            debug!("Skipping linked folder {}", entry.path().display());
            continue;
        }

        let name = archive_name(root, entry.path())?;
        add_file(zip, entry.path(), &name, options)?;
        archived += 1;
    }

    Ok(archived)
}

/// Path of `file` relative to `root`, `/`-separated.
fn archive_name(root: &Path, file: &Path) -> Result<String, BrowserError> {
    let relative = file.strip_prefix(root).map_err(|e| {
        BrowserError::with_source(
            ErrorKind::Unknown,
            format!("failed to get relative path for '{}'", file.display()),
            e,
        )
    })?;

    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

fn add_file<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    source: &Path,
    name: &str,
    options: SimpleFileOptions,
) -> Result<(), BrowserError> {
    let mut source_file = File::open(source).map_err(|e| {
        BrowserError::from_io(format!("failed to open file '{}'", source.display()), e)
    })?;

    zip.start_file(name, options)
        .map_err(|e| BrowserError::from_zip(format!("failed to create zip entry '{name}'"), e))?;

    io::copy(&mut source_file, zip)
        .map_err(|e| BrowserError::from_io(format!("failed to copy '{name}' to zip"), e))?;

    debug!("Archived {}", name);
    Ok(())
}
