//! File operations
//!
//! Every operation sanitizes its path arguments first, then delegates to
//! the storage collaborator and maps failures into the error taxonomy.

mod archive;
mod manager;
mod results;
mod sink;


pub use manager::FileManager;
pub use results::FileData;
pub use sink::{MemoryResponse, ResponseSink};

pub const MIME_OCTET_STREAM: &str = "application/octet-stream";
pub const MIME_ZIP: &str = "application/zip";
pub const EXTENSION_ZIP: &str = ".zip";
pub const HIDDEN_FILE_PREFIX: &str = ".";

pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_CONTENT_DISPOSITION: &str = "Content-Disposition";
pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";

/// `attachment; filename="<name>"`
pub fn attachment_disposition(file_name: &str) -> String {
    format!("attachment; filename=\"{file_name}\"")
}
