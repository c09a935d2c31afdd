pub mod config;
pub mod error;
pub mod operations;
pub mod sanitizer;
pub mod server;
pub mod storage;

pub use config::BrowserConfig;
pub use error::{BrowserError, ErrorKind};
pub use operations::{FileData, FileManager};
pub use server::Server;
pub use storage::{LocalStorage, Storage};
