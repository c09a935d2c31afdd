//! Command server
//!
//! A line-oriented TCP front end over the file manager: upload policy,
//! command parsing, per-client sessions and the accept loop.

pub mod core;
pub mod policy;
pub mod protocol;
pub mod session;
pub mod sink;

pub use self::core::Server;
pub use policy::{SizeLimitedReader, UploadPolicy};
pub use session::SessionContext;
