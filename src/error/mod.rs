//! Error handling
//!
//! Defines the error taxonomy shared by the sanitizer and the file
//! operations, and its mapping to client responses.

pub mod handlers;
pub mod types;

pub use types::*;
