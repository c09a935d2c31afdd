//! Path sanitizer
//!
//! Turns untrusted, user-supplied relative paths into [`SanitizedPath`]
//! values confined to the base directory.

pub mod normalize;
mod validator;

pub use validator::{PathSanitizer, SanitizedPath};
