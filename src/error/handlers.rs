//! Error handlers
//!
//! Maps domain errors to response classes, status codes and the configured
//! client-facing text.

use crate::config::Messages;
use crate::error::types::{BrowserError, ErrorKind};
use log::error;

/// Response class a domain error falls into at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    Forbidden,
    NotFound,
    Internal,
}

pub fn classify(err: &BrowserError) -> ErrorClass {
    match err.kind() {
        ErrorKind::PathTraversal | ErrorKind::InvalidName | ErrorKind::PathTooLong => {
            ErrorClass::BadRequest
        }
        ErrorKind::UnsupportedOperation | ErrorKind::PermissionDenied => ErrorClass::Forbidden,
        ErrorKind::FileNotFound => ErrorClass::NotFound,
        ErrorKind::Unknown => ErrorClass::Internal,
    }
}

/// Convert an error class to a response status code
pub fn status_code(class: ErrorClass) -> u16 {
    match class {
        ErrorClass::BadRequest => 400,
        ErrorClass::Forbidden => 403,
        ErrorClass::NotFound => 404,
        ErrorClass::Internal => 500,
    }
}

/// Picks the configured text for an error; `fallback` is used for
/// unclassified failures and names what the caller was trying to do.
pub fn client_message<'a>(err: &BrowserError, messages: &'a Messages, fallback: &'a str) -> &'a str {
    match classify(err) {
        ErrorClass::BadRequest => &messages.invalid_request,
        ErrorClass::Forbidden => &messages.forbidden_file,
        ErrorClass::NotFound => &messages.not_found,
        ErrorClass::Internal => fallback,
    }
}

/// Log an error and produce the status line sent to the client
pub fn handle_error(err: &BrowserError, messages: &Messages, fallback: &str) -> (u16, String) {
    let status = status_code(classify(err));
    let text = client_message(err, messages, fallback);
    error!("Status {} error: {}. Details: {}", status, text, err);
    (status, text.to_string())
}
