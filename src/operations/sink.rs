//! Response sinks
//!
//! Where `serve_file` and `serve_folder_as_zip` stream their output.

use std::io::{self, Write};

/// A writable response that also accepts headers.
///
/// Headers set before the first write are sent ahead of the body.
pub trait ResponseSink: Write {
    fn set_header(&mut self, name: &str, value: &str);
}

/// Response collected in memory.
#[derive(Debug, Default)]
pub struct MemoryResponse {
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl MemoryResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value set for `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

impl Write for MemoryResponse {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseSink for MemoryResponse {
    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }
}
