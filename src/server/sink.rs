//! Socket response
//!
//! Buffers headers until the first body byte, then sends the status line,
//! the headers and a blank line ahead of the body.

use log::warn;
use std::io::{self, Write};

use crate::operations::ResponseSink;
use crate::server::protocol::{OK, format_response};

pub struct SocketResponse<'a, W: Write> {
    out: &'a mut W,
    headers: Vec<(String, String)>,
    committed: bool,
}

impl<'a, W: Write> SocketResponse<'a, W> {
    pub fn new(out: &'a mut W) -> Self {
        Self {
            out,
            headers: Vec::new(),
            committed: false,
        }
    }

    /// Once committed, a failure can no longer be reported as a status line.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Sends the status line and headers if that has not happened yet.
    pub fn commit(&mut self) -> io::Result<()> {
        if self.committed {
            return Ok(());
        }
        self.committed = true;

        self.out.write_all(format_response(OK, "OK").as_bytes())?;
        for (name, value) in &self.headers {
            self.out
                .write_all(format!("{}: {}\r\n", name, value).as_bytes())?;
        }
        self.out.write_all(b"\r\n")
    }
}

impl<W: Write> Write for SocketResponse<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.commit()?;
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit()?;
        self.out.flush()
    }
}

impl<W: Write> ResponseSink for SocketResponse<'_, W> {
    fn set_header(&mut self, name: &str, value: &str) {
        if self.committed {
            warn!("Header {} set after the response was sent", name);
            return;
        }
        self.headers.push((name.to_string(), value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_precede_body() {
        let mut out = Vec::new();
        let mut response = SocketResponse::new(&mut out);
        response.set_header("Content-Type", "text/plain");
        response.set_header("Content-Length", "2");
        assert!(!response.is_committed());

        response.write_all(b"hi").unwrap();
        assert!(response.is_committed());

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nhi"
        );
    }

    #[test]
    fn test_flush_commits_empty_body() {
        let mut out = Vec::new();
        let mut response = SocketResponse::new(&mut out);
        response.set_header("Content-Length", "0");
        response.flush().unwrap();
        response.flush().unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "200 OK\r\nContent-Length: 0\r\n\r\n"
        );
    }

    #[test]
    fn test_late_header_is_dropped() {
        let mut out = Vec::new();
        let mut response = SocketResponse::new(&mut out);
        response.write_all(b"x").unwrap();
        response.set_header("X-Late", "1");

        assert_eq!(String::from_utf8(out).unwrap(), "200 OK\r\n\r\nx");
    }
}
