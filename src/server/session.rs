//! Client session
//!
//! Reads one command line at a time, applies the upload policy and calls the
//! file manager. Sessions are blocking; the accept loop runs each one on the
//! blocking pool.

use log::{debug, error, info, warn};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Take, Write};
use std::net::{SocketAddr, TcpStream};

use crate::config::{BrowserConfig, Messages};
use crate::error::handlers::handle_error;
use crate::error::BrowserError;
use crate::operations::{FileData, FileManager};
use crate::sanitizer::normalize;
use crate::server::policy::UploadPolicy;
use crate::server::protocol::{
    BAD_REQUEST, CLOSING, CREATED, Command, FORBIDDEN, OK, PENDING, READY, format_entry,
    format_response, parse_command,
};
use crate::server::sink::SocketResponse;
use crate::storage::Storage;

/// Longest command line accepted, terminator included
const MAX_COMMAND_LINE: u64 = 8192;

/// Longest chunk size line of a chunked upload
const MAX_CHUNK_HEADER: u64 = 32;

/// Settings shared by every session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub policy: UploadPolicy,
    pub messages: Messages,
    pub buffer_size: usize,
}

impl SessionContext {
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            policy: UploadPolicy::from_config(config),
            messages: config.messages.clone(),
            buffer_size: config.server.buffer_size,
        }
    }
}

enum Flow {
    Continue,
    Close,
}

/// Serves one connected client until it quits or the connection drops.
pub fn handle_client<S: Storage>(
    stream: TcpStream,
    addr: SocketAddr,
    manager: &FileManager<S>,
    context: &SessionContext,
) -> io::Result<()> {
    let reader = BufReader::with_capacity(context.buffer_size, stream.try_clone()?);
    let writer = BufWriter::with_capacity(context.buffer_size, stream);
    run_session(reader, writer, addr, manager, context)
}

/// Session loop over any buffered reader and writer.
pub fn run_session<R, W, S>(
    mut reader: R,
    writer: W,
    addr: SocketAddr,
    manager: &FileManager<S>,
    context: &SessionContext,
) -> io::Result<()>
where
    R: BufRead,
    W: Write,
    S: Storage,
{
    let mut session = Session {
        manager,
        context,
        out: writer,
        addr,
        pending_rename: None,
    };

    session.reply(READY, "RAX file browser ready")?;
    session.out.flush()?;

    let mut line = String::new();
    loop {
        line.clear();
        let n = reader
            .by_ref()
            .take(MAX_COMMAND_LINE)
            .read_line(&mut line)?;
        if n == 0 {
            info!("Client {} disconnected", addr);
            return Ok(());
        }
        if n as u64 == MAX_COMMAND_LINE && !line.ends_with('\n') {
            warn!(
                "Client {} sent a command line over {} bytes",
                addr, MAX_COMMAND_LINE
            );
            session.reply(BAD_REQUEST, "Command line too long")?;
            session.out.flush()?;
            return Ok(());
        }

        let command = parse_command(&line);
        debug!("Client {} sent {:?}", addr, command);

        let flow = session.dispatch(command, &mut reader)?;
        session.out.flush()?;

        if let Flow::Close = flow {
            info!("Closing session for {}", addr);
            return Ok(());
        }
    }
}

struct Session<'a, S, W> {
    manager: &'a FileManager<S>,
    context: &'a SessionContext,
    out: W,
    addr: SocketAddr,
    /// Source path remembered by RNFR
    pending_rename: Option<String>,
}

impl<S: Storage, W: Write> Session<'_, S, W> {
    fn dispatch<R: BufRead>(&mut self, command: Command, reader: &mut R) -> io::Result<Flow> {
        if !matches!(command, Command::RenameTo(_)) && self.pending_rename.take().is_some() {
            debug!("Client {} dropped a pending rename", self.addr);
        }

        match command {
            Command::List(path) => self.list(&path),
            Command::MakeDir(path) => self.make_dir(&path),
            Command::Delete(path) => self.delete(&path),
            Command::RenameFrom(path) => self.rename_from(path),
            Command::RenameTo(name) => self.rename_to(&name),
            Command::Store { size, path } => self.store(size, &path, reader),
            Command::Retrieve(path) => self.serve(&path, false),
            Command::Zip(path) => self.serve(&path, true),
            Command::Quit => {
                self.reply(CLOSING, "Goodbye")?;
                Ok(Flow::Close)
            }
            Command::Unknown(raw) => {
                warn!("Client {} sent unknown command: {}", self.addr, raw);
                let context = self.context;
                self.reply(BAD_REQUEST, &context.messages.invalid_request)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn list(&mut self, path: &str) -> io::Result<Flow> {
        let entries: Vec<FileData> = match self.manager.list(path) {
            Ok(entries) => entries,
            Err(e) => {
                let context = self.context;
                return self.reply_error(&e, &context.messages.cannot_list_directory);
            }
        };

        self.reply(OK, &format!("{} entries", entries.len()))?;
        for entry in &entries {
            self.out
                .write_all(format_entry(&entry.name, entry.is_dir).as_bytes())?;
        }
        self.out.write_all(b"\r\n")?;
        Ok(Flow::Continue)
    }

    fn make_dir(&mut self, path: &str) -> io::Result<Flow> {
        match self.manager.create_folder(path) {
            Ok(()) => {
                self.reply(CREATED, "Folder created")?;
                Ok(Flow::Continue)
            }
            Err(e) => self.reply_internal(&e),
        }
    }

    fn delete(&mut self, path: &str) -> io::Result<Flow> {
        match self.manager.delete(path) {
            Ok(()) => {
                self.reply(OK, "Deleted")?;
                Ok(Flow::Continue)
            }
            Err(e) => {
                let context = self.context;
                self.reply_error(&e, &context.messages.cannot_delete)
            }
        }
    }

    fn rename_from(&mut self, path: String) -> io::Result<Flow> {
        if let Err(e) = self.manager.sanitize(&path) {
            return self.reply_internal(&e);
        }
        self.pending_rename = Some(path);
        self.reply(PENDING, "Ready for destination name")?;
        Ok(Flow::Continue)
    }

    /// The new name lands in the folder that holds the RNFR path.
    fn rename_to(&mut self, new_name: &str) -> io::Result<Flow> {
        let Some(old_path) = self.pending_rename.take() else {
            self.reply(BAD_REQUEST, "RNFR required first")?;
            return Ok(Flow::Continue);
        };

        let result = self.manager.sanitize(&old_path).and_then(|old| {
            let parent = old.parent();
            let new_path = if parent.is_root() {
                new_name.to_string()
            } else {
                format!("{}/{}", parent, new_name)
            };
            self.manager.rename(&old_path, &new_path)
        });

        match result {
            Ok(()) => {
                self.reply(OK, "Renamed")?;
                Ok(Flow::Continue)
            }
            Err(e) => self.reply_internal(&e),
        }
    }

    /// Any failure closes the connection since unread body bytes would be
    /// taken for commands.
    fn store<R: BufRead>(
        &mut self,
        size: Option<u64>,
        path: &str,
        reader: &mut R,
    ) -> io::Result<Flow> {
        let context = self.context;
        let policy = &context.policy;

        let checked = policy.check_declared_size(size).and_then(|_| {
            let cleaned = normalize::clean(path);
            policy.check_file_name(normalize::base_name(&cleaned))
        });
        if let Err(e) = checked {
            self.reply_internal(&e)?;
            return Ok(Flow::Close);
        }

        // A chunked body announces no size, so the limiter is the only
        // bound on what it stores
        let uploaded = match size {
            Some(size) => self
                .manager
                .upload_file(path, &mut policy.limit(BodyReader::new(reader, size))),
            None => self
                .manager
                .upload_file(path, &mut policy.limit(ChunkedBody::new(reader))),
        };
        let written = match uploaded {
            Ok(written) => written,
            Err(e) => {
                self.reply_internal(&e)?;
                return Ok(Flow::Close);
            }
        };

        self.reply(CREATED, &format!("Stored {} bytes", written))?;
        Ok(Flow::Continue)
    }

    fn serve(&mut self, path: &str, as_zip: bool) -> io::Result<Flow> {
        let context = self.context;
        let cleaned = normalize::clean(path);
        if context.policy.is_forbidden(normalize::base_name(&cleaned)) {
            warn!("Client {} asked for forbidden file {}", self.addr, path);
            self.reply(FORBIDDEN, &context.messages.forbidden_file)?;
            return Ok(Flow::Continue);
        }

        let manager = self.manager;
        let (result, committed) = {
            let mut response = SocketResponse::new(&mut self.out);
            let result = if as_zip {
                manager.serve_folder_as_zip(path, &mut response).map(|_| ())
            } else {
                manager.serve_file(path, &mut response).map(|_| ())
            };
            (result, response.is_committed())
        };

        match result {
            // The archive has no length header, so its end is the end of the connection
            Ok(()) if as_zip => Ok(Flow::Close),
            Ok(()) => Ok(Flow::Continue),
            Err(e) if committed => {
                error!(
                    "Transfer to {} failed after the response started: {}",
                    self.addr, e
                );
                Ok(Flow::Close)
            }
            Err(e) => self.reply_error(&e, &context.messages.cannot_serve),
        }
    }

    fn reply(&mut self, code: u16, message: &str) -> io::Result<()> {
        self.out
            .write_all(format_response(code, message).as_bytes())
    }

    fn reply_error(&mut self, err: &BrowserError, fallback: &str) -> io::Result<Flow> {
        let (code, text) = handle_error(err, &self.context.messages, fallback);
        self.reply(code, &text)?;
        Ok(Flow::Continue)
    }

    fn reply_internal(&mut self, err: &BrowserError) -> io::Result<Flow> {
        let context = self.context;
        self.reply_error(err, &context.messages.internal_error)
    }
}

/// Exactly `expected` bytes of upload body; a short stream is an error.
struct BodyReader<'r, R> {
    inner: Take<&'r mut R>,
    expected: u64,
}

impl<'r, R: Read> BodyReader<'r, R> {
    fn new(reader: &'r mut R, expected: u64) -> Self {
        Self {
            inner: reader.take(expected),
            expected,
        }
    }
}

impl<R: Read> Read for BodyReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() && self.inner.limit() > 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "connection closed with {} of {} body bytes missing",
                    self.inner.limit(),
                    self.expected
                ),
            ));
        }
        Ok(n)
    }
}

/// Chunked upload body: `<len>\r\n` followed by `len` bytes, repeated,
/// ending with a `0` chunk.
struct ChunkedBody<'r, R> {
    inner: &'r mut R,
    remaining: u64,
    finished: bool,
}

impl<'r, R: BufRead> ChunkedBody<'r, R> {
    fn new(reader: &'r mut R) -> Self {
        Self {
            inner: reader,
            remaining: 0,
            finished: false,
        }
    }
}

fn read_chunk_size<R: BufRead>(reader: &mut R) -> io::Result<u64> {
    let mut line = String::new();
    reader.by_ref().take(MAX_CHUNK_HEADER).read_line(&mut line)?;
    if !line.ends_with('\n') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "missing or oversized chunk header",
        ));
    }
    line.trim().parse::<u64>().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid chunk size '{}': {}", line.trim(), e),
        )
    })
}

impl<R: BufRead> Read for ChunkedBody<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.finished {
            return Ok(0);
        }
        if self.remaining == 0 {
            self.remaining = read_chunk_size(self.inner)?;
            if self.remaining == 0 {
                self.finished = true;
                return Ok(0);
            }
        }

        let wanted = usize::try_from(self.remaining)
            .unwrap_or(usize::MAX)
            .min(buf.len());
        let n = self.inner.read(&mut buf[..wanted])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("connection closed with {} chunk bytes missing", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;
    use crate::storage::LocalStorage;
    use std::fs;
    use std::io::Cursor;

    fn setup() -> (tempfile::TempDir, FileManager<LocalStorage>, SessionContext) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), 0o755);
        let manager = FileManager::new(storage, &FileConfig::default()).unwrap();
        let context = SessionContext {
            policy: UploadPolicy::new(16, vec![".exe".into(), ".env".into()]),
            messages: Messages::default(),
            buffer_size: 1024,
        };
        (dir, manager, context)
    }

    fn run(input: &[u8], manager: &FileManager<LocalStorage>, context: &SessionContext) -> String {
        let mut out = Vec::new();
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        run_session(Cursor::new(input.to_vec()), &mut out, addr, manager, context).unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    #[test]
    fn test_greeting_and_quit() {
        let (_dir, manager, context) = setup();
        let out = run(b"QUIT\r\nLIST\r\n", &manager, &context);
        assert_eq!(out, "220 RAX file browser ready\r\n221 Goodbye\r\n");
    }

    #[test]
    fn test_store_then_list() {
        let (dir, manager, context) = setup();
        let out = run(b"MKD docs\r\nSTOR 5 docs/a.txt\r\nhelloLIST docs\r\n", &manager, &context);

        assert!(out.contains("201 Folder created\r\n"));
        assert!(out.contains("201 Stored 5 bytes\r\n"));
        assert!(out.ends_with("200 1 entries\r\nF\ta.txt\r\n\r\n"));
        assert_eq!(fs::read(dir.path().join("docs/a.txt")).unwrap(), b"hello");
    }

    #[test]
    fn test_oversized_store_closes_session() {
        let (dir, manager, context) = setup();
        let out = run(b"STOR 17 big.bin\r\n0123456789abcdefgLIST\r\n", &manager, &context);

        assert!(out.ends_with("403 Access to this file is forbidden\r\n"));
        assert!(!out.contains("entries"));
        assert!(!dir.path().join("big.bin").exists());
    }

    #[test]
    fn test_forbidden_upload_is_rejected() {
        let (dir, manager, context) = setup();
        let out = run(b"STOR 2 tool.exe\r\nMZ", &manager, &context);

        assert!(out.contains("403 "));
        assert!(!dir.path().join("tool.exe").exists());
    }

    #[test]
    fn test_short_body_fails_upload() {
        let (dir, manager, context) = setup();
        let out = run(b"STOR 10 a.txt\r\nabc", &manager, &context);

        assert!(out.contains("500 Internal server error\r\n"));
        assert!(!dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_rename_keeps_parent_folder() {
        let (dir, manager, context) = setup();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/old.txt"), b"x").unwrap();

        let out = run(b"RNFR docs/old.txt\r\nRNTO new.txt\r\n", &manager, &context);

        assert!(out.contains("350 "));
        assert!(out.contains("200 Renamed\r\n"));
        assert!(dir.path().join("docs/new.txt").exists());
        assert!(!dir.path().join("docs/old.txt").exists());
    }

    #[test]
    fn test_rename_requires_source() {
        let (_dir, manager, context) = setup();
        let out = run(b"RNTO new.txt\r\n", &manager, &context);
        assert!(out.contains("400 RNFR required first\r\n"));
    }

    #[test]
    fn test_traversal_is_bad_request() {
        let (_dir, manager, context) = setup();
        let out = run(b"LIST ../etc\r\nDELE ../../x\r\n", &manager, &context);
        assert_eq!(out.matches("400 Invalid request\r\n").count(), 2);
    }

    #[test]
    fn test_retrieve_sends_headers_and_body() {
        let (dir, manager, context) = setup();
        fs::write(dir.path().join("notes.txt"), b"hi there").unwrap();

        let out = run(b"RETR notes.txt\r\nQUIT\r\n", &manager, &context);

        assert!(out.contains("200 OK\r\n"));
        assert!(out.contains("Content-Type: text/plain\r\n"));
        assert!(out.contains("Content-Disposition: attachment; filename=\"notes.txt\"\r\n"));
        assert!(out.contains("Content-Length: 8\r\n\r\nhi there221 Goodbye\r\n"));
    }

    #[test]
    fn test_retrieve_missing_and_forbidden() {
        let (_dir, manager, context) = setup();
        let out = run(b"RETR nope.txt\r\nRETR .env\r\n", &manager, &context);

        assert!(out.contains("404 File or folder not found\r\n"));
        assert!(out.contains("403 Access to this file is forbidden\r\n"));
        assert!(!out.contains("200 OK"));
    }

    #[test]
    fn test_zip_closes_after_archive() {
        let (dir, manager, context) = setup();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/a.txt"), b"alpha").unwrap();

        let out = run(b"ZIP docs\r\nLIST\r\n", &manager, &context);

        assert!(out.contains("Content-Type: application/zip\r\n"));
        assert!(out.contains("filename=\"docs.zip\""));
        assert!(!out.contains("entries"));
    }

    #[test]
    fn test_greeting_is_flushed_before_first_read() {
        use std::sync::{Arc, Mutex};

        struct Shared(Arc<Mutex<Vec<u8>>>);
        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        // Records what the client had received when the server first read
        struct Client {
            sent: Arc<Mutex<Vec<u8>>>,
            seen_at_first_read: Option<Vec<u8>>,
        }
        impl Read for Client {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                if self.seen_at_first_read.is_none() {
                    self.seen_at_first_read = Some(self.sent.lock().unwrap().clone());
                }
                Ok(0)
            }
        }

        let (_dir, manager, context) = setup();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut client = Client {
            sent: Arc::clone(&sent),
            seen_at_first_read: None,
        };
        let writer = BufWriter::new(Shared(Arc::clone(&sent)));
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        run_session(BufReader::new(&mut client), writer, addr, &manager, &context).unwrap();

        assert_eq!(
            client.seen_at_first_read.unwrap(),
            b"220 RAX file browser ready\r\n"
        );
    }

    #[test]
    fn test_overlong_command_line_closes_session() {
        let (_dir, manager, context) = setup();
        let mut input = vec![b'a'; MAX_COMMAND_LINE as usize + 100];
        input.extend_from_slice(b"\r\nLIST\r\n");

        let out = run(&input, &manager, &context);

        assert!(out.ends_with("400 Command line too long\r\n"));
        assert!(!out.contains("entries"));
    }

    #[test]
    fn test_chunked_store() {
        let (dir, manager, context) = setup();
        let out = run(
            b"STOR * c.txt\r\n5\r\nhello3\r\nabc0\r\nLIST\r\n",
            &manager,
            &context,
        );

        assert!(out.contains("201 Stored 8 bytes\r\n"));
        assert!(out.ends_with("200 1 entries\r\nF\tc.txt\r\n\r\n"));
        assert_eq!(fs::read(dir.path().join("c.txt")).unwrap(), b"helloabc");
    }

    #[test]
    fn test_chunked_store_over_limit_is_rejected() {
        let (dir, manager, context) = setup();
        let out = run(
            b"STOR * big.bin\r\n10\r\n012345678910\r\n01234567890\r\nLIST\r\n",
            &manager,
            &context,
        );

        assert!(out.ends_with("403 Access to this file is forbidden\r\n"));
        assert!(!dir.path().join("big.bin").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_malformed_chunk_header_fails_upload() {
        let (dir, manager, context) = setup();
        let out = run(b"STOR * a.txt\r\nxyz\r\n", &manager, &context);

        assert!(out.ends_with("500 Internal server error\r\n"));
        assert!(!dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_unknown_command() {
        let (_dir, manager, context) = setup();
        let out = run(b"NOOP\r\n", &manager, &context);
        assert!(out.ends_with("400 Invalid request\r\n"));
    }
}
