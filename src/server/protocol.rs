//! Command protocol
//!
//! One command per line: a case-insensitive verb followed by its argument.
//! Replies are `<code> <text>\r\n`.

/// Response codes
pub const OK: u16 = 200;
pub const CREATED: u16 = 201;
pub const READY: u16 = 220;
pub const CLOSING: u16 = 221;
pub const PENDING: u16 = 350;
pub const BAD_REQUEST: u16 = 400;
pub const FORBIDDEN: u16 = 403;

/// Size placeholder announcing a chunked `STOR` body
pub const CHUNKED_SIZE: &str = "*";

/// Commands understood by a session.
#[derive(Debug, PartialEq)]
pub enum Command {
    List(String),
    MakeDir(String),
    Delete(String),
    RenameFrom(String),
    RenameTo(String),
    /// Followed by exactly `size` raw bytes, or by chunks when the size
    /// is sent as `*`
    Store { size: Option<u64>, path: String },
    Retrieve(String),
    Zip(String),
    Quit,
    Unknown(String),
}

/// Parses a raw command line into a [`Command`].
///
/// Known verbs with a missing or malformed argument become `Unknown`.
pub fn parse_command(raw: &str) -> Command {
    let trimmed = raw.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("").to_ascii_uppercase();
    let arg = parts.next().unwrap_or("").trim();

    match cmd.as_str() {
        "QUIT" | "Q" => Command::Quit,
        "LIST" => Command::List(arg.to_string()),
        "ZIP" => Command::Zip(arg.to_string()),
        "MKD" if !arg.is_empty() => Command::MakeDir(arg.to_string()),
        "DELE" if !arg.is_empty() => Command::Delete(arg.to_string()),
        "RNFR" if !arg.is_empty() => Command::RenameFrom(arg.to_string()),
        "RNTO" if !arg.is_empty() => Command::RenameTo(arg.to_string()),
        "RETR" if !arg.is_empty() => Command::Retrieve(arg.to_string()),
        "STOR" => parse_store(arg).unwrap_or_else(|| Command::Unknown(trimmed.to_string())),
        _ => Command::Unknown(trimmed.to_string()),
    }
}

/// `STOR <size> <path>` or `STOR * <path>`
fn parse_store(arg: &str) -> Option<Command> {
    let mut parts = arg.splitn(2, char::is_whitespace);
    let size = match parts.next()? {
        CHUNKED_SIZE => None,
        size => Some(size.parse::<u64>().ok()?),
    };
    let path = parts.next()?.trim();
    if path.is_empty() {
        return None;
    }
    Some(Command::Store {
        size,
        path: path.to_string(),
    })
}

/// Format a single-line response
pub fn format_response(code: u16, message: &str) -> String {
    format!("{} {}\r\n", code, message)
}

/// One listing line: `D\t<name>` for folders, `F\t<name>` for files.
pub fn format_entry(name: &str, is_dir: bool) -> String {
    let marker = if is_dir { 'D' } else { 'F' };
    format!("{}\t{}\r\n", marker, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_verbs() {
        assert_eq!(parse_command("QUIT"), Command::Quit);
        assert_eq!(parse_command("q\r\n"), Command::Quit);
        assert_eq!(parse_command("LIST"), Command::List(String::new()));
        assert_eq!(parse_command("ZIP"), Command::Zip(String::new()));
    }

    #[test]
    fn test_parse_path_arguments() {
        assert_eq!(
            parse_command("list docs/sub\r\n"),
            Command::List("docs/sub".to_string())
        );
        assert_eq!(
            parse_command("MKD my folder"),
            Command::MakeDir("my folder".to_string())
        );
        assert_eq!(
            parse_command("DELE old.txt"),
            Command::Delete("old.txt".to_string())
        );
        assert_eq!(
            parse_command("RNFR a.txt"),
            Command::RenameFrom("a.txt".to_string())
        );
        assert_eq!(
            parse_command("RNTO b.txt"),
            Command::RenameTo("b.txt".to_string())
        );
        assert_eq!(
            parse_command("RETR docs/readme.txt"),
            Command::Retrieve("docs/readme.txt".to_string())
        );
    }

    #[test]
    fn test_parse_store() {
        assert_eq!(
            parse_command("STOR 5 docs/read me.txt"),
            Command::Store {
                size: Some(5),
                path: "docs/read me.txt".to_string()
            }
        );
        assert_eq!(
            parse_command("STOR * big.iso"),
            Command::Store {
                size: None,
                path: "big.iso".to_string()
            }
        );
        assert_eq!(
            parse_command("STOR five a.txt"),
            Command::Unknown("STOR five a.txt".to_string())
        );
        assert_eq!(
            parse_command("STOR 5"),
            Command::Unknown("STOR 5".to_string())
        );
    }

    #[test]
    fn test_missing_arguments_are_unknown() {
        assert_eq!(parse_command("MKD"), Command::Unknown("MKD".to_string()));
        assert_eq!(parse_command("RETR  "), Command::Unknown("RETR".to_string()));
        assert_eq!(parse_command(""), Command::Unknown(String::new()));
        assert_eq!(
            parse_command("FOO bar"),
            Command::Unknown("FOO bar".to_string())
        );
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_response(OK, "Deleted"), "200 Deleted\r\n");
        assert_eq!(format_entry("docs", true), "D\tdocs\r\n");
        assert_eq!(format_entry("a.txt", false), "F\ta.txt\r\n");
    }
}
