//! Lexical path normalization
//!
//! Nothing here touches the filesystem.

/// Current-directory marker, also the normalized form of an empty path.
pub const CURRENT_DIR: &str = ".";
pub const PARENT_DIR: &str = "..";

/// Collapses `.` and `..` segments and redundant separators.
///
/// Backslashes count as separators. A rooted path never climbs above `/`;
/// a relative path keeps the `..` segments it cannot resolve. An empty
/// result becomes `.`.
pub fn clean(raw: &str) -> String {
    let folded = raw.replace('\\', "/");
    let rooted = folded.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in folded.split('/') {
        match segment {
            "" | CURRENT_DIR => {}
            PARENT_DIR => match segments.last() {
                Some(last) if *last != PARENT_DIR => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(PARENT_DIR),
            },
            name => segments.push(name),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => CURRENT_DIR.to_string(),
        (false, false) => joined,
    }
}

/// True for `/...`, and on Windows also for drive prefixes such as `C:`.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || has_drive_prefix(path)
}

#[cfg(windows)]
fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(not(windows))]
fn has_drive_prefix(_path: &str) -> bool {
    false
}

/// Final segment of a normalized path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
