//! Request path to filesystem path translation.
//!
//! The output of [`resolve`] is always `root` or a descendant of it. Nothing read from the
//! request is ever joined as a whole; only one basename at a time is pushed onto an
//! accumulator that starts at the served root.

use std::path::{Path, PathBuf};

/// Maps a raw request path (query string and fragment allowed) to a path under `root`.
///
/// Pure: never touches the filesystem and never fails. Whether the returned path
/// exists is for the caller to find out.
pub fn resolve(root: &Path, raw_path: &str) -> PathBuf {
    let path = raw_path.split(['?', '#']).next().unwrap_or_default();
    let decoded = urlencoding::decode_binary(path.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);

    let mut resolved = root.to_path_buf();
    for segment in normalize(&decoded) {
        // `file_name` drops drive prefixes and leading directories, and yields
        // nothing for `.` and `..`, so those segments are skipped rather than followed.
        if let Some(name) = Path::new(segment).file_name() {
            resolved.push(name);
        }
    }
    resolved
}

/// Lexical normalization: `//` and `.` collapse, `..` cancels the previous segment.
/// A leading `..` has nothing to cancel and is dropped.
fn normalize(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments
}
