//! Single-file `multipart/form-data` receiver.
//!
//! Only the conventional browser layout is understood: a boundary line, a
//! `Content-Disposition` line carrying the file name, one more header line, a blank
//! line, then the file content up to the next line that contains the boundary.

use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, Take},
};
use tracing::{debug, info, warn};

use crate::config::COLLISION_SUFFIX;

const FILENAME_MARKER: &str = "name=\"file\"; filename=\"";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("content does not begin with boundary")]
    MalformedBody,
    #[error("can't find out the file name")]
    MissingFilename,
    #[error("can't create file to write, do you have permission to write?")]
    WritePermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unexpected end of data")]
    TruncatedBody,
    #[error("failed to write uploaded data: {0}")]
    Io(#[from] io::Error),
}

/// A file that was written completely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub path: PathBuf,
    /// Final name inside the destination directory, collision suffixes included.
    pub file_name: String,
    pub bytes_written: u64,
}

/// Longest piece of a line held in memory at once. Longer lines are handled as several
/// consecutive chunks.
const MAX_LINE_CHUNK: usize = 64 * 1024;

/// Reads lines from the body without ever going past the declared length.
struct UploadSession<R> {
    boundary: Vec<u8>,
    body: Take<R>,
    /// End of the previous chunk when it stopped mid-line, so a boundary split across
    /// two chunks is still seen.
    carry: Vec<u8>,
    next_carry: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> UploadSession<R> {
    fn new(boundary: &[u8], declared_len: u64, body: R) -> Self {
        Self {
            boundary: boundary.to_vec(),
            body: body.take(declared_len),
            carry: Vec::new(),
            next_carry: Vec::new(),
        }
    }

    /// Replaces `buf` with the next line, terminator included, or with the next
    /// `MAX_LINE_CHUNK` bytes of a longer line. Returns 0 once the declared budget or the
    /// stream is exhausted.
    async fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<usize, UploadError> {
        self.carry = std::mem::take(&mut self.next_carry);
        let read = self.read_chunk(buf).await.map_err(|e| {
            warn!(error = %e, remaining = self.remaining(), "upload body stream failed");
            UploadError::TruncatedBody
        })?;

        if buf.last() != Some(&b'\n') {
            let keep = self.boundary.len().saturating_sub(1).min(buf.len());
            self.next_carry.extend_from_slice(&buf[buf.len() - keep..]);
        }
        Ok(read)
    }

    async fn read_chunk(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        buf.clear();
        while buf.len() < MAX_LINE_CHUNK {
            let available = self.body.fill_buf().await?;
            if available.is_empty() {
                break;
            }
            let room = MAX_LINE_CHUNK - buf.len();
            let window = &available[..available.len().min(room)];
            let (mut used, line_done) = match memchr::memchr(b'\n', window) {
                Some(at) => (at + 1, true),
                None => (window.len(), false),
            };
            let full = !line_done && used == room;
            // A CR ending a full chunk stays with the LF that may follow it.
            if full && window[used - 1] == b'\r' && buf.len() + used > 1 {
                used -= 1;
            }
            buf.extend_from_slice(&window[..used]);
            self.body.consume(used);
            if line_done || full {
                break;
            }
        }
        Ok(buf.len())
    }

    fn is_boundary(&self, line: &[u8]) -> bool {
        if memchr::memmem::find(line, &self.boundary).is_some() {
            return true;
        }
        if self.carry.is_empty() {
            return false;
        }
        let head = &line[..line.len().min(self.boundary.len() - 1)];
        let joined = [self.carry.as_slice(), head].concat();
        memchr::memmem::find(&joined, &self.boundary).is_some()
    }

    fn remaining(&self) -> u64 {
        self.body.limit()
    }
}

#[derive(Debug, Clone)]
pub struct UploadReceiver {
    collision_suffix: char,
}

impl Default for UploadReceiver {
    fn default() -> Self {
        Self::new(COLLISION_SUFFIX)
    }
}

impl UploadReceiver {
    pub fn new(collision_suffix: char) -> Self {
        Self { collision_suffix }
    }

    /// Streams the single uploaded file in `body` into `dest_dir`.
    ///
    /// At most `declared_len` bytes are consumed from `body`. On [`UploadError::TruncatedBody`]
    /// whatever was already written stays on disk.
    pub async fn receive<R>(
        &self,
        boundary: &[u8],
        declared_len: u64,
        body: R,
        dest_dir: &Path,
    ) -> Result<StoredUpload, UploadError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut session = UploadSession::new(boundary, declared_len, body);
        let mut line = Vec::new();

        session.read_line(&mut line).await?;
        if !session.is_boundary(&line) {
            return Err(UploadError::MalformedBody);
        }

        session.read_line(&mut line).await?;
        let file_name = extract_filename(&line).ok_or(UploadError::MissingFilename)?;

        // Part Content-Type header and the blank line after it.
        session.read_line(&mut line).await?;
        session.read_line(&mut line).await?;

        let (path, mut output) = self.create_exclusive(dest_dir, &file_name).await?;
        info!(path = %path.display(), declared_len, "receiving upload");

        let mut written: u64 = 0;
        let mut pending = Vec::new();
        session.read_line(&mut pending).await?;

        loop {
            if session.read_line(&mut line).await? == 0 {
                output.flush().await?;
                warn!(
                    path = %path.display(),
                    written,
                    "upload ended before closing boundary"
                );
                return Err(UploadError::TruncatedBody);
            }

            if session.is_boundary(&line) {
                strip_line_terminator(&mut pending);
                output.write_all(&pending).await?;
                output.flush().await?;
                written += pending.len() as u64;

                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                debug!(remaining = session.remaining(), "closing boundary found");
                return Ok(StoredUpload {
                    path,
                    file_name,
                    bytes_written: written,
                });
            }

            output.write_all(&pending).await?;
            written += pending.len() as u64;
            std::mem::swap(&mut pending, &mut line);
        }
    }

    /// Creates `dest_dir/name`, growing the name by one suffix character for as long as
    /// the candidate already exists. `create_new` makes each attempt atomic.
    async fn create_exclusive(
        &self,
        dest_dir: &Path,
        name: &str,
    ) -> Result<(PathBuf, File), UploadError> {
        let mut candidate = name.to_string();
        loop {
            let path = dest_dir.join(&candidate);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    candidate.push(self.collision_suffix);
                }
                Err(source) => {
                    warn!(path = %path.display(), error = %source, "cannot create upload target");
                    return Err(UploadError::WritePermissionDenied { path, source });
                }
            }
        }
    }
}

/// Pulls the `filename` attribute out of a `Content-Disposition` line for the `file`
/// field and reduces it to a bare file name.
fn extract_filename(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let header = &line[line.find("Content-Disposition")?..];
    let value = &header[header.rfind(FILENAME_MARKER)? + FILENAME_MARKER.len()..];
    let value = &value[..value.rfind('"')?];

    // Some clients send the full client-side path.
    let name = value.rsplit(['/', '\\']).next().unwrap_or_default();
    match name {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

/// Drops one trailing `\n` and then one `\r`, the separator the encoding puts before
/// the closing boundary.
fn strip_line_terminator(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
}
