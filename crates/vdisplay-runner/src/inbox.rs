//! File inbox.
//!
//! External senders append `PORT|MESSAGE` lines to a shared text file. The
//! inbox tails that file from the last committed byte offset, so a message
//! is read again until the bridge has accepted it. A file that shrinks below
//! the committed offset was truncated or replaced and is read from the start.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use vdisplay_engine::{BridgeError, InboundMessage, InboundSource};
use vdisplay_metrics::metric_defs;
use vdisplay_protocol::{IngressCodec, IngressLine};

use crate::error::{RunnerError, RunnerResult};

/// Inbound source backed by an append-only text file.
#[derive(Debug)]
pub struct FileInbox {
    name: String,
    path: PathBuf,
    /// Byte offset after the last committed line.
    committed: u64,
    /// End offset of each item returned by the last poll.
    pending: Vec<u64>,
    rejected: u64,
}

impl FileInbox {
    /// Tail `path` from its beginning.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        FileInbox {
            name: format!("file:{}", path.display()),
            path,
            committed: 0,
            pending: Vec::new(),
            rejected: 0,
        }
    }

    /// Tail `path` from its current end, ignoring what is already there.
    pub fn from_end(path: impl Into<PathBuf>) -> RunnerResult<Self> {
        let mut inbox = Self::new(path);
        inbox.committed = match fs::metadata(&inbox.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(RunnerError::io(&inbox.path, e)),
        };
        Ok(inbox)
    }

    /// Path of the inbox file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset after the last committed line.
    pub fn committed_offset(&self) -> u64 {
        self.committed
    }

    /// Number of malformed lines skipped so far.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    fn read_uncommitted(&mut self) -> io::Result<Vec<u8>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.committed = 0;
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let len = file.metadata()?.len();
        if len < self.committed {
            warn!(path = %self.path.display(), committed = self.committed, len, "inbox truncated, rereading");
            self.committed = 0;
        }

        file.seek(SeekFrom::Start(self.committed))?;
        let mut data = Vec::with_capacity((len - self.committed) as usize);
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    fn reject(&mut self, error: &dyn std::fmt::Display) {
        self.rejected += 1;
        warn!(source = %self.name, error = %error, "skipping malformed inbox line");
        metrics::counter!(metric_defs::BRIDGE_REJECTED.name, "source" => self.name.clone()).increment(1);
    }
}

impl InboundSource for FileInbox {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self) -> Result<Vec<InboundMessage>, BridgeError> {
        self.pending.clear();
        let data = self.read_uncommitted()?;
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let mut codec = IngressCodec::new();
        codec.push(&data);
        let base = self.committed;
        let mut items = Vec::new();

        while let Some(decoded) = codec.decode_line() {
            let end = base + (data.len() - codec.buffered_len()) as u64;
            match decoded {
                Ok(IngressLine { port, message }) => {
                    items.push(InboundMessage::new(port, message));
                    self.pending.push(end);
                }
                Err(e) => {
                    self.reject(&e);
                    // Fold the bad line into the preceding item, or skip it
                    // outright when nothing precedes it.
                    match self.pending.last_mut() {
                        Some(last) => *last = end,
                        None => self.committed = end,
                    }
                }
            }
        }

        if !items.is_empty() {
            debug!(source = %self.name, count = items.len(), partial = codec.buffered_len(), "inbox poll");
        }
        Ok(items)
    }

    fn commit(&mut self, count: usize) {
        let accepted = count.min(self.pending.len());
        if accepted > 0 {
            self.committed = self.pending[accepted - 1];
        }
        self.pending.clear();
    }
}

/// Append one message for `port` to the inbox at `path`.
///
/// This is what an external sender does; parent directories are created as
/// needed.
pub fn send(path: &Path, port: &str, message: &str) -> RunnerResult<()> {
    let line = IngressLine::encode(port, message)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| RunnerError::io(parent, e))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| RunnerError::io(path, e))?;
    file.write_all(line.as_bytes()).map_err(|e| RunnerError::io(path, e))?;
    debug!(path = %path.display(), port, "message appended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn inbox_in(dir: &TempDir) -> (PathBuf, FileInbox) {
        let path = dir.path().join("inbox.txt");
        (path.clone(), FileInbox::new(path))
    }

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new().create(true).append(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let (_, mut inbox) = inbox_in(&dir);
        assert!(inbox.poll().unwrap().is_empty());
    }

    #[test]
    fn test_uncommitted_items_come_back() {
        let dir = TempDir::new().unwrap();
        let (path, mut inbox) = inbox_in(&dir);
        append(&path, "COM1|one\nCOM1|two\nCOM1|three\n");

        assert_eq!(inbox.poll().unwrap().len(), 3);
        inbox.commit(1);

        let again = inbox.poll().unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(again[0].payload, "two");
        inbox.commit(2);
        assert!(inbox.poll().unwrap().is_empty());
    }

    #[test]
    fn test_partial_line_waits_for_terminator() {
        let dir = TempDir::new().unwrap();
        let (path, mut inbox) = inbox_in(&dir);
        append(&path, "COM1|done\nCOM1|half");

        let items = inbox.poll().unwrap();
        assert_eq!(items.len(), 1);
        inbox.commit(1);
        assert_eq!(inbox.committed_offset(), "COM1|done\n".len() as u64);

        append(&path, " way\n");
        let items = inbox.poll().unwrap();
        assert_eq!(items[0].payload, "half way");
    }

    #[test]
    fn test_malformed_lines_are_skipped_once() {
        let dir = TempDir::new().unwrap();
        let (path, mut inbox) = inbox_in(&dir);
        append(&path, "garbage\nCOM1|ok\n|no port\nCOM2|fine\n");

        let items = inbox.poll().unwrap();
        assert_eq!(items.iter().map(|m| m.port.as_str()).collect::<Vec<_>>(), ["COM1", "COM2"]);
        assert_eq!(inbox.rejected(), 2);

        inbox.commit(1);
        let items = inbox.poll().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].port, "COM2");
        assert_eq!(inbox.rejected(), 2);
    }

    #[test]
    fn test_truncation_rereads_from_start() {
        let dir = TempDir::new().unwrap();
        let (path, mut inbox) = inbox_in(&dir);
        append(&path, "COM1|a long first message\n");
        inbox.poll().unwrap();
        inbox.commit(1);

        fs::write(&path, "COM1|b\n").unwrap();
        let items = inbox.poll().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].payload, "b");
    }

    #[test]
    fn test_from_end_skips_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inbox.txt");
        append(&path, "COM1|old\n");

        let mut inbox = FileInbox::from_end(&path).unwrap();
        assert!(inbox.poll().unwrap().is_empty());
        append(&path, "COM1|new\n");
        assert_eq!(inbox.poll().unwrap()[0].payload, "new");
    }

    #[test]
    fn test_send_creates_parents_and_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("inbox.txt");
        send(&path, "COM1", "Hello").unwrap();
        send(&path, "USB0", "\x1B[2HTotal").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "COM1|Hello\nUSB0|\x1B[2HTotal\n");
    }

    #[test]
    fn test_send_rejects_unencodable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inbox.txt");
        assert!(matches!(send(&path, "CO|M1", "x"), Err(RunnerError::Wire(_))));
        assert!(matches!(send(&path, "COM1", "two\nlines"), Err(RunnerError::Wire(_))));
        assert!(!path.exists());
    }
}
