//! Incremental log file tailer.
//!
//! Keeps a byte cursor into one file and hands out only newline-terminated
//! lines appended since the previous poll. An unterminated tail fragment is
//! held back until the writer finishes the line.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use roomscan_protocol::LogFile;
use serde::{Deserialize, Serialize};

use crate::error::TailError;
use crate::locator::{file_id, system_time_millis};

/// Bytes from the start of the file kept to recognize in-place rewrites.
const HEAD_LEN: u64 = 64;

/// Where a freshly opened cursor starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorPolicy {
    /// Read the whole file from byte 0.
    FromStart,
    /// Start at the current end of file; only lines written later are seen.
    SkipHistory,
}

/// Read position in one file.
///
/// `offset` counts every byte taken from the file, including the bytes still
/// sitting in the partial-line buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    file: LogFile,
    offset: u64,
    partial: Vec<u8>,
    /// Drop the first completed line: the cursor was placed mid-line.
    skip_fragment: bool,
    /// First bytes of the file as last seen, at most `HEAD_LEN`.
    head: Vec<u8>,
}

impl Cursor {
    pub fn file(&self) -> &LogFile {
        &self.file
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes of an unterminated line waiting for its newline.
    pub fn pending(&self) -> &[u8] {
        &self.partial
    }

    /// Re-reads the start of the file. Returns `false` if it no longer begins
    /// with the bytes seen before; otherwise extends the stored head.
    fn check_head(&mut self, handle: &mut File, len: u64) -> std::io::Result<bool> {
        let current = read_head(handle, len)?;
        if !current.starts_with(&self.head) {
            return Ok(false);
        }
        self.head = current;
        Ok(true)
    }

    /// Splits complete lines off the buffer, keeping the trailing fragment.
    fn drain_lines(&mut self) -> Vec<String> {
        let Some(last_newline) = self.partial.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };
        let rest = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, rest);

        let mut lines: Vec<String> = complete[..complete.len() - 1]
            .split(|&b| b == b'\n')
            .map(|raw| {
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                String::from_utf8_lossy(raw).into_owned()
            })
            .collect();

        if self.skip_fragment {
            self.skip_fragment = false;
            lines.remove(0);
        }
        lines
    }
}

/// Result of a successful poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Complete lines in file order; empty when nothing new was finished.
    Lines(Vec<String>),
    /// The file was replaced or truncated. The cursor has been dropped and
    /// the caller must locate and open again.
    Rotated,
}

/// Read counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailStats {
    pub total_reads: u64,
    pub total_lines: u64,
    pub empty_reads: u64,
}

/// Tails a single log file.
pub struct TailReader {
    handle: Option<File>,
    cursor: Option<Cursor>,
    max_read_bytes: usize,
    stats: TailStats,
}

impl TailReader {
    /// Creates a closed reader that takes at most `max_read_bytes` per poll.
    pub fn new(max_read_bytes: usize) -> Self {
        Self {
            handle: None,
            cursor: None,
            max_read_bytes: max_read_bytes.max(1),
            stats: TailStats::default(),
        }
    }

    /// Opens `file` with a fresh cursor placed according to `policy`.
    ///
    /// Identity and modification time are re-read from the opened handle,
    /// so a file replaced since it was located is tracked correctly.
    pub fn open(&mut self, file: LogFile, policy: CursorPolicy) -> Result<(), TailError> {
        self.close();

        let mut handle = File::open(&file.path)?;
        let meta = handle.metadata()?;
        let file = LogFile {
            id: file_id(&meta),
            modified: meta
                .modified()
                .map(system_time_millis)
                .unwrap_or(file.modified),
            path: file.path,
        };
        let head = read_head(&mut handle, meta.len())?;

        let (offset, skip_fragment) = match policy {
            CursorPolicy::FromStart => (0, false),
            CursorPolicy::SkipHistory => {
                let len = meta.len();
                (len, len > 0 && !ends_with_newline(&mut handle, len)?)
            }
        };

        tracing::debug!(
            file = %file.path.display(),
            offset,
            ?policy,
            "opened log file"
        );

        self.handle = Some(handle);
        self.cursor = Some(Cursor {
            file,
            offset,
            partial: Vec::new(),
            skip_fragment,
            head,
        });
        Ok(())
    }

    /// Re-opens the file of a cursor returned by [`TailReader::close`] and
    /// continues exactly where it stopped.
    ///
    /// Returns `Rotated` instead if the file changed in the meantime.
    pub fn resume(&mut self, mut cursor: Cursor) -> Result<PollOutcome, TailError> {
        self.close();

        let mut handle = File::open(&cursor.file.path)?;
        let meta = handle.metadata()?;
        if file_id(&meta) != cursor.file.id
            || meta.len() < cursor.offset
            || !cursor.check_head(&mut handle, meta.len())?
        {
            return Ok(PollOutcome::Rotated);
        }

        tracing::debug!(
            file = %cursor.file.path.display(),
            offset = cursor.offset,
            "resumed log file"
        );

        self.handle = Some(handle);
        self.cursor = Some(cursor);
        Ok(PollOutcome::Lines(Vec::new()))
    }

    /// Reads bytes appended since the last poll and returns the lines they
    /// complete.
    pub fn poll(&mut self) -> Result<PollOutcome, TailError> {
        let (Some(handle), Some(cursor)) = (self.handle.as_mut(), self.cursor.as_mut()) else {
            return Err(TailError::NotOpen);
        };

        // Look the path up again: a replaced file keeps our handle on the
        // old inode, and a vanished one must surface as an error. A file
        // rewritten in place keeps its identity but not its first bytes.
        let meta = std::fs::metadata(&cursor.file.path)?;
        if file_id(&meta) != cursor.file.id
            || meta.len() < cursor.offset
            || !cursor.check_head(handle, meta.len())?
        {
            tracing::info!(
                file = %cursor.file.path.display(),
                offset = cursor.offset,
                len = meta.len(),
                "log file rotated or truncated"
            );
            self.close();
            return Ok(PollOutcome::Rotated);
        }

        self.stats.total_reads += 1;

        let available = meta.len() - cursor.offset;
        if available == 0 {
            self.stats.empty_reads += 1;
            return Ok(PollOutcome::Lines(Vec::new()));
        }

        let budget = available.min(self.max_read_bytes as u64);
        handle.seek(SeekFrom::Start(cursor.offset))?;
        let mut buf = Vec::with_capacity(budget as usize);
        let read = handle.take(budget).read_to_end(&mut buf)?;

        cursor.offset += read as u64;
        cursor.partial.extend_from_slice(&buf);
        let lines = cursor.drain_lines();

        if lines.is_empty() {
            self.stats.empty_reads += 1;
        }
        self.stats.total_lines += lines.len() as u64;
        Ok(PollOutcome::Lines(lines))
    }

    /// Releases the file handle and returns the cursor, if one was open.
    pub fn close(&mut self) -> Option<Cursor> {
        self.handle = None;
        let cursor = self.cursor.take();
        if let Some(c) = &cursor {
            tracing::debug!(
                file = %c.file.path.display(),
                offset = c.offset,
                reads = self.stats.total_reads,
                lines = self.stats.total_lines,
                empty_reads = self.stats.empty_reads,
                "closed log file"
            );
        }
        cursor
    }

    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn stats(&self) -> TailStats {
        self.stats
    }
}

impl Default for TailReader {
    fn default() -> Self {
        Self::new(crate::DEFAULT_MAX_READ_BYTES)
    }
}

fn read_head(handle: &mut File, len: u64) -> std::io::Result<Vec<u8>> {
    let want = len.min(HEAD_LEN);
    let mut head = Vec::with_capacity(want as usize);
    handle.seek(SeekFrom::Start(0))?;
    handle.by_ref().take(want).read_to_end(&mut head)?;
    Ok(head)
}

fn ends_with_newline(handle: &mut File, len: u64) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    handle.seek(SeekFrom::Start(len - 1))?;
    handle.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::Path;

    use super::*;
    use crate::locator::{Locate, LogLocator};

    fn append(path: &Path, data: &str) {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .unwrap();
        file.write_all(data.as_bytes()).unwrap();
    }

    fn open_reader(dir: &Path, policy: CursorPolicy, budget: usize) -> TailReader {
        let file = LogLocator::default().locate(dir).unwrap();
        let mut reader = TailReader::new(budget);
        reader.open(file, policy).unwrap();
        reader
    }

    fn lines(outcome: PollOutcome) -> Vec<String> {
        match outcome {
            PollOutcome::Lines(lines) => lines,
            PollOutcome::Rotated => panic!("unexpected rotation"),
        }
    }

    #[test]
    fn partial_line_is_held_until_terminated() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("game.log");
        append(&path, "abc\ndef\n");

        let mut reader = open_reader(tmp.path(), CursorPolicy::FromStart, 1024);
        assert_eq!(lines(reader.poll().unwrap()), vec!["abc", "def"]);

        append(&path, "gh");
        assert!(lines(reader.poll().unwrap()).is_empty());
        assert_eq!(reader.cursor().unwrap().pending(), b"gh");

        append(&path, "i\n");
        assert_eq!(lines(reader.poll().unwrap()), vec!["ghi"]);
        assert_eq!(reader.cursor().unwrap().offset(), 12);
    }

    #[test]
    fn skip_history_starts_at_end() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("game.log");
        append(&path, "old 1\nold 2\n");

        let mut reader = open_reader(tmp.path(), CursorPolicy::SkipHistory, 1024);
        assert!(lines(reader.poll().unwrap()).is_empty());

        append(&path, "new\n");
        assert_eq!(lines(reader.poll().unwrap()), vec!["new"]);
    }

    #[test]
    fn skip_history_mid_line_drops_the_fragment() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("game.log");
        append(&path, "old\nhalf a li");

        let mut reader = open_reader(tmp.path(), CursorPolicy::SkipHistory, 1024);
        append(&path, "ne\nfresh\n");
        assert_eq!(lines(reader.poll().unwrap()), vec!["fresh"]);
    }

    #[test]
    fn no_duplicates_or_gaps_under_fragmentation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("game.log");
        append(&path, "");

        let expected: Vec<String> = (0..40).map(|i| format!("line number {i}")).collect();
        let text: String = expected.iter().map(|l| format!("{l}\n")).collect();

        let mut reader = open_reader(tmp.path(), CursorPolicy::FromStart, 7);
        let mut seen = Vec::new();
        let mut rest = text.as_str();
        let mut step = 1;
        while !rest.is_empty() {
            let cut = step.min(rest.len());
            append(&path, &rest[..cut]);
            rest = &rest[cut..];
            step = step % 11 + 3;
            seen.extend(lines(reader.poll().unwrap()));
        }
        for _ in 0..text.len() {
            seen.extend(lines(reader.poll().unwrap()));
        }

        assert_eq!(seen, expected);
    }

    #[test]
    fn read_budget_spreads_over_polls() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("game.log");
        append(&path, "aaaa\nbbbb\ncccc\n");

        let mut reader = open_reader(tmp.path(), CursorPolicy::FromStart, 6);
        assert_eq!(lines(reader.poll().unwrap()), vec!["aaaa"]);
        assert_eq!(lines(reader.poll().unwrap()), vec!["bbbb"]);
        assert_eq!(lines(reader.poll().unwrap()), vec!["cccc"]);
        assert!(lines(reader.poll().unwrap()).is_empty());
        assert_eq!(reader.stats().total_lines, 3);
    }

    #[test]
    fn crlf_and_invalid_utf8_are_tolerated() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("game.log");
        std::fs::write(&path, b"win\r\nbad \xff byte\n\n").unwrap();

        let mut reader = open_reader(tmp.path(), CursorPolicy::FromStart, 1024);
        assert_eq!(
            lines(reader.poll().unwrap()),
            vec!["win", "bad \u{fffd} byte", ""]
        );
    }

    #[test]
    fn truncation_reports_rotation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("game.log");
        append(&path, "abc\ndef\n");

        let mut reader = open_reader(tmp.path(), CursorPolicy::FromStart, 1024);
        lines(reader.poll().unwrap());

        std::fs::File::create(&path).unwrap();
        append(&path, "x\n");

        assert_eq!(reader.poll().unwrap(), PollOutcome::Rotated);
        assert!(!reader.is_open());
        assert!(matches!(reader.poll(), Err(TailError::NotOpen)));
    }

    #[test]
    fn rewrite_longer_than_offset_reports_rotation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("game.log");
        append(&path, "abc\ndef\n");

        let mut reader = open_reader(tmp.path(), CursorPolicy::FromStart, 1024);
        assert_eq!(lines(reader.poll().unwrap()), vec!["abc", "def"]);

        // Same file, truncated and refilled past the old offset before the
        // next poll.
        std::fs::write(&path, "new session header\nENTERED_ROOM:Atrium\n").unwrap();

        assert_eq!(reader.poll().unwrap(), PollOutcome::Rotated);
        assert!(!reader.is_open());
    }

    #[test]
    fn head_grows_with_appends_without_false_rotation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("game.log");
        append(&path, "a\n");

        let mut reader = open_reader(tmp.path(), CursorPolicy::SkipHistory, 1024);
        for i in 0..20 {
            append(&path, &format!("entry {i}\n"));
            assert_eq!(lines(reader.poll().unwrap()), vec![format!("entry {i}")]);
        }
    }

    #[test]
    fn resume_after_in_place_rewrite_reports_rotation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("game.log");
        append(&path, "one\ntwo\n");

        let mut reader = open_reader(tmp.path(), CursorPolicy::FromStart, 1024);
        lines(reader.poll().unwrap());
        let cursor = reader.close().unwrap();

        std::fs::write(&path, "a different session entirely\n").unwrap();
        assert_eq!(reader.resume(cursor).unwrap(), PollOutcome::Rotated);
        assert!(!reader.is_open());
    }

    #[cfg(unix)]
    #[test]
    fn replacement_reports_rotation_without_stale_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("game.log");
        append(&path, "first\n");

        let mut reader = open_reader(tmp.path(), CursorPolicy::FromStart, 1024);
        assert_eq!(lines(reader.poll().unwrap()), vec!["first"]);

        // Old inode keeps growing, but the path now names a different file.
        let mut old = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        let staging = tmp.path().join("next.tmp");
        std::fs::write(&staging, "replacement with more bytes\n").unwrap();
        std::fs::rename(&staging, &path).unwrap();
        old.write_all(b"stale\n").unwrap();

        assert_eq!(reader.poll().unwrap(), PollOutcome::Rotated);
    }

    #[cfg(unix)]
    #[test]
    fn vanished_file_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("game.log");
        append(&path, "a\n");

        let mut reader = open_reader(tmp.path(), CursorPolicy::FromStart, 1024);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(reader.poll(), Err(TailError::Io(_))));
        // Still open: the next poll retries.
        assert!(reader.is_open());
    }

    #[test]
    fn resume_continues_from_saved_cursor() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("game.log");
        append(&path, "one\ntw");

        let mut reader = open_reader(tmp.path(), CursorPolicy::FromStart, 1024);
        assert_eq!(lines(reader.poll().unwrap()), vec!["one"]);
        let cursor = reader.close().unwrap();
        assert!(!reader.is_open());

        append(&path, "o\nthree\n");
        assert!(lines(reader.resume(cursor).unwrap()).is_empty());
        assert_eq!(lines(reader.poll().unwrap()), vec!["two", "three"]);
    }

    #[test]
    fn resume_after_truncation_is_rotation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("game.log");
        append(&path, "one\ntwo\n");

        let mut reader = open_reader(tmp.path(), CursorPolicy::FromStart, 1024);
        lines(reader.poll().unwrap());
        let cursor = reader.close().unwrap();

        std::fs::write(&path, "").unwrap();
        assert_eq!(reader.resume(cursor).unwrap(), PollOutcome::Rotated);
        assert!(!reader.is_open());
    }

    #[test]
    fn poll_without_open_fails() {
        let mut reader = TailReader::default();
        assert!(matches!(reader.poll(), Err(TailError::NotOpen)));
    }
}
