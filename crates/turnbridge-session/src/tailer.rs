//! Follows an append-only transcript file from its current end.

use std::{
    io::SeekFrom,
    path::{Path, PathBuf},
    time::Duration,
};

use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader},
};

/// Longest line buffered before it is delivered without a terminator.
pub const DEFAULT_MAX_LINE: usize = 1 << 20;

/// Tailer error.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("Cannot open transcript {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Transcript read failed: {0}")]
    Read(#[from] std::io::Error),
}

/// Line-by-line follower of a growing file.
#[derive(Debug)]
pub struct TranscriptTailer {
    path: PathBuf,
    reader: BufReader<File>,
    partial: Vec<u8>,
    poll_delay: Duration,
    max_line: usize,
}

impl TranscriptTailer {
    /// Open `path` and position at its current end. History is never replayed.
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or seeked.
    pub async fn open(path: impl AsRef<Path>, poll_delay: Duration) -> Result<Self, TailError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).await.map_err(|source| TailError::Open {
            path: path.clone(),
            source,
        })?;
        let offset = file.seek(SeekFrom::End(0)).await?;
        tracing::info!(path = %path.display(), offset, "Tailing transcript");

        Ok(Self {
            path,
            reader: BufReader::new(file),
            partial: Vec::new(),
            poll_delay,
            max_line: DEFAULT_MAX_LINE,
        })
    }

    /// Deliver unterminated lines once they reach `bytes`.
    #[must_use]
    pub fn with_max_line(mut self, bytes: usize) -> Self {
        self.max_line = bytes.max(1);
        self
    }

    /// Path being followed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the next complete line, without its terminator.
    ///
    /// Cancel safe: bytes read before cancellation stay buffered and are
    /// returned by the next call.
    ///
    /// # Errors
    /// Returns error if reading the file fails.
    pub async fn next_line(&mut self) -> Result<String, TailError> {
        loop {
            let room = self.max_line.saturating_sub(self.partial.len());
            let room = u64::try_from(room).unwrap_or(u64::MAX);
            let read = (&mut self.reader)
                .take(room)
                .read_until(b'\n', &mut self.partial)
                .await?;

            if self.partial.last() == Some(&b'\n') {
                return Ok(self.take_line());
            }
            if self.partial.len() >= self.max_line {
                tracing::warn!(
                    bytes = self.partial.len(),
                    "Transcript line over limit, delivering it split"
                );
                return Ok(self.take_line());
            }
            if read == 0 {
                tokio::time::sleep(self.poll_delay).await;
            }
        }
    }

    fn take_line(&mut self) -> String {
        let bytes = std::mem::take(&mut self.partial);
        String::from_utf8_lossy(&bytes)
            .trim_end_matches(['\n', '\r'])
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const POLL: Duration = Duration::from_millis(5);
    const WAIT: Duration = Duration::from_secs(2);

    fn append(file: &mut std::fs::File, data: &[u8]) {
        file.write_all(data).unwrap();
        file.flush().unwrap();
    }

    #[tokio::test]
    async fn test_starts_at_end() {
        let mut transcript = tempfile::NamedTempFile::new().unwrap();
        append(transcript.as_file_mut(), b"old line\n");

        let mut tailer = TranscriptTailer::open(transcript.path(), POLL).await.unwrap();
        append(transcript.as_file_mut(), b"new line\n");

        let line = tokio::time::timeout(WAIT, tailer.next_line()).await.unwrap();
        assert_eq!(line.unwrap(), "new line");
    }

    #[tokio::test]
    async fn test_lines_in_order() {
        let mut transcript = tempfile::NamedTempFile::new().unwrap();
        let mut tailer = TranscriptTailer::open(transcript.path(), POLL).await.unwrap();
        append(transcript.as_file_mut(), b"one\r\ntwo\nthree\n");

        for expected in ["one", "two", "three"] {
            let line = tokio::time::timeout(WAIT, tailer.next_line()).await.unwrap();
            assert_eq!(line.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_partial_line_delivered_once() {
        let mut transcript = tempfile::NamedTempFile::new().unwrap();
        let mut tailer = TranscriptTailer::open(transcript.path(), POLL).await.unwrap();
        append(transcript.as_file_mut(), b"half a ");

        let pending = tokio::time::timeout(Duration::from_millis(50), tailer.next_line()).await;
        assert!(pending.is_err());

        append(transcript.as_file_mut(), b"line\n");
        let line = tokio::time::timeout(WAIT, tailer.next_line()).await.unwrap();
        assert_eq!(line.unwrap(), "half a line");
    }

    #[tokio::test]
    async fn test_overlong_line_is_split() {
        let mut transcript = tempfile::NamedTempFile::new().unwrap();
        let mut tailer = TranscriptTailer::open(transcript.path(), POLL)
            .await
            .unwrap()
            .with_max_line(8);
        append(transcript.as_file_mut(), b"0123456789abc");

        let line = tokio::time::timeout(WAIT, tailer.next_line()).await.unwrap();
        assert_eq!(line.unwrap(), "01234567");

        append(transcript.as_file_mut(), b"\n");
        let line = tokio::time::timeout(WAIT, tailer.next_line()).await.unwrap();
        assert_eq!(line.unwrap(), "89abc");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let mut transcript = tempfile::NamedTempFile::new().unwrap();
        let mut tailer = TranscriptTailer::open(transcript.path(), POLL).await.unwrap();
        append(transcript.as_file_mut(), b"ok \xff here\n");

        let line = tokio::time::timeout(WAIT, tailer.next_line()).await.unwrap();
        assert_eq!(line.unwrap(), "ok \u{fffd} here");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TranscriptTailer::open(dir.path().join("absent.log"), POLL)
            .await
            .unwrap_err();
        assert!(matches!(err, TailError::Open { .. }));
    }
}
