//! Typing simulation straight into a program's controlling terminal.
//!
//! Best-effort and platform dependent: the default locator reads a
//! `/proc`-style process table, so it only finds anything on Linux.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use turnbridge_core::{InjectError, KeystrokeInjector, TtyLocator, traits::menu_steps};

/// Default pause between typed characters.
pub const DEFAULT_CHAR_DELAY: Duration = Duration::from_millis(20);

const CURSOR_DOWN: &[u8] = b"\x1b[B";

/// Finds a process's terminal by scanning a `/proc`-style directory.
#[derive(Debug, Clone)]
pub struct ProcTtyLocator {
    root: PathBuf,
}

impl Default for ProcTtyLocator {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcTtyLocator {
    /// Scan the process table mounted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn matches(dir: &Path, process_name: &str) -> bool {
        let comm = fs::read_to_string(dir.join("comm")).unwrap_or_default();
        if comm.trim().contains(process_name) {
            return true;
        }
        fs::read(dir.join("cmdline"))
            .map(|raw| String::from_utf8_lossy(&raw).replace('\0', " "))
            .is_ok_and(|cmdline| cmdline.contains(process_name))
    }

    fn terminal(dir: &Path) -> Option<PathBuf> {
        let target = fs::read_link(dir.join("fd").join("0")).ok()?;
        target.starts_with("/dev/").then_some(target)
    }
}

impl TtyLocator for ProcTtyLocator {
    fn locate(&self, process_name: &str) -> Option<PathBuf> {
        let entries = fs::read_dir(&self.root).ok()?;
        let mut pids: Vec<(u32, PathBuf)> = entries
            .filter_map(Result::ok)
            .filter_map(|e| {
                let pid = e.file_name().to_str()?.parse::<u32>().ok()?;
                Some((pid, e.path()))
            })
            .collect();
        pids.sort_unstable_by_key(|(pid, _)| *pid);

        pids.into_iter()
            .filter(|(_, dir)| Self::matches(dir, process_name))
            .find_map(|(pid, dir)| {
                let tty = Self::terminal(&dir)?;
                tracing::debug!(pid, tty = %tty.display(), "Located terminal");
                Some(tty)
            })
    }
}

/// Writes keystrokes to the terminal device of a named process.
pub struct TtyTypist {
    locator: Arc<dyn TtyLocator>,
    process_name: String,
    char_delay: Duration,
}

impl std::fmt::Debug for TtyTypist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtyTypist")
            .field("process_name", &self.process_name)
            .field("char_delay", &self.char_delay)
            .finish_non_exhaustive()
    }
}

impl TtyTypist {
    /// Type into the terminal of the first process matching `process_name`.
    #[must_use]
    pub fn new(locator: Arc<dyn TtyLocator>, process_name: impl Into<String>) -> Self {
        Self {
            locator,
            process_name: process_name.into(),
            char_delay: DEFAULT_CHAR_DELAY,
        }
    }

    /// Pause between characters.
    #[must_use]
    pub const fn with_char_delay(mut self, delay: Duration) -> Self {
        self.char_delay = delay;
        self
    }

    async fn open(&self) -> Result<(PathBuf, tokio::fs::File), InjectError> {
        let locator = Arc::clone(&self.locator);
        let name = self.process_name.clone();
        let tty = tokio::task::spawn_blocking(move || locator.locate(&name))
            .await
            .ok()
            .flatten()
            .ok_or_else(|| InjectError::TargetNotFound(self.process_name.clone()))?;
        let file = tokio::fs::OpenOptions::new().write(true).open(&tty).await?;
        Ok((tty, file))
    }
}

#[async_trait]
impl KeystrokeInjector for TtyTypist {
    async fn submit_text(&self, text: &str) -> Result<(), InjectError> {
        let (tty, mut file) = self.open().await?;
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            file.write_all(ch.encode_utf8(&mut buf).as_bytes()).await?;
            file.flush().await?;
            if !self.char_delay.is_zero() {
                tokio::time::sleep(self.char_delay).await;
            }
        }
        file.write_all(b"\n").await?;
        file.flush().await?;
        tracing::info!(tty = %tty.display(), chars = text.chars().count(), "Typed text");
        Ok(())
    }

    async fn select_option(&self, index: u32) -> Result<(), InjectError> {
        let steps = menu_steps(index)?;
        let (tty, mut file) = self.open().await?;
        for _ in 0..steps {
            file.write_all(CURSOR_DOWN).await?;
        }
        file.write_all(b"\r").await?;
        file.flush().await?;
        tracing::info!(tty = %tty.display(), index, "Selected menu option");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLocator(Option<PathBuf>);

    impl TtyLocator for FixedLocator {
        fn locate(&self, _process_name: &str) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    #[cfg(unix)]
    fn fake_process(root: &Path, pid: u32, comm: &str, cmdline: &str, tty: &str) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(dir.join("fd")).unwrap();
        fs::write(dir.join("comm"), format!("{comm}\n")).unwrap();
        fs::write(dir.join("cmdline"), cmdline.replace(' ', "\0")).unwrap();
        std::os::unix::fs::symlink(tty, dir.join("fd").join("0")).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_locates_by_comm() {
        let root = tempfile::tempdir().unwrap();
        fake_process(root.path(), 10, "bash", "bash -l", "/dev/pts/1");
        fake_process(root.path(), 42, "claude", "claude", "/dev/pts/7");
        let locator = ProcTtyLocator::new(root.path());
        assert_eq!(locator.locate("claude"), Some(PathBuf::from("/dev/pts/7")));
    }

    #[cfg(unix)]
    #[test]
    fn test_locates_by_cmdline() {
        let root = tempfile::tempdir().unwrap();
        fake_process(root.path(), 5, "node", "node /usr/bin/claude --resume", "/dev/pts/3");
        let locator = ProcTtyLocator::new(root.path());
        assert_eq!(locator.locate("claude"), Some(PathBuf::from("/dev/pts/3")));
    }

    #[cfg(unix)]
    #[test]
    fn test_skips_processes_without_terminal() {
        let root = tempfile::tempdir().unwrap();
        fake_process(root.path(), 3, "claude", "claude", "/tmp/pipe");
        fake_process(root.path(), 4, "claude", "claude", "/dev/pts/9");
        fs::create_dir_all(root.path().join("self")).unwrap();
        let locator = ProcTtyLocator::new(root.path());
        assert_eq!(locator.locate("claude"), Some(PathBuf::from("/dev/pts/9")));
        assert_eq!(locator.locate("vim"), None);
    }

    #[tokio::test]
    async fn test_types_text_then_newline() {
        let out = tempfile::NamedTempFile::new().unwrap();
        let typist = TtyTypist::new(
            Arc::new(FixedLocator(Some(out.path().to_path_buf()))),
            "claude",
        )
        .with_char_delay(Duration::ZERO);

        typist.submit_text("héllo").await.unwrap();
        assert_eq!(fs::read_to_string(out.path()).unwrap(), "héllo\n");
    }

    #[tokio::test]
    async fn test_select_writes_cursor_moves() {
        let out = tempfile::NamedTempFile::new().unwrap();
        let typist = TtyTypist::new(
            Arc::new(FixedLocator(Some(out.path().to_path_buf()))),
            "claude",
        );

        typist.select_option(3).await.unwrap();
        assert_eq!(fs::read(out.path()).unwrap(), b"\x1b[B\x1b[B\r");
    }

    /// Remembers which thread ran the process scan.
    struct ThreadRecordingLocator {
        target: PathBuf,
        ran_on: std::sync::Mutex<Option<std::thread::ThreadId>>,
    }

    impl TtyLocator for ThreadRecordingLocator {
        fn locate(&self, _process_name: &str) -> Option<PathBuf> {
            *self.ran_on.lock().unwrap() = Some(std::thread::current().id());
            Some(self.target.clone())
        }
    }

    #[tokio::test]
    async fn test_scan_runs_off_the_runtime_thread() {
        let out = tempfile::NamedTempFile::new().unwrap();
        let locator = Arc::new(ThreadRecordingLocator {
            target: out.path().to_path_buf(),
            ran_on: std::sync::Mutex::new(None),
        });
        let typist = TtyTypist::new(Arc::clone(&locator) as Arc<dyn TtyLocator>, "claude")
            .with_char_delay(Duration::ZERO);

        typist.submit_text("x").await.unwrap();
        let ran_on = locator.ran_on.lock().unwrap().expect("locator not called");
        assert_ne!(ran_on, std::thread::current().id());
    }

    #[tokio::test]
    async fn test_missing_target() {
        let typist = TtyTypist::new(Arc::new(FixedLocator(None)), "claude");
        let err = typist.submit_text("x").await.unwrap_err();
        assert!(matches!(err, InjectError::TargetNotFound(name) if name == "claude"));
    }
}
