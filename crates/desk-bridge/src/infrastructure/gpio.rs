//! Digital lines backed by sysfs GPIO value files.
//!
//! Each line is a path such as `/sys/class/gpio/gpio17/value` that the board
//! set-up has already exported and configured.  Lines left out of the
//! configuration fall back to [`NullLine`].

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::application::ports::{InputLine, OutputLine};

/// An output line written through its sysfs value file.
#[derive(Debug)]
pub struct SysfsOutput {
    path: PathBuf,
}

impl SysfsOutput {
    /// Checks that `path` is writable and drives the line low.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        OpenOptions::new().write(true).open(&path)?;
        let line = Self { path };
        line.set(false)?;
        Ok(line)
    }
}

impl OutputLine for SysfsOutput {
    fn set(&self, high: bool) -> io::Result<()> {
        fs::write(&self.path, if high { b"1" } else { b"0" })
    }
}

/// An input line read through its sysfs value file.
#[derive(Debug)]
pub struct SysfsInput {
    path: PathBuf,
}

impl SysfsInput {
    /// Checks that `path` is readable.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let line = Self {
            path: path.as_ref().to_path_buf(),
        };
        line.is_high()?;
        Ok(line)
    }
}

impl InputLine for SysfsInput {
    fn is_high(&self) -> io::Result<bool> {
        Ok(fs::read_to_string(&self.path)?.trim() == "1")
    }
}

/// A line that is not wired: writes are ignored and reads are low.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLine;

impl OutputLine for NullLine {
    fn set(&self, _high: bool) -> io::Result<()> {
        Ok(())
    }
}

impl InputLine for NullLine {
    fn is_high(&self) -> io::Result<bool> {
        Ok(false)
    }
}

pub mod mock {
    //! A recording line for tests.

    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use crate::application::ports::{InputLine, OutputLine};

    /// Records every level written and returns a test-controlled input level.
    #[derive(Debug, Default)]
    pub struct RecordingLine {
        levels: Mutex<Vec<bool>>,
        input: AtomicBool,
    }

    impl RecordingLine {
        pub fn new() -> Self {
            Self::default()
        }

        /// Levels written so far, oldest first.
        pub fn levels(&self) -> Vec<bool> {
            self.levels.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }

        /// Sets what [`InputLine::is_high`] reports.
        pub fn set_input(&self, high: bool) {
            self.input.store(high, Ordering::SeqCst);
        }
    }

    impl OutputLine for RecordingLine {
        fn set(&self, high: bool) -> io::Result<()> {
            self.levels
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(high);
            Ok(())
        }
    }

    impl InputLine for RecordingLine {
        fn is_high(&self) -> io::Result<bool> {
            Ok(self.input.load(Ordering::SeqCst))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
