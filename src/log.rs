//! Per-session build log with deferred error reporting.
//!
//! A [`BuildLog`] is either detached (messages go to standard output) or
//! attached to a log file inside a build directory. Messages are one line
//! each, tagged `# INFO:`, `# WARNING:`, or `# ERROR:`, and flushed as they
//! are written so a partially built target still leaves a usable trail.
//!
//! Nothing here fails fast: warnings and errors only bump counters, and the
//! caller learns about trouble from the [`Summary`] returned by
//! [`BuildLog::close`]. Each log is an owned value, not process-global
//! state, so concurrently running sessions must simply hold their own.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Tally reported when a log is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Number of `# ERROR:` lines written while the log was open.
    pub errors: u32,
    /// Number of `# WARNING:` lines written while the log was open.
    pub warnings: u32,
    /// Path of the log file, if one was attached.
    pub path: Option<PathBuf>,
}

impl Summary {
    /// True when the session finished without errors or warnings.
    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.warnings == 0
    }
}

#[derive(Debug)]
struct Sink {
    file: File,
    path: PathBuf,
}

/// A line-oriented log sink with running error/warning counters.
#[derive(Debug, Default)]
pub struct BuildLog {
    sink: Option<Sink>,
    num_errors: u32,
    num_warnings: u32,
}

impl BuildLog {
    /// Create a detached log; messages go to standard output.
    pub fn new() -> Self {
        BuildLog::default()
    }

    /// Attach the log to a file, closing any previously attached file first.
    ///
    /// Closing the previous file prints its summary and resets the counters,
    /// so counts never leak from one target into the next.
    pub fn open(&mut self, path: &Path) -> Result<()> {
        if self.sink.is_some() {
            self.close();
        }
        let file = File::create(path)
            .with_context(|| format!("failed to open log file: {}", path.display()))?;
        self.sink = Some(Sink {
            file,
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Detach the log and report the accumulated tally.
    ///
    /// Prints a one-line pointer to the log file when anything went wrong,
    /// then resets both counters to zero.
    pub fn close(&mut self) -> Summary {
        let path = self.sink.as_ref().map(|s| s.path.clone());
        if let Some(sink) = self.sink.take() {
            if self.num_errors > 0 {
                println!("# ERROR: There were errors, see {}", sink.path.display());
            } else if self.num_warnings > 0 {
                println!("# WARNING: There were warnings, see {}", sink.path.display());
            }
        }
        let summary = Summary {
            errors: self.num_errors,
            warnings: self.num_warnings,
            path,
        };
        self.num_errors = 0;
        self.num_warnings = 0;
        summary
    }

    /// Whether a log file is currently attached.
    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    /// Path of the attached log file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|s| s.path.as_path())
    }

    /// Errors reported since the log was opened.
    pub fn errors(&self) -> u32 {
        self.num_errors
    }

    /// Warnings reported since the log was opened.
    pub fn warnings(&self) -> u32 {
        self.num_warnings
    }

    /// Write an informational line.
    pub fn info(&mut self, msg: &str) {
        self.write_line("# INFO: ", msg);
    }

    /// Write a warning line and bump the warning counter.
    pub fn warn(&mut self, msg: &str) {
        self.write_line("# WARNING: ", msg);
        self.num_warnings += 1;
    }

    /// Write an error line and bump the error counter.
    pub fn error(&mut self, msg: &str) {
        self.write_line("# ERROR: ", msg);
        self.num_errors += 1;
    }

    fn write_line(&mut self, prefix: &str, msg: &str) {
        match self.sink.as_mut() {
            Some(sink) => {
                // Best effort: a log write failure must not abort the build.
                let _ = writeln!(sink.file, "{prefix}{msg}");
                let _ = sink.file.flush();
            }
            None => {
                println!("{prefix}{msg}");
                let _ = io::stdout().flush();
            }
        }
    }
}
