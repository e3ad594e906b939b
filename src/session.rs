//! Per-target build directory and log lifecycle.
//!
//! Every (root, kind, target-name) triple maps to one deterministic build
//! directory, `root/build-<kind>-<name>` with unsafe characters collapsed
//! to underscores. Opening a session wipes and recreates that directory so
//! no artifacts survive from a previous run of the same target, then opens
//! `log.txt` inside it. Closing the session is closing the log; the
//! returned [`Summary`] says whether the target built cleanly.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::log::Summary;
use crate::runner::Runner;

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

/// Deterministic build directory for a target.
///
/// Every maximal run of characters outside `[A-Za-z0-9_-]` in
/// `build-<kind>-<name>` becomes a single underscore, so toolchain names
/// with spaces or slashes still yield one flat directory under `root`.
pub fn build_dir(root: &Path, kind: &str, name: &str) -> PathBuf {
    let raw = format!("build-{kind}-{name}");
    root.join(UNSAFE_CHARS.replace_all(&raw, "_").as_ref())
}

/// Banner prefix used in log lines about a target: `KIND name`.
pub fn log_prefix(kind: &str, name: &str) -> String {
    format!("{} {}", kind.to_uppercase(), name)
}

/// An open build session for one target.
#[derive(Debug)]
pub struct BuildSession {
    dir: PathBuf,
    kind: String,
    name: String,
}

impl BuildSession {
    /// Open a fresh session: wipe and recreate the build directory, open
    /// its log, and optionally chdir into it.
    ///
    /// The `LOGFILE` banner is written before the new log opens, so it
    /// lands on stdout (or whatever log was previously active) where the
    /// outer driver can see which file belongs to which target.
    pub fn open(
        runner: &mut Runner,
        root: &Path,
        kind: &str,
        name: &str,
        chdir: bool,
    ) -> Result<Self> {
        let dir = build_dir(root, kind, name);
        let log_file = dir.join("log.txt");

        runner.info(&format!(
            "{} LOGFILE {}",
            log_prefix(kind, name),
            log_file.display()
        ));

        // Stale directories from a previous run are not an error. The wipe
        // and recreate happen silently; only the banner announces the open.
        let _ = runner.rmtree(&dir, false);
        runner.makedirs(&dir, false);
        runner.log_mut().open(&log_file)?;
        if chdir {
            runner.chdir(&dir, true)?;
        }

        Ok(BuildSession {
            dir,
            kind: kind.to_string(),
            name: name.to_string(),
        })
    }

    /// The session's build directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The kind label, e.g. `cross` or `native`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The target name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of this session's log file.
    pub fn log_file(&self) -> PathBuf {
        self.dir.join("log.txt")
    }

    /// End the session by closing the runner's log.
    ///
    /// The summary carries the error/warning tally accumulated since open;
    /// a target "fails" only through a nonzero count here.
    pub fn close(self, runner: &mut Runner) -> Summary {
        runner.log_mut().close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_dir_is_deterministic() {
        let a = build_dir(Path::new("/r"), "cross", "arm-v7");
        let b = build_dir(Path::new("/r"), "cross", "arm-v7");
        assert_eq!(a, b);
        assert_eq!(a, PathBuf::from("/r/build-cross-arm-v7"));
    }

    #[test]
    fn test_build_dir_sanitizes_unsafe_runs() {
        assert_eq!(
            build_dir(Path::new("/r"), "cross compile", "arm/v7"),
            PathBuf::from("/r/build-cross_compile-arm_v7")
        );
        // A maximal run of unsafe characters collapses to one underscore.
        assert_eq!(
            build_dir(Path::new("/r"), "c++", "a b  c"),
            PathBuf::from("/r/build-c_-a_b_c")
        );
    }

    #[test]
    fn test_log_prefix_uppercases_kind() {
        assert_eq!(log_prefix("cross", "mips64"), "CROSS mips64");
    }

    #[test]
    fn test_open_wipes_previous_contents() {
        let tmp = TempDir::new().unwrap();
        let dir = build_dir(tmp.path(), "cross", "arm");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("stale.o"), "old artifact").unwrap();

        let mut runner = Runner::new();
        let session = BuildSession::open(&mut runner, tmp.path(), "cross", "arm", false).unwrap();

        assert!(!dir.join("stale.o").exists());
        assert!(session.log_file().is_file());
        session.close(&mut runner);
    }

    #[test]
    fn test_session_lifecycle_reports_counts() {
        let tmp = TempDir::new().unwrap();
        let mut runner = Runner::new();

        let session = BuildSession::open(&mut runner, tmp.path(), "cross", "sparc", false).unwrap();
        runner.warn("suspicious flag");
        runner.error("compile failed");

        let log_file = session.log_file();
        let summary = session.close(&mut runner);
        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.path, Some(log_file.clone()));

        let text = std::fs::read_to_string(&log_file).unwrap();
        assert!(text.contains("# WARNING: suspicious flag"));
        assert!(text.contains("# ERROR: compile failed"));
    }

    #[test]
    fn test_open_sequence_is_silent_after_banner() {
        let tmp = TempDir::new().unwrap();
        let outer = tmp.path().join("outer.txt");

        // With a log already active, everything open writes before
        // switching lands in that log: the banner, and nothing else.
        let mut runner = Runner::new();
        runner.log_mut().open(&outer).unwrap();
        let session = BuildSession::open(&mut runner, tmp.path(), "cross", "arm", false).unwrap();
        session.close(&mut runner);

        let text = std::fs::read_to_string(&outer).unwrap();
        assert!(text.contains("CROSS arm LOGFILE"));
        assert!(!text.contains("mkdir -p"));
        assert!(!text.contains("rm -r"));
    }

    #[test]
    fn test_distinct_targets_get_distinct_dirs() {
        let tmp = TempDir::new().unwrap();
        let a = build_dir(tmp.path(), "cross", "arm");
        let b = build_dir(tmp.path(), "cross", "mips");
        let c = build_dir(tmp.path(), "native", "arm");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
