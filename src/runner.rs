//! Logged command execution and filesystem primitives.
//!
//! A [`Runner`] owns the [`BuildLog`] for one target and funnels every
//! mutating action through it, logging a shell-equivalent line (`cp -av`,
//! `mkdir -p`, ...) before acting. The error policy is deliberate: nothing
//! here returns early through the caller for ordinary operational problems.
//! Expectation checks log warnings and answer `false`, spawn failures log
//! errors and hand back the error text, and cleanup is idempotent. The
//! caller reads the accumulated counters at session close.
//!
//! The pure queries (`basename`, `mtime`, `owner`, ...) live as free
//! functions since they touch neither the log nor any other runner state.

use std::env;
use std::fs::{self, File};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::SystemTime;

use crate::log::BuildLog;

/// Captured output of an argv-style command.
///
/// A stream redirected to a file comes back empty; the bytes are on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Command execution and filesystem actions scoped to one target's log.
#[derive(Debug, Default)]
pub struct Runner {
    log: BuildLog,
}

impl Runner {
    /// Create a runner with a detached log (messages go to stdout until a
    /// session opens a log file).
    pub fn new() -> Self {
        Runner::default()
    }

    /// The target's log.
    pub fn log(&self) -> &BuildLog {
        &self.log
    }

    /// Mutable access to the target's log.
    pub fn log_mut(&mut self) -> &mut BuildLog {
        &mut self.log
    }

    /// Write an informational line to the target's log.
    pub fn info(&mut self, msg: &str) {
        self.log.info(msg);
    }

    /// Write a warning line to the target's log.
    pub fn warn(&mut self, msg: &str) {
        self.log.warn(msg);
    }

    /// Write an error line to the target's log.
    pub fn error(&mut self, msg: &str) {
        self.log.error(msg);
    }

    /// Run a shell command line, fire-and-forget.
    ///
    /// Redirection targets are appended as shell syntax before execution,
    /// so the logged line is exactly what the shell sees. No output or exit
    /// status is handed back; callers inspect on-disk artifacts instead.
    pub fn run_shell(
        &mut self,
        cmd: &str,
        stdout: Option<&Path>,
        stderr: Option<&Path>,
        verbose: bool,
    ) {
        let mut line = cmd.to_string();
        match (stdout, stderr) {
            (Some(out), Some(err)) => {
                line.push_str(&format!(" 1>{} 2>{}", out.display(), err.display()));
            }
            (Some(out), None) => {
                line.push_str(&format!(" 1>{} 2>&1", out.display()));
            }
            (None, Some(err)) => {
                line.push_str(&format!(" 2>{}", err.display()));
            }
            (None, None) => {}
        }
        if verbose {
            self.log.info(&line);
        }
        let _ = shell_command(&line).status();
    }

    /// Run an argv-style command and capture its output.
    ///
    /// With a `stdout` target, the child's standard output goes to that file
    /// and only stderr is piped back. A spawn failure (executable missing,
    /// permission denied) is logged as an error and reported through the
    /// returned `stderr` text; it never propagates.
    pub fn run(&mut self, argv: &[String], stdout: Option<&Path>, verbose: bool) -> RunOutput {
        let mut line = argv.join(" ");

        let stdout_file = match stdout {
            Some(path) => {
                line.push_str(&format!(" 1>{} 2>&1", path.display()));
                match File::create(path) {
                    Ok(f) => Some(f),
                    Err(e) => {
                        self.log.error(&format!("Command: {line}"));
                        self.log.error(&e.to_string());
                        return RunOutput {
                            stdout: String::new(),
                            stderr: e.to_string(),
                        };
                    }
                }
            }
            None => None,
        };

        if verbose {
            self.log.info(&line);
        }

        let (program, args) = match argv.split_first() {
            Some(split) => split,
            None => {
                self.log.error("Command: (empty argument vector)");
                return RunOutput {
                    stdout: String::new(),
                    stderr: "empty argument vector".to_string(),
                };
            }
        };

        let mut cmd = Command::new(program);
        cmd.args(args);
        match stdout_file {
            Some(f) => {
                cmd.stdout(Stdio::from(f));
            }
            None => {
                cmd.stdout(Stdio::piped());
            }
        }
        cmd.stderr(Stdio::piped());

        match cmd.output() {
            Ok(output) => RunOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Err(e) => {
                tracing::debug!("spawn failed for {program}: {e}");
                self.log.error(&format!("Command: {line}"));
                self.log.error(&e.to_string());
                RunOutput {
                    stdout: String::new(),
                    stderr: e.to_string(),
                }
            }
        }
    }

    /// Layered check: exists, non-empty, readable.
    ///
    /// The first failing layer logs a warning and answers `false`.
    pub fn is_readable_file(&mut self, path: &Path) -> bool {
        if !is_file(path) {
            self.log.warn(&format!("{} does not exist", path.display()));
            return false;
        }
        let len = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if len == 0 {
            self.log.warn(&format!("{} is empty", path.display()));
            return false;
        }
        if File::open(path).is_err() {
            self.log.warn(&format!("{} is not readable", path.display()));
            return false;
        }
        true
    }

    /// [`Runner::is_readable_file`] plus an execute-permission check.
    pub fn is_executable_file(&mut self, path: &Path) -> bool {
        if !self.is_readable_file(path) {
            return false;
        }
        if !has_execute_bit(path) {
            self.log.warn(&format!("{} is not executable", path.display()));
            return false;
        }
        true
    }

    /// Copy a file into a directory, creating the directory if needed.
    ///
    /// I/O failures are logged as errors and swallowed; a failed export is
    /// visible only in the log and the error counter.
    pub fn export_file(&mut self, src: &Path, dst_dir: &Path) {
        if !is_dir(dst_dir) {
            self.makedirs(dst_dir, true);
        }
        if let Err(e) = self.copy(src, dst_dir, true) {
            self.log.error(&format!(
                "Error occurred exporting {} to {}",
                src.display(),
                dst_dir.display()
            ));
            self.log.error(&format!("Unexpected error: {e}"));
        }
    }

    /// Recursively delete a directory.
    pub fn rmtree(&mut self, dir: &Path, verbose: bool) -> io::Result<()> {
        if verbose {
            self.log.info(&format!("rm -r {}", dir.display()));
        }
        fs::remove_dir_all(dir)
    }

    /// Create a directory and its parents; already existing is success.
    pub fn makedirs(&mut self, dir: &Path, verbose: bool) {
        if verbose {
            self.log.info(&format!("mkdir -p {}", dir.display()));
        }
        if !dir.is_dir() {
            let _ = fs::create_dir_all(dir);
        }
    }

    /// Copy a file or directory.
    ///
    /// File sources copy into `dst` (or into the directory `dst` names).
    /// Directory sources replace: any existing destination directory is
    /// deleted first, then the tree is copied whole. Never a merge.
    pub fn copy(&mut self, src: &Path, dst: &Path, verbose: bool) -> io::Result<()> {
        if !src.is_dir() {
            if verbose {
                self.log
                    .info(&format!("cp -av {} {}", src.display(), dst.display()));
            }
            let target = if dst.is_dir() {
                dst.join(basename(src))
            } else {
                dst.to_path_buf()
            };
            fs::copy(src, target)?;
            Ok(())
        } else {
            if verbose {
                self.log
                    .info(&format!("cp -avr {} {}", src.display(), dst.display()));
            }
            if dst.exists() {
                fs::remove_dir_all(dst)?;
            }
            copy_dir_all(src, dst)
        }
    }

    /// Change the working directory of the process.
    pub fn chdir(&mut self, dir: &Path, verbose: bool) -> io::Result<()> {
        if verbose {
            self.log.info(&format!("cd {}", dir.display()));
        }
        env::set_current_dir(dir)
    }

    /// Remove a file; already absent is success.
    pub fn remove(&mut self, path: &Path, verbose: bool) {
        if verbose {
            self.log.info(&format!("rm -f {}", path.display()));
        }
        if path.symlink_metadata().is_ok() {
            let _ = fs::remove_file(path);
        }
    }

    /// Set an environment variable for the rest of the process lifetime.
    ///
    /// Spawned commands inherit it, which is how toolchain-specific
    /// variables reach the cross-compiler.
    pub fn environment(&mut self, var: &str, val: &str, verbose: bool) {
        if verbose {
            self.log.info(&format!("{var}={val}"));
        }
        env::set_var(var, val);
    }

    /// Remove a file or symlink.
    pub fn unlink(&mut self, target: &Path, verbose: bool) -> io::Result<()> {
        if verbose {
            self.log.info(&format!("unlink {}", target.display()));
        }
        fs::remove_file(target)
    }

    /// Create a symlink, replacing any link already at the target path.
    pub fn symlink(&mut self, src: &Path, target: &Path, verbose: bool) -> io::Result<()> {
        if verbose {
            self.log
                .info(&format!("ln -s {} {}", src.display(), target.display()));
        }
        if target.is_symlink() {
            fs::remove_file(target)?;
        }
        make_symlink(src, target)
    }
}

fn shell_command(line: &str) -> Command {
    #[cfg(unix)]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(line);
        cmd
    }
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(line);
        cmd
    }
}

#[cfg(unix)]
fn has_execute_bit(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(windows)]
fn has_execute_bit(_path: &Path) -> bool {
    // Windows has no execute bit; readability already passed.
    true
}

#[cfg(unix)]
fn make_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn make_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(src, dst)
    } else {
        std::os::windows::fs::symlink_file(src, dst)
    }
}

fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if ty.is_dir() {
            copy_dir_all(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Whether a path names an existing directory.
pub fn is_dir(path: &Path) -> bool {
    path.is_dir()
}

/// Whether a path names an existing regular file.
pub fn is_file(path: &Path) -> bool {
    path.is_file()
}

/// Final path component, empty for paths without one.
pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parent directory, empty for paths without one.
pub fn dirname(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Modification time of a path.
pub fn mtime(path: &Path) -> io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

/// Environment variable lookup with a default.
pub fn getenv(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}

/// Current working directory.
pub fn getcwd() -> io::Result<PathBuf> {
    env::current_dir()
}

/// Whether standard input is a terminal.
pub fn is_tty() -> bool {
    io::stdin().is_terminal()
}

/// Name of the user owning a path; falls back to the numeric uid.
#[cfg(unix)]
pub fn owner(path: &Path) -> io::Result<String> {
    use std::os::unix::fs::MetadataExt;
    let uid = fs::metadata(path)?.uid();
    let name = nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(uid))
        .ok()
        .flatten()
        .map(|u| u.name)
        .unwrap_or_else(|| uid.to_string());
    Ok(name)
}

/// Name of the group owning a path; falls back to the numeric gid.
#[cfg(unix)]
pub fn group(path: &Path) -> io::Result<String> {
    use std::os::unix::fs::MetadataExt;
    let gid = fs::metadata(path)?.gid();
    let name = nix::unistd::Group::from_gid(nix::unistd::Gid::from_raw(gid))
        .ok()
        .flatten()
        .map(|g| g.name)
        .unwrap_or_else(|| gid.to_string());
    Ok(name)
}
