//! Command execution utilities

use crate::utils::error::{InstallError, Result};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lines of stderr kept for the error message of a failed streamed command.
const STDERR_TAIL: usize = 20;

fn spawn_error(program: &str, e: std::io::Error) -> InstallError {
    if e.kind() == std::io::ErrorKind::NotFound {
        InstallError::CommandNotFound(program.to_string())
    } else {
        InstallError::Io(e)
    }
}

fn command_line(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

fn check_output(program: &str, args: &[&str], output: Output) -> Result<Output> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        warn!(
            "Command failed: {}\n  stderr: {}",
            command_line(program, args),
            stderr.trim()
        );
        return Err(InstallError::CommandFailed {
            command: command_line(program, args),
            code: output.status.code(),
            stderr,
        });
    }
    Ok(output)
}

/// Execute a command and return the output
pub fn run_command(program: &str, args: &[&str]) -> Result<Output> {
    debug!("Running: {}", command_line(program, args));

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_error(program, e))?;

    check_output(program, args, output)
}

/// Execute a command, feeding `input` to its stdin
pub fn run_command_with_input(program: &str, args: &[&str], input: &str) -> Result<Output> {
    debug!("Running (with stdin): {}", command_line(program, args));

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes())?;
    }

    let output = child.wait_with_output()?;
    check_output(program, args, output)
}

/// Check if a command exists in PATH
pub fn command_exists(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// arch-chroot when the host has it, plain chroot otherwise.
fn chroot_program() -> &'static str {
    if command_exists("arch-chroot") {
        "arch-chroot"
    } else {
        "chroot"
    }
}

/// Wrapper for command execution that respects dry-run mode.
///
/// Every command (executed or not) is appended to a history journal. In dry-run mode
/// nothing is executed, file writes are skipped and timed waits return immediately.
pub struct CommandRunner {
    dry_run: bool,
    history: Mutex<Vec<String>>,
    #[cfg(test)]
    failures: Vec<(String, i32)>,
}

impl CommandRunner {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            history: Mutex::new(Vec::new()),
            #[cfg(test)]
            failures: Vec::new(),
        }
    }

    /// Make every dry-run command whose command line starts with `prefix` fail with
    /// exit code 1.
    #[cfg(test)]
    pub fn failing(self, prefix: &str) -> Self {
        self.failing_with(prefix, 1)
    }

    /// Like [`CommandRunner::failing`], with the given exit code.
    #[cfg(test)]
    pub fn failing_with(mut self, prefix: &str, code: i32) -> Self {
        self.failures.push((prefix.to_string(), code));
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Command lines recorded so far, in execution order.
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    fn record(&self, line: String) {
        if let Ok(mut history) = self.history.lock() {
            history.push(line);
        }
    }

    /// Record the command and, in dry-run mode, log it. Returns `Ok(true)` when the
    /// caller should actually execute it.
    fn announce(&self, line: String) -> Result<bool> {
        if crate::utils::signal::is_interrupted() {
            return Err(InstallError::Interrupted);
        }
        self.announce_always(line)
    }

    fn announce_always(&self, line: String) -> Result<bool> {
        if !self.dry_run {
            self.record(line);
            return Ok(true);
        }
        info!("[dry-run] {}", line);
        self.record(line.clone());
        match self.injected_failure(&line) {
            Some(err) => Err(err),
            None => Ok(false),
        }
    }

    #[cfg(test)]
    fn injected_failure(&self, line: &str) -> Option<InstallError> {
        self.failures
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, code)| InstallError::CommandFailed {
                command: line.to_string(),
                code: Some(*code),
                stderr: String::new(),
            })
    }

    #[cfg(not(test))]
    fn injected_failure(&self, _line: &str) -> Option<InstallError> {
        None
    }

    pub fn run(&self, program: &str, args: &[&str]) -> Result<Option<Output>> {
        if self.announce(command_line(program, args))? {
            run_command(program, args).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Run a command regardless of interrupt state.
    /// Used for cleanup operations that must execute even after a signal.
    pub fn force_run(&self, program: &str, args: &[&str]) -> Result<Option<Output>> {
        if self.announce_always(command_line(program, args))? {
            run_command(program, args).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Run a command and return its trimmed stdout
    pub fn run_output(&self, program: &str, args: &[&str]) -> Result<Option<String>> {
        Ok(self
            .run(program, args)?
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string()))
    }

    /// Run a shell command inside `chroot_path`
    pub fn run_in_chroot(&self, chroot_path: &str, command: &str) -> Result<Option<Output>> {
        if self.announce(format!("arch-chroot {} {}", chroot_path, command))? {
            run_command(chroot_program(), &[chroot_path, "bash", "-c", command]).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Run a shell command inside `chroot_path` with `input` on stdin
    pub fn run_in_chroot_with_input(
        &self,
        chroot_path: &str,
        command: &str,
        input: &str,
    ) -> Result<()> {
        if self.announce(format!("arch-chroot {} {}", chroot_path, command))? {
            run_command_with_input(
                chroot_program(),
                &[chroot_path, "bash", "-c", command],
                input,
            )?;
        }
        Ok(())
    }

    /// Exit status as a boolean. Never fails; a dry run reports `false`.
    pub fn probe(&self, program: &str, args: &[&str]) -> bool {
        let line = command_line(program, args);
        self.record(line.clone());
        if self.dry_run {
            debug!("[dry-run] {}", line);
            return false;
        }
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Best-effort command: failures are logged at debug level and dropped. Runs even
    /// after an interrupt, since cleanup goes through here.
    pub fn attempt(&self, program: &str, args: &[&str]) {
        if let Err(e) = self.force_run(program, args) {
            debug!("Ignoring failure of best-effort command: {}", e);
        }
    }

    /// Run a long command, handing every stdout and stderr line to `sink` as it arrives.
    ///
    /// Both pipes are drained by their own scoped reader thread; both are joined before
    /// the exit status is looked at.
    pub fn stream<F>(&self, program: &str, args: &[&str], mut sink: F) -> Result<()>
    where
        F: FnMut(&str),
    {
        if !self.announce(command_line(program, args))? {
            return Ok(());
        }

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(program, e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stderr_tail = thread::scope(|s| {
            let (tx, rx) = mpsc::channel::<String>();

            let out_tx = tx.clone();
            s.spawn(move || {
                if let Some(pipe) = stdout {
                    for line in BufReader::new(pipe).lines().map_while(|l| l.ok()) {
                        if out_tx.send(line).is_err() {
                            break;
                        }
                    }
                }
            });

            let err_reader = s.spawn(move || {
                let mut tail = Vec::new();
                if let Some(pipe) = stderr {
                    for line in BufReader::new(pipe).lines().map_while(|l| l.ok()) {
                        if tail.len() == STDERR_TAIL {
                            tail.remove(0);
                        }
                        tail.push(line.clone());
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                }
                tail
            });

            for line in rx {
                sink(&line);
            }

            err_reader.join().unwrap_or_default()
        });

        let status = child.wait()?;
        if !status.success() {
            return Err(InstallError::CommandFailed {
                command: command_line(program, args),
                code: status.code(),
                stderr: stderr_tail.join("\n"),
            });
        }
        Ok(())
    }

    /// Stream a shell command run inside `chroot_path`.
    pub fn stream_in_chroot<F>(&self, chroot_path: &str, command: &str, sink: F) -> Result<()>
    where
        F: FnMut(&str),
    {
        if self.dry_run {
            self.announce(format!("arch-chroot {} {}", chroot_path, command))?;
            return Ok(());
        }
        self.stream(chroot_program(), &[chroot_path, "bash", "-c", command], sink)
    }

    /// Overwrite `path` with `contents`
    pub fn write_file(&self, path: impl AsRef<Path>, contents: &str) -> Result<()> {
        let path = path.as_ref();
        if self.announce(format!("write {}", path.display()))? {
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    /// Append `contents` to `path`, creating it when missing
    pub fn append_file(&self, path: impl AsRef<Path>, contents: &str) -> Result<()> {
        let path = path.as_ref();
        if self.announce(format!("append {}", path.display()))? {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            file.write_all(contents.as_bytes())?;
        }
        Ok(())
    }

    /// Rewrite `path` through `edit`. Nothing is read or written in dry-run mode.
    pub fn edit_file<F>(&self, path: impl AsRef<Path>, edit: F) -> Result<()>
    where
        F: FnOnce(&str) -> String,
    {
        let path = path.as_ref();
        if self.announce(format!("edit {}", path.display()))? {
            let content = std::fs::read_to_string(path)?;
            std::fs::write(path, edit(&content))?;
        }
        Ok(())
    }

    /// Sleep for `duration`; skipped in dry-run mode.
    pub fn settle(&self, duration: Duration) {
        if !self.dry_run {
            thread::sleep(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_records_without_executing() {
        let cmd = CommandRunner::new(true);
        let out = cmd.run("parted", &["-s", "/dev/sda", "mklabel", "gpt"]).unwrap();
        assert!(out.is_none());
        cmd.run_in_chroot("/mnt", "locale-gen").unwrap();
        assert_eq!(
            cmd.history(),
            vec!["parted -s /dev/sda mklabel gpt", "arch-chroot /mnt locale-gen"]
        );
    }

    #[test]
    fn probe_is_false_in_dry_run() {
        let cmd = CommandRunner::new(true);
        assert!(!cmd.probe("mountpoint", &["-q", "/mnt"]));
        assert_eq!(cmd.history(), vec!["mountpoint -q /mnt"]);
    }

    #[test]
    fn injected_failure_carries_exit_code() {
        let cmd = CommandRunner::new(true).failing("mkfs.ext4");
        let err = cmd.run("mkfs.ext4", &["-F", "/dev/sda2"]).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(cmd.run("mkfs.fat", &["-F32", "/dev/sda1"]).is_ok());
    }

    #[test]
    fn attempt_swallows_failures() {
        let cmd = CommandRunner::new(true).failing("umount");
        cmd.attempt("umount", &["/dev/sda"]);
        assert_eq!(cmd.history(), vec!["umount /dev/sda"]);
    }

    #[test]
    fn dry_run_skips_file_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostname");
        let cmd = CommandRunner::new(true);
        cmd.write_file(&path, "prism\n").unwrap();
        assert!(!path.exists());
        assert_eq!(cmd.history(), vec![format!("write {}", path.display())]);
    }

    #[test]
    fn stream_collects_both_pipes() {
        let cmd = CommandRunner::new(false);
        let mut lines = Vec::new();
        cmd.stream("sh", &["-c", "echo out; echo err >&2"], |l| {
            lines.push(l.to_string())
        })
        .unwrap();
        lines.sort();
        assert_eq!(lines, vec!["err", "out"]);
    }

    #[test]
    fn stream_reports_exit_code_and_stderr() {
        let cmd = CommandRunner::new(false);
        let err = cmd
            .stream("sh", &["-c", "echo broken >&2; exit 3"], |_| {})
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn real_write_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fstab");
        let cmd = CommandRunner::new(false);
        cmd.write_file(&path, "a\n").unwrap();
        cmd.append_file(&path, "b\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");

        cmd.edit_file(&path, |c| c.replace('b', "c")).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nc\n");
    }
}
