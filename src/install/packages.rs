//! Package installation through pacstrap and pacman

use crate::disk::partitioner::TARGET_ROOT;
use crate::utils::command::CommandRunner;
use crate::utils::error::{InstallError, Result, ResultExt};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Full pacman/pacstrap output of each install run is kept here
const LOG_DIR: &str = "/tmp/prismstrap";

/// Reject names pacman would misread: empty, containing spaces, or looking like a flag.
pub fn validate_packages<S: AsRef<str>>(packages: &[S]) -> Result<()> {
    for pkg in packages {
        let pkg = pkg.as_ref();
        if pkg.is_empty() || pkg.contains(' ') || pkg.starts_with('-') {
            return Err(InstallError::ValidationError(format!(
                "Invalid package name: '{}'",
                pkg
            )));
        }
    }
    Ok(())
}

/// Install packages into the new root with pacstrap.
pub fn install_base<S: AsRef<str>>(cmd: &CommandRunner, packages: &[S]) -> Result<()> {
    if packages.is_empty() {
        return Ok(());
    }
    validate_packages(packages)?;

    let names: Vec<&str> = packages.iter().map(|p| p.as_ref()).collect();
    info!("Installing base packages: {}", names.join(", "));

    let mut args = vec![TARGET_ROOT];
    args.extend(&names);

    let mut log = InstallLog::open(cmd, "pacstrap");
    cmd.stream("pacstrap", &args, |line| log.line(line))
        .with_context(|| log.failure_context("pacstrap"))
}

/// Install packages inside the new root with pacman.
pub fn install<S: AsRef<str>>(cmd: &CommandRunner, packages: &[S]) -> Result<()> {
    if packages.is_empty() {
        return Ok(());
    }
    validate_packages(packages)?;

    let names: Vec<&str> = packages.iter().map(|p| p.as_ref()).collect();
    info!("Installing packages in chroot: {}", names.join(", "));

    let command = format!("pacman -S --noconfirm --needed {}", names.join(" "));
    let mut log = InstallLog::open(cmd, "pacman");
    cmd.stream_in_chroot(TARGET_ROOT, &command, |line| log.line(line))
        .with_context(|| log.failure_context("pacman"))
}

/// Output sink for a streamed install: every line goes to a log file and to the
/// debug log.
struct InstallLog {
    path: Option<PathBuf>,
    file: Option<File>,
}

impl InstallLog {
    fn open(cmd: &CommandRunner, name: &str) -> Self {
        if cmd.is_dry_run() {
            return Self {
                path: None,
                file: None,
            };
        }

        let path = PathBuf::from(LOG_DIR).join(format!("{}-{}.log", name, std::process::id()));
        let file = fs::create_dir_all(LOG_DIR)
            .and_then(|_| File::create(&path))
            .map_err(|e| warn!("Cannot create install log {}: {}", path.display(), e))
            .ok();

        Self {
            path: file.as_ref().map(|_| path),
            file,
        }
    }

    fn line(&mut self, line: &str) {
        debug!("{}", line);
        if let Some(file) = self.file.as_mut() {
            let _ = writeln!(file, "{}", line);
        }
    }

    fn failure_context(&self, program: &str) -> String {
        match &self.path {
            Some(path) => format!("{} failed (full output in {})", program, path.display()),
            None => format!("{} failed", program),
        }
    }
}
