//! Chroot environment: pseudo filesystems under the new root

use crate::disk::mounts::ensure_exists;
use crate::utils::command::CommandRunner;
use crate::utils::error::{InstallError, Result};
use std::time::Duration;
use tracing::{debug, info};

/// Time given to the kernel after the last chroot mount
const MOUNT_SETTLE: Duration = Duration::from_millis(500);

enum Source {
    Fs { fstype: &'static str, source: &'static str },
    Bind(&'static str),
}

const CHROOT_MOUNTS: &[(Source, &str)] = &[
    (Source::Fs { fstype: "proc", source: "proc" }, "proc"),
    (Source::Fs { fstype: "sysfs", source: "sysfs" }, "sys"),
    (Source::Bind("/dev"), "dev"),
    (Source::Fs { fstype: "devpts", source: "devpts" }, "dev/pts"),
];

/// Mount proc, sys, dev and dev/pts under `root`. Each target is pushed onto
/// `mounted` as soon as it is mounted, so a failure part way leaves an accurate record.
pub fn setup_chroot(cmd: &CommandRunner, root: &str, mounted: &mut Vec<String>) -> Result<()> {
    info!("Preparing chroot environment in {}", root);

    for dir in ["proc", "sys", "dev", "dev/pts", "run"] {
        ensure_exists(cmd, &format!("{}/{}", root, dir))?;
    }

    for (source, dir) in CHROOT_MOUNTS {
        let target = format!("{}/{}", root, dir);
        let result = match *source {
            Source::Fs { fstype, source } => cmd.run("mount", &["-t", fstype, source, &target]),
            Source::Bind(path) => cmd.run("mount", &["--bind", path, &target]),
        };
        result.map_err(|e| InstallError::ChrootError {
            context: format!("mount {}", target),
            source: Box::new(e),
        })?;
        debug!("Mounted {}", target);
        mounted.push(target);
    }

    cmd.settle(MOUNT_SETTLE);
    Ok(())
}
