//! Mount point lifecycle

use crate::utils::command::CommandRunner;
use crate::utils::error::{InstallError, Result};
use std::path::Path;
use tracing::{debug, info, warn};

/// Everything the installer may leave mounted, children before parents.
pub const INSTALLER_MOUNTS: &[&str] = &["/mnt/boot", "/mnt/dev", "/mnt/proc", "/mnt/sys", "/mnt"];

/// Recursively unmount every known installer mount point, ignoring failures.
pub fn cleanup_all(cmd: &CommandRunner) {
    info!("Cleaning up existing mounts");
    for mount_point in INSTALLER_MOUNTS {
        cmd.attempt("umount", &["-R", mount_point]);
    }
}

/// `true` when something is mounted at `path`
pub fn is_mounted(cmd: &CommandRunner, path: &str) -> bool {
    cmd.probe("mountpoint", &["-q", path])
}

/// Create the directory tree for a mount point.
pub fn ensure_exists(cmd: &CommandRunner, path: &str) -> Result<()> {
    if cmd.is_dry_run() {
        debug!("[dry-run] mkdir -p {}", path);
        return Ok(());
    }
    if Path::new(path).is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(path).map_err(|source| InstallError::MountPointUnavailable {
        path: path.to_string(),
        source,
    })
}

/// Unmount `path` if something is already mounted there.
pub fn unmount_if_mounted(cmd: &CommandRunner, path: &str) {
    if is_mounted(cmd, path) {
        warn!("{} is already mounted, unmounting", path);
        cmd.attempt("umount", &[path]);
    }
}

/// Mount `source` at `target`, creating the target and clearing any previous mount.
pub fn mount(cmd: &CommandRunner, source: &str, target: &str, options: Option<&str>) -> Result<()> {
    if source.is_empty() || target.is_empty() {
        return Err(InstallError::ValidationError(format!(
            "Invalid mount request: source '{}', target '{}'",
            source, target
        )));
    }

    ensure_exists(cmd, target)?;
    unmount_if_mounted(cmd, target);

    let mut args = Vec::with_capacity(4);
    if let Some(opts) = options.filter(|o| !o.is_empty()) {
        args.extend(["-o", opts]);
    }
    args.extend([source, target]);

    info!("Mounting {} to {}", source, target);
    cmd.run("mount", &args)
        .map_err(|e| InstallError::MountError {
            context: format!("Failed to mount {} at {}", source, target),
            source: Box::new(e),
        })?;
    Ok(())
}

/// Unmount `target`, falling back to a lazy unmount. Never fails.
pub fn unmount(cmd: &CommandRunner, target: &str) {
    info!("Unmounting {}", target);
    if let Err(e) = cmd.force_run("umount", &[target]) {
        warn!("Failed to unmount {}: {} (trying lazy unmount)", target, e);
        if let Err(e2) = cmd.force_run("umount", &["-l", target]) {
            warn!("Lazy unmount also failed for {}: {}", target, e2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_all_unmounts_children_first() {
        let cmd = CommandRunner::new(true).failing("umount -R /mnt/dev");
        cleanup_all(&cmd);
        assert_eq!(
            cmd.history(),
            vec![
                "umount -R /mnt/boot",
                "umount -R /mnt/dev",
                "umount -R /mnt/proc",
                "umount -R /mnt/sys",
                "umount -R /mnt",
            ]
        );
    }

    #[test]
    fn mount_with_options() {
        let cmd = CommandRunner::new(true);
        mount(&cmd, "proc", "/mnt/proc", Some("nosuid,noexec")).unwrap();
        assert_eq!(
            cmd.history(),
            vec![
                "mountpoint -q /mnt/proc",
                "mount -o nosuid,noexec proc /mnt/proc",
            ]
        );
    }

    #[test]
    fn mount_rejects_empty_arguments() {
        let cmd = CommandRunner::new(true);
        assert!(matches!(
            mount(&cmd, "", "/mnt", None),
            Err(InstallError::ValidationError(_))
        ));
        assert!(cmd.history().is_empty());
    }

    #[test]
    fn mount_failure_is_mount_error() {
        let cmd = CommandRunner::new(true).failing("mount /dev/sda2");
        let err = mount(&cmd, "/dev/sda2", "/mnt", None).unwrap_err();
        assert!(matches!(err, InstallError::MountError { .. }));
    }

    #[test]
    fn mount_failure_keeps_exit_code() {
        let cmd = CommandRunner::new(true).failing_with("mount /dev/sdz2", 32);
        let err = mount(&cmd, "/dev/sdz2", "/mnt", None).unwrap_err();
        let err = InstallError::stage("Partition Setup", err);
        assert_eq!(err.exit_code(), 32);
        assert!(err.to_string().contains("(exit code 32)"));
    }

    #[test]
    fn unmount_falls_back_to_lazy() {
        let cmd = CommandRunner::new(true).failing("umount /mnt/boot");
        unmount(&cmd, "/mnt/boot");
        assert_eq!(
            cmd.history(),
            vec!["umount /mnt/boot", "umount -l /mnt/boot"]
        );
    }

    #[test]
    fn ensure_exists_creates_tree() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("mnt/boot/efi");
        let cmd = CommandRunner::new(false);
        ensure_exists(&cmd, &target.display().to_string()).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn ensure_exists_reports_unavailable_mount_point() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let target = file.path().join("boot");
        let cmd = CommandRunner::new(false);
        let err = ensure_exists(&cmd, &target.display().to_string()).unwrap_err();
        assert!(matches!(err, InstallError::MountPointUnavailable { .. }));
    }
}
