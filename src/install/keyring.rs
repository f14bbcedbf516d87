//! Package keyring and pacman configuration for the new system

use crate::disk::partitioner::TARGET_ROOT;
use crate::utils::command::CommandRunner;
use crate::utils::error::Result;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Host files that must not be copied: gpg sockets, locks, editor leftovers.
const SKIP_PATTERNS: &[&str] = &["S.dirmngr", "s.dirmngr", ".#", "#", ".lock", ".tmp", "~"];

fn should_skip(name: &str) -> bool {
    SKIP_PATTERNS.iter().any(|p| name.contains(p))
}

/// Copy the files of `src` into `dst`, recursively, leaving out anything matching
/// the skip list. Returns the number of files copied.
pub fn copy_filtered(src: &Path, dst: &Path) -> Result<usize> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if should_skip(&name) {
            warn!("Skipping {}", entry.path().display());
            continue;
        }

        let target = dst.join(&name);
        if entry.file_type()?.is_dir() {
            copied += copy_filtered(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Initialise and populate the pacman keyring inside the new root, then carry over
/// the host's pacman.conf and mirror lists.
pub fn setup_keyring(cmd: &CommandRunner) -> Result<()> {
    info!("Setting up package keyring");

    cmd.run_in_chroot(TARGET_ROOT, "which pacman-key")?;

    for step in ["--init", "--populate"] {
        info!("Running: pacman-key {}", step);
        cmd.run_in_chroot(TARGET_ROOT, &format!("pacman-key {}", step))?;
    }

    copy_pacman_config(cmd);

    info!("Keyring setup complete");
    Ok(())
}

fn copy_pacman_config(cmd: &CommandRunner) {
    let etc = format!("{}/etc", TARGET_ROOT);

    if cmd.is_dry_run() {
        info!("[dry-run] copy /etc/pacman.conf and /etc/pacman.d to {}", etc);
        return;
    }

    if Path::new("/etc/pacman.conf").exists() {
        match fs::copy("/etc/pacman.conf", format!("{}/pacman.conf", etc)) {
            Ok(_) => info!("Copied pacman configuration"),
            Err(e) => warn!("Failed to copy pacman.conf: {}", e),
        }
    }

    match copy_filtered(Path::new("/etc/pacman.d"), &Path::new(&etc).join("pacman.d")) {
        Ok(n) => info!("Copied {} mirror list files", n),
        Err(e) => warn!(
            "Failed to copy mirror lists, downloads may be slower: {}",
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyring_commands_in_order() {
        let cmd = CommandRunner::new(true);
        setup_keyring(&cmd).unwrap();
        assert_eq!(
            cmd.history(),
            vec![
                "arch-chroot /mnt which pacman-key",
                "arch-chroot /mnt pacman-key --init",
                "arch-chroot /mnt pacman-key --populate",
            ]
        );
    }

    #[test]
    fn populate_failure_is_fatal() {
        let cmd = CommandRunner::new(true).failing("arch-chroot /mnt pacman-key --populate");
        assert!(setup_keyring(&cmd).is_err());
    }

    #[test]
    fn copy_skips_sockets_and_locks() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::write(src.path().join("mirrorlist"), "Server = x").unwrap();
        fs::write(src.path().join("db.lock"), "").unwrap();
        fs::create_dir(src.path().join("gnupg")).unwrap();
        fs::write(src.path().join("gnupg/pubring.gpg"), "k").unwrap();
        fs::write(src.path().join("gnupg/S.dirmngr"), "").unwrap();

        let copied = copy_filtered(src.path(), dst.path()).unwrap();
        assert_eq!(copied, 2);
        assert!(dst.path().join("mirrorlist").exists());
        assert!(dst.path().join("gnupg/pubring.gpg").exists());
        assert!(!dst.path().join("db.lock").exists());
        assert!(!dst.path().join("gnupg/S.dirmngr").exists());
    }
}
