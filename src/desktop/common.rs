//! Components every desktop gets: networking, firewall, bluetooth, printing, power

use crate::configure::services::enable_service;
use crate::install::packages;
use crate::utils::command::CommandRunner;
use crate::utils::error::Result;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{debug, info, warn};

const LIVE_CONNECTIONS: &str = "/etc/NetworkManager/system-connections";

/// Package sets paired with the unit that has to be enabled after them
const SERVICES: &[(&[&str], &str)] = &[
    (&["bluez"], "bluetooth"),
    (&["cups", "cups-pdf", "bluez-cups"], "cups"),
    (&["tuned-ppd", "tuned"], "tuned-ppd"),
];

/// NetworkManager (carrying over the live session's connections) and firewalld
pub fn install_components(cmd: &CommandRunner, install_root: &str) -> Result<()> {
    info!("Installing NetworkManager");
    packages::install(cmd, &["networkmanager"])?;

    if cmd.is_dry_run() {
        debug!("[dry-run] copy {} into {}", LIVE_CONNECTIONS, install_root);
    } else {
        let target = Path::new(install_root).join(LIVE_CONNECTIONS.trim_start_matches('/'));
        match migrate_connections(Path::new(LIVE_CONNECTIONS), &target) {
            Ok(0) => debug!("No network connections to migrate"),
            Ok(n) => info!("Migrated {} network connections", n),
            Err(e) => warn!("Network connection migration failed: {}", e),
        }
    }
    enable_service(cmd, "NetworkManager", install_root)?;

    info!("Installing firewalld");
    packages::install(cmd, &["firewalld"])?;
    enable_service(cmd, "firewalld", install_root)?;

    Ok(())
}

/// Copy NetworkManager profiles from `src` to `dst`, keeping them private to root.
/// A missing `src` migrates nothing.
pub fn migrate_connections(src: &Path, dst: &Path) -> Result<usize> {
    if !src.is_dir() {
        return Ok(0);
    }

    fs::create_dir_all(dst)?;
    fs::set_permissions(dst, fs::Permissions::from_mode(0o700))?;

    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let target = dst.join(entry.file_name());
        fs::copy(entry.path(), &target)?;
        if let Err(e) = fs::set_permissions(&target, fs::Permissions::from_mode(0o600)) {
            warn!("Cannot restrict permissions of {}: {}", target.display(), e);
        }
        copied += 1;
    }
    Ok(copied)
}

/// Bluetooth, printing and power profiles
pub fn install_services(cmd: &CommandRunner, install_root: &str) -> Result<()> {
    for (pkgs, unit) in SERVICES {
        info!("Installing {}", unit);
        packages::install(cmd, *pkgs)?;
        enable_service(cmd, unit, install_root)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connections_are_private() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let dst = dst.path().join("system-connections");
        fs::write(src.path().join("home.nmconnection"), "[wifi]\nssid=home\n").unwrap();
        fs::create_dir(src.path().join("nested")).unwrap();

        assert_eq!(migrate_connections(src.path(), &dst).unwrap(), 1);

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&dst), 0o700);
        assert_eq!(mode(&dst.join("home.nmconnection")), 0o600);
    }

    #[test]
    fn missing_source_is_not_an_error() {
        let dst = tempfile::tempdir().unwrap();
        let src = dst.path().join("absent");
        assert_eq!(migrate_connections(&src, dst.path()).unwrap(), 0);
    }

    #[test]
    fn services_follow_their_packages() {
        let cmd = CommandRunner::new(true);
        install_services(&cmd, "/mnt").unwrap();
        assert_eq!(
            cmd.history(),
            vec![
                "arch-chroot /mnt pacman -S --noconfirm --needed bluez",
                "arch-chroot /mnt systemctl --no-reload enable bluetooth",
                "arch-chroot /mnt pacman -S --noconfirm --needed cups cups-pdf bluez-cups",
                "arch-chroot /mnt systemctl --no-reload enable cups",
                "arch-chroot /mnt pacman -S --noconfirm --needed tuned-ppd tuned",
                "arch-chroot /mnt systemctl --no-reload enable tuned-ppd",
            ]
        );
    }
}
