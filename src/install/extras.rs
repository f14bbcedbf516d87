//! Flatpak and user-requested packages

use crate::disk::partitioner::TARGET_ROOT;
use crate::install::packages;
use crate::utils::command::CommandRunner;
use crate::utils::error::{Result, ResultExt};
use tracing::{debug, info};

const FLATHUB_URL: &str = "https://flathub.org/repo/flathub.flatpakrepo";

/// Install Flatpak and register the Flathub remote
pub fn install_flatpak(cmd: &CommandRunner) -> Result<()> {
    info!("Installing Flatpak");
    packages::install(cmd, &["flatpak"])?;
    cmd.run_in_chroot(
        TARGET_ROOT,
        &format!("flatpak remote-add --if-not-exists flathub {}", FLATHUB_URL),
    )
    .with_context(|| "add Flathub remote".to_string())?;
    Ok(())
}

/// Flatpak when `flatpak` is set, then `extra_packages`
pub fn install_extras(cmd: &CommandRunner, flatpak: bool, extra_packages: &[String]) -> Result<()> {
    if flatpak {
        install_flatpak(cmd)?;
    }

    if extra_packages.is_empty() {
        debug!("No extra packages requested");
        return Ok(());
    }
    info!("Installing {} extra packages", extra_packages.len());
    packages::install(cmd, extra_packages).with_context(|| "install extra packages".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatpak_then_extras() {
        let cmd = CommandRunner::new(true);
        install_extras(&cmd, true, &["htop".to_string(), "git".to_string()]).unwrap();
        assert_eq!(
            cmd.history(),
            vec![
                "arch-chroot /mnt pacman -S --noconfirm --needed flatpak",
                "arch-chroot /mnt flatpak remote-add --if-not-exists flathub https://flathub.org/repo/flathub.flatpakrepo",
                "arch-chroot /mnt pacman -S --noconfirm --needed htop git",
            ]
        );
    }

    #[test]
    fn nothing_requested() {
        let cmd = CommandRunner::new(true);
        install_extras(&cmd, false, &[]).unwrap();
        assert!(cmd.history().is_empty());
    }
}
