//! Bootloader installation and configuration

use crate::config::{Bootloader, BootloaderConfig};
use crate::install::packages;
use crate::utils::command::CommandRunner;
use crate::utils::error::{InstallError, Result};
use std::path::Path;
use tracing::{info, warn};

const BOOTLOADER_ID: &str = "PrismLinux";

const GRUB_EFI_PACKAGES: &[&str] = &[
    "prismlinux/grub",
    "efibootmgr",
    "prismlinux-themes-grub",
    "os-prober",
];

const GRUB_LEGACY_PACKAGES: &[&str] = &["prismlinux/grub", "prismlinux-themes-grub", "os-prober"];

const THEME_PLACEHOLDER: &str = "#GRUB_THEME=\"/path/to/theme.txt\"";
const THEME_LINE: &str = "GRUB_THEME=\"/usr/share/grub/themes/prismlinux/theme.txt\"";

/// Pick the first PrismLinux entry from efibootmgr and move it to the front of BootOrder
const DEFAULT_ENTRY_SCRIPT: &str =
    "efibootmgr | grep 'PrismLinux' | head -1 | cut -c5-8 | xargs -I {} efibootmgr --bootorder {}";

/// Install and configure the bootloader
pub fn install_bootloader(
    cmd: &CommandRunner,
    config: &BootloaderConfig,
    install_root: &str,
) -> Result<()> {
    info!("Installing bootloader: {}", config.kind);
    match config.kind {
        Bootloader::GrubEfi => install_grub_efi(cmd, &config.location, install_root),
        Bootloader::GrubLegacy => install_grub_legacy(cmd, &config.location, install_root),
    }
}

/// GRUB for UEFI firmware, `efidir` as seen from inside the new system
fn install_grub_efi(cmd: &CommandRunner, efidir: &str, install_root: &str) -> Result<()> {
    packages::install(cmd, GRUB_EFI_PACKAGES)?;

    check_efi_directory(cmd, efidir, install_root)?;

    info!("Running grub-install for {}", efidir);
    cmd.run_in_chroot(
        install_root,
        &format!(
            "grub-install --target=x86_64-efi --efi-directory={} --bootloader-id={} --recheck",
            efidir, BOOTLOADER_ID
        ),
    )?;

    // Firmware that ignores NVRAM entries boots from the removable path
    cmd.run_in_chroot(
        install_root,
        &format!(
            "grub-install --target=x86_64-efi --efi-directory={} --bootloader-id={}-fallback --removable --recheck",
            efidir, BOOTLOADER_ID
        ),
    )?;

    enable_theme(cmd, install_root)?;
    make_config(cmd, install_root)?;
    set_default_entry(cmd, install_root);

    info!("GRUB (EFI) installation complete");
    Ok(())
}

fn check_efi_directory(cmd: &CommandRunner, efidir: &str, install_root: &str) -> Result<()> {
    let host_efidir = format!("{}{}", install_root, efidir);
    if !cmd.is_dry_run() && !Path::new(&host_efidir).is_dir() {
        return Err(InstallError::ValidationError(format!(
            "EFI directory {} does not exist",
            host_efidir
        )));
    }
    Ok(())
}

/// GRUB for BIOS firmware, written to the MBR of `device`
fn install_grub_legacy(cmd: &CommandRunner, device: &str, install_root: &str) -> Result<()> {
    packages::install(cmd, GRUB_LEGACY_PACKAGES)?;

    if !cmd.is_dry_run() && !Path::new(device).exists() {
        return Err(InstallError::DeviceNotFound(device.to_string()));
    }

    info!("Running grub-install on {}", device);
    cmd.run_in_chroot(
        install_root,
        &format!("grub-install --target=i386-pc --recheck {}", device),
    )?;

    enable_theme(cmd, install_root)?;
    make_config(cmd, install_root)?;

    info!("GRUB (legacy) installation complete");
    Ok(())
}

/// Uncomment the theme placeholder, pointing it at the distribution theme
pub fn with_theme(grub_defaults: &str) -> String {
    grub_defaults.replace(THEME_PLACEHOLDER, THEME_LINE)
}

fn enable_theme(cmd: &CommandRunner, install_root: &str) -> Result<()> {
    info!("Enabling GRUB theme");
    cmd.edit_file(format!("{}/etc/default/grub", install_root), with_theme)
}

fn make_config(cmd: &CommandRunner, install_root: &str) -> Result<()> {
    info!("Generating GRUB config");
    cmd.run_in_chroot(install_root, "grub-mkconfig -o /boot/grub/grub.cfg")?;
    Ok(())
}

fn set_default_entry(cmd: &CommandRunner, install_root: &str) {
    info!("Setting default boot entry");
    if let Err(e) = cmd.run_in_chroot(install_root, &format!("sh -c \"{}\"", DEFAULT_ENTRY_SCRIPT)) {
        warn!("Could not set default boot entry: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn efi(location: &str) -> BootloaderConfig {
        BootloaderConfig {
            kind: Bootloader::GrubEfi,
            location: location.to_string(),
        }
    }

    #[test]
    fn efi_install_sequence() {
        let cmd = CommandRunner::new(true);
        install_bootloader(&cmd, &efi("/boot"), "/mnt").unwrap();
        let history = cmd.history();
        assert_eq!(
            history[0],
            "arch-chroot /mnt pacman -S --noconfirm --needed prismlinux/grub efibootmgr prismlinux-themes-grub os-prober"
        );
        assert_eq!(
            history[1],
            "arch-chroot /mnt grub-install --target=x86_64-efi --efi-directory=/boot --bootloader-id=PrismLinux --recheck"
        );
        assert!(history[2].contains("--bootloader-id=PrismLinux-fallback --removable"));
        assert_eq!(history[3], "edit /mnt/etc/default/grub");
        assert_eq!(history[4], "arch-chroot /mnt grub-mkconfig -o /boot/grub/grub.cfg");
        assert!(history[5].contains("efibootmgr --bootorder"));
    }

    #[test]
    fn default_entry_is_best_effort() {
        let cmd = CommandRunner::new(true).failing("arch-chroot /mnt sh -c");
        install_bootloader(&cmd, &efi("/boot"), "/mnt").unwrap();
    }

    #[test]
    fn legacy_installs_to_disk() {
        let cmd = CommandRunner::new(true);
        let config = BootloaderConfig {
            kind: Bootloader::GrubLegacy,
            location: "/dev/sda".to_string(),
        };
        install_bootloader(&cmd, &config, "/mnt").unwrap();
        let history = cmd.history();
        assert!(history.contains(&"arch-chroot /mnt grub-install --target=i386-pc --recheck /dev/sda".to_string()));
        assert!(!history.iter().any(|c| c.contains("efibootmgr")));
    }

    #[test]
    fn missing_efi_directory_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let root = root.path().to_string_lossy().to_string();
        let cmd = CommandRunner::new(false);
        let err = check_efi_directory(&cmd, "/boot/efi", &root);
        assert!(matches!(err, Err(InstallError::ValidationError(_))));

        std::fs::create_dir_all(format!("{}/boot/efi", root)).unwrap();
        check_efi_directory(&cmd, "/boot/efi", &root).unwrap();
    }

    #[test]
    fn theme_placeholder_is_replaced() {
        let input = "GRUB_TIMEOUT=5\n#GRUB_THEME=\"/path/to/theme.txt\"\n";
        assert_eq!(
            with_theme(input),
            "GRUB_TIMEOUT=5\nGRUB_THEME=\"/usr/share/grub/themes/prismlinux/theme.txt\"\n"
        );
        assert_eq!(with_theme("GRUB_TIMEOUT=5\n"), "GRUB_TIMEOUT=5\n");
    }
}
