//! Compressed swap in RAM through zram-generator

use crate::install::packages;
use crate::utils::command::CommandRunner;
use crate::utils::error::Result;
use tracing::{debug, info};

/// zram-generator configuration; a `size_mib` of 0 sizes the device from RAM at boot
pub fn zram_config(size_mib: u64) -> String {
    if size_mib == 0 {
        debug!("ZRAM: sized automatically");
        "[zram0]\nzram-size = min(ram / 2, 4096)\ncompression-algorithm = zstd".to_string()
    } else {
        debug!("ZRAM: {} MiB", size_mib);
        format!("[zram0]\nzram-size = {}\ncompression-algorithm = zstd", size_mib)
    }
}

/// Install zram-generator and write its configuration
pub fn setup_zram(cmd: &CommandRunner, size_mib: u64, install_root: &str) -> Result<()> {
    info!("Setting up ZRAM");

    packages::install(cmd, &["zram-generator"])?;

    let systemd_dir = format!("{}/etc/systemd", install_root);
    if !cmd.is_dry_run() {
        std::fs::create_dir_all(&systemd_dir)?;
    }
    cmd.write_file(
        format!("{}/zram-generator.conf", systemd_dir),
        &zram_config(size_mib),
    )?;

    info!("ZRAM configuration complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_and_fixed_sizes() {
        assert!(zram_config(0).contains("zram-size = min(ram / 2, 4096)"));
        assert_eq!(
            zram_config(2048),
            "[zram0]\nzram-size = 2048\ncompression-algorithm = zstd"
        );
    }

    #[test]
    fn installs_generator_then_writes_config() {
        let cmd = CommandRunner::new(true);
        setup_zram(&cmd, 0, "/mnt").unwrap();
        assert_eq!(
            cmd.history(),
            vec![
                "arch-chroot /mnt pacman -S --noconfirm --needed zram-generator",
                "write /mnt/etc/systemd/zram-generator.conf",
            ]
        );
    }
}
