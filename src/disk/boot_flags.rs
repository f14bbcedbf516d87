//! Boot flag assignment

use crate::disk::device::parse_partition;
use crate::utils::command::CommandRunner;
use crate::utils::error::{InstallError, Result};
use std::path::Path;
use tracing::{info, warn};

/// Set the `esp` flag (EFI) or the `boot` flag (BIOS) on the partition `block_device`.
///
/// The flag is applied through parted on the base device, so both the partition number
/// and the existence of the base device are checked first.
pub fn set_boot_flag(cmd: &CommandRunner, block_device: &str, efi: bool) -> Result<()> {
    let (device, number) = parse_partition(block_device);

    if number.parse::<u32>().is_err() {
        return Err(InstallError::InvalidPartitionNumber { number, device });
    }
    if !Path::new(&device).exists() {
        return Err(InstallError::DeviceNotFound(device));
    }

    let (flag, mode) = if efi { ("esp", "UEFI") } else { ("boot", "BIOS") };
    info!(
        "Setting {} flag on partition {} of {} ({})",
        flag, number, device, mode
    );

    cmd.run("parted", &["-s", &device, "set", &number, flag, "on"])?;
    Ok(())
}

/// Like [`set_boot_flag`], but a failure only produces a warning.
pub fn try_set_boot_flag(cmd: &CommandRunner, block_device: &str, efi: bool) -> bool {
    match set_boot_flag(cmd, block_device, efi) {
        Ok(()) => true,
        Err(e) => {
            warn!("Could not set boot flag on {}: {}", block_device, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::test_support::fake_disk;

    #[test]
    fn esp_flag_on_base_device() {
        let (_disk, device) = fake_disk();
        let cmd = CommandRunner::new(true);
        set_boot_flag(&cmd, &format!("{}1", device), true).unwrap();
        assert_eq!(
            cmd.history(),
            vec![format!("parted -s {} set 1 esp on", device)]
        );
    }

    #[test]
    fn bios_uses_boot_flag() {
        let (_disk, device) = fake_disk();
        let cmd = CommandRunner::new(true);
        set_boot_flag(&cmd, &format!("{}2", device), false).unwrap();
        assert_eq!(
            cmd.history(),
            vec![format!("parted -s {} set 2 boot on", device)]
        );
    }

    #[test]
    fn missing_device_is_an_error() {
        let cmd = CommandRunner::new(true);
        let err = set_boot_flag(&cmd, "/dev/prismstrap-missing1", true).unwrap_err();
        assert!(matches!(err, InstallError::DeviceNotFound(_)));
        assert!(cmd.history().is_empty());
    }

    #[test]
    fn non_numeric_partition_is_rejected() {
        let cmd = CommandRunner::new(true);
        let err = set_boot_flag(&cmd, "/dev/nvme0n1pX", true).unwrap_err();
        assert!(matches!(err, InstallError::InvalidPartitionNumber { .. }));
    }

    #[test]
    fn try_variant_downgrades_failure() {
        let cmd = CommandRunner::new(true);
        assert!(!try_set_boot_flag(&cmd, "/dev/prismstrap-missing1", false));
    }
}
