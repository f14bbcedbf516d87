//! Filesystem formatting

use crate::disk::filesystem::FilesystemType;
use crate::utils::command::CommandRunner;
use crate::utils::error::{InstallError, Result};
use tracing::{debug, info};

/// Filesystem used for a partition in automatic mode
pub fn auto_filesystem(is_boot: bool, efi: bool) -> FilesystemType {
    if is_boot && efi {
        FilesystemType::Fat32
    } else {
        FilesystemType::Ext4
    }
}

/// Format a partition with the specified filesystem. `NoFormat` succeeds without
/// touching the device.
pub fn format_partition(
    cmd: &CommandRunner,
    block_device: &str,
    filesystem: FilesystemType,
) -> Result<()> {
    let Some(program) = filesystem.command() else {
        debug!("Leaving {} unformatted", block_device);
        return Ok(());
    };

    info!("Formatting {} as {}", block_device, filesystem);

    let mut args = filesystem.args().to_vec();
    args.push(block_device);

    cmd.run(program, &args)
        .map(|_| ())
        .map_err(|e| InstallError::FilesystemError {
            context: format!("Failed to format {}", block_device),
            source: Box::new(e),
        })
}

/// Format a freshly created partition in automatic mode: FAT32 for the EFI system
/// partition, ext4 for everything else.
pub fn format_auto_partition(
    cmd: &CommandRunner,
    partition: &str,
    is_boot: bool,
    efi: bool,
) -> Result<()> {
    cmd.attempt("umount", &[partition]);
    format_partition(cmd, partition, auto_filesystem(is_boot, efi))
}
