//! Partition table creation for automatic mode

use crate::utils::command::CommandRunner;
use crate::utils::error::{InstallError, Result};
use tracing::info;

/// One parted invocation, with a description used in error messages.
struct PartedStep {
    description: &'static str,
    args: &'static [&'static str],
}

const GPT_STEPS: &[PartedStep] = &[
    PartedStep {
        description: "create GPT label",
        args: &["mklabel", "gpt"],
    },
    PartedStep {
        description: "create EFI system partition",
        args: &["mkpart", "ESP", "fat32", "1MiB", "513MiB"],
    },
    PartedStep {
        description: "create root partition",
        args: &["mkpart", "root", "ext4", "513MiB", "100%"],
    },
];

const MSDOS_STEPS: &[PartedStep] = &[
    PartedStep {
        description: "create MBR label",
        args: &["mklabel", "msdos"],
    },
    PartedStep {
        description: "create boot partition",
        args: &["mkpart", "primary", "ext4", "1MiB", "513MiB"],
    },
    PartedStep {
        description: "create root partition",
        args: &["mkpart", "primary", "ext4", "513MiB", "100%"],
    },
];

/// Replace the partition table on `device` with a two-partition layout: a 512 MiB
/// boot partition (ESP on EFI systems) followed by a root partition filling the disk.
pub fn create_partition_table(cmd: &CommandRunner, device: &str, efi: bool) -> Result<()> {
    info!(
        "Creating {} partition table on {}",
        if efi { "GPT" } else { "MBR" },
        device
    );

    // The whole disk may still be mounted from a previous attempt.
    cmd.attempt("umount", &[device]);

    let steps = if efi { GPT_STEPS } else { MSDOS_STEPS };
    for step in steps {
        let mut args = vec!["-s", device];
        args.extend_from_slice(step.args);
        cmd.run("parted", &args)
            .map_err(|e| InstallError::PartitionError {
                context: format!("Failed to {} on {}", step.description, device),
                source: Box::new(e),
            })?;
    }

    info!("Partition table on {} created", device);
    Ok(())
}
