//! Partition setup: automatic whole-disk layout or a manual list of partitions

use crate::disk::boot_flags::try_set_boot_flag;
use crate::disk::device::partition_names;
use crate::disk::filesystem::FilesystemType;
use crate::disk::formatting::{format_auto_partition, format_partition};
use crate::disk::mounts::{self, ensure_exists, mount};
use crate::disk::partitioning::create_partition_table;
use crate::utils::command::CommandRunner;
use crate::utils::error::{InstallError, Result, ResultExt};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Where the target root filesystem is mounted
pub const TARGET_ROOT: &str = "/mnt";
/// Where the boot partition is mounted in automatic mode
pub const TARGET_BOOT: &str = "/mnt/boot";

/// Time the kernel gets to pick up a new partition table
const SETTLE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PartitionMode {
    #[default]
    Auto,
    Manual,
}

impl PartitionMode {
    pub fn parse(text: &str) -> Result<Self> {
        match text.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            _ => Err(InstallError::UnknownVariant {
                kind: "partition mode",
                value: text.to_string(),
                valid: "auto, manual",
            }),
        }
    }
}

impl std::fmt::Display for PartitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// One manually specified partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    pub mountpoint: String,
    pub block_device: String,
    pub filesystem: String,
}

impl PartitionSpec {
    /// Parse `mountpoint:blockdevice:filesystem`. Only the first two colons separate
    /// fields.
    pub fn parse(entry: &str) -> Result<Self> {
        let mut parts = entry.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(mountpoint), Some(block_device), Some(filesystem)) => Ok(Self {
                mountpoint: mountpoint.trim().to_string(),
                block_device: block_device.trim().to_string(),
                filesystem: filesystem.trim().to_string(),
            }),
            _ => Err(InstallError::ValidationError(format!(
                "Partition entry '{}' must look like mountpoint:blockdevice:filesystem",
                entry
            ))),
        }
    }
}

/// Give the kernel and udev time to create the new partition nodes.
pub fn wait_for_device_settle(cmd: &CommandRunner, device: &str) {
    info!("Waiting for {} to settle", device);
    cmd.attempt("partprobe", &[device]);
    cmd.settle(SETTLE_DELAY);
}

/// Entries with a block device, parents before children. The sort key is the length
/// of the mountpoint string, and the sort is stable.
pub fn manual_order(specs: &[PartitionSpec]) -> Vec<&PartitionSpec> {
    let mut ordered: Vec<&PartitionSpec> = specs
        .iter()
        .filter(|spec| {
            if spec.block_device.is_empty() {
                info!("Skipping {} (no block device given)", spec.mountpoint);
                false
            } else {
                true
            }
        })
        .collect();
    ordered.sort_by_key(|spec| spec.mountpoint.len());
    ordered
}

/// Prepare the target disks and mount them under [`TARGET_ROOT`].
///
/// Returns the mount points mounted, in mount order, for the caller to unmount later.
pub fn partition(
    cmd: &CommandRunner,
    device: &str,
    mode: PartitionMode,
    efi: bool,
    specs: &[PartitionSpec],
) -> Result<Vec<String>> {
    info!(
        "Partitioning in {} mode ({})",
        mode,
        if efi { "UEFI" } else { "BIOS" }
    );

    mounts::cleanup_all(cmd);

    match mode {
        PartitionMode::Auto => partition_auto(cmd, device, efi),
        PartitionMode::Manual => partition_manual(cmd, efi, specs),
    }
}

fn partition_auto(cmd: &CommandRunner, device: &str, efi: bool) -> Result<Vec<String>> {
    if !Path::new(device).exists() {
        return Err(InstallError::DeviceNotFound(device.to_string()));
    }

    create_partition_table(cmd, device, efi)?;
    wait_for_device_settle(cmd, device);

    let names = partition_names(device, &[1, 2]);
    let (boot, root) = (&names[0], &names[1]);

    if !try_set_boot_flag(cmd, boot, efi) {
        warn!("Continuing without a boot flag on {}", boot);
    }

    format_auto_partition(cmd, boot, true, efi)?;
    format_auto_partition(cmd, root, false, efi)?;

    mount(cmd, root, TARGET_ROOT, None)?;
    ensure_exists(cmd, TARGET_BOOT)?;
    mount(cmd, boot, TARGET_BOOT, None)?;

    info!("Automatic partitioning of {} complete", device);
    Ok(vec![TARGET_ROOT.to_string(), TARGET_BOOT.to_string()])
}

fn partition_manual(
    cmd: &CommandRunner,
    efi: bool,
    specs: &[PartitionSpec],
) -> Result<Vec<String>> {
    let mut mounted = Vec::new();

    for spec in manual_order(specs) {
        let device = spec.block_device.as_str();
        if !Path::new(device).exists() {
            return Err(InstallError::DeviceNotFound(device.to_string()));
        }

        cmd.attempt("umount", &[device]);

        let filesystem = FilesystemType::classify(&spec.filesystem);
        if filesystem.needs_formatting() {
            format_partition(cmd, device, filesystem)
                .with_context(|| format!("Partition {}", device))?;
        } else {
            info!("Mounting {} without formatting", device);
        }

        mount(cmd, device, &spec.mountpoint, None)
            .with_context(|| format!("Partition {}", device))?;
        mounted.push(spec.mountpoint.clone());

        let is_boot = spec.mountpoint == "/boot" || spec.mountpoint == TARGET_BOOT;
        if is_boot && filesystem.needs_formatting() {
            try_set_boot_flag(cmd, device, efi);
        }
    }

    info!("Manual partitioning complete ({} mounted)", mounted.len());
    Ok(mounted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::test_support::fake_disk;

    fn spec(mountpoint: &str, block_device: &str, filesystem: &str) -> PartitionSpec {
        PartitionSpec {
            mountpoint: mountpoint.to_string(),
            block_device: block_device.to_string(),
            filesystem: filesystem.to_string(),
        }
    }

    #[test]
    fn parse_spec_entries() {
        assert_eq!(
            PartitionSpec::parse("/mnt/boot:/dev/sda1:fat32").unwrap(),
            spec("/mnt/boot", "/dev/sda1", "fat32")
        );
        assert_eq!(
            PartitionSpec::parse("/mnt::ext4").unwrap(),
            spec("/mnt", "", "ext4")
        );
        assert_eq!(
            PartitionSpec::parse("/mnt/data:/dev/sdb1:don't:format").unwrap().filesystem,
            "don't:format"
        );
        assert!(PartitionSpec::parse("/mnt:/dev/sda2").is_err());
    }

    #[test]
    fn parse_mode() {
        assert_eq!(PartitionMode::parse("Auto").unwrap(), PartitionMode::Auto);
        assert_eq!(PartitionMode::parse(" MANUAL ").unwrap(), PartitionMode::Manual);
        assert!(matches!(
            PartitionMode::parse("lvm"),
            Err(InstallError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn manual_order_is_by_length_and_stable() {
        let specs = vec![
            spec("/mnt/home", "/dev/sda3", "ext4"),
            spec("/mnt", "/dev/sda2", "ext4"),
            spec("/mnt/swap", "", "ext4"),
            spec("/mnt/boot", "/dev/sda1", "fat32"),
        ];
        let ordered: Vec<&str> = manual_order(&specs)
            .iter()
            .map(|s| s.mountpoint.as_str())
            .collect();
        assert_eq!(ordered, vec!["/mnt", "/mnt/home", "/mnt/boot"]);
    }

    #[test]
    fn manual_order_puts_parents_first() {
        let specs = vec![
            spec("/mnt/boot/efi", "/dev/sda1", "fat32"),
            spec("/mnt", "/dev/sda2", "ext4"),
            spec("/mnt/boot", "/dev/sda3", "ext4"),
        ];
        let ordered: Vec<&str> = manual_order(&specs)
            .iter()
            .map(|s| s.mountpoint.as_str())
            .collect();
        assert_eq!(ordered, vec!["/mnt", "/mnt/boot", "/mnt/boot/efi"]);
    }

    #[test]
    fn auto_efi_layout() {
        let (_disk, device) = fake_disk();
        let cmd = CommandRunner::new(true);
        let mounted = partition(&cmd, &device, PartitionMode::Auto, true, &[]).unwrap();
        assert_eq!(mounted, vec!["/mnt", "/mnt/boot"]);

        let p1 = format!("{}1", device);
        let p2 = format!("{}2", device);
        let history = cmd.history();
        let expected_tail = vec![
            format!("parted -s {} mklabel gpt", device),
            format!("parted -s {} mkpart ESP fat32 1MiB 513MiB", device),
            format!("parted -s {} mkpart root ext4 513MiB 100%", device),
            format!("partprobe {}", device),
            format!("parted -s {} set 1 esp on", device),
            format!("umount {}", p1),
            format!("mkfs.fat -F32 {}", p1),
            format!("umount {}", p2),
            format!("mkfs.ext4 -F {}", p2),
            "mountpoint -q /mnt".to_string(),
            format!("mount {} /mnt", p2),
            "mountpoint -q /mnt/boot".to_string(),
            format!("mount {} /mnt/boot", p1),
        ];
        assert_eq!(
            history[..5],
            [
                "umount -R /mnt/boot",
                "umount -R /mnt/dev",
                "umount -R /mnt/proc",
                "umount -R /mnt/sys",
                "umount -R /mnt",
            ]
        );
        assert_eq!(history[5], format!("umount {}", device));
        assert_eq!(history[6..], expected_tail[..]);
    }

    #[test]
    fn auto_requires_existing_device() {
        let cmd = CommandRunner::new(true);
        let err = partition(&cmd, "/dev/prismstrap-missing", PartitionMode::Auto, true, &[])
            .unwrap_err();
        assert!(matches!(err, InstallError::DeviceNotFound(_)));
    }

    #[test]
    fn manual_mounts_in_order_and_flags_boot() {
        let (_boot, boot) = fake_disk();
        let (_root, root) = fake_disk();
        let specs = vec![
            spec("/mnt/boot", &boot, "fat32"),
            spec("/mnt/home", "", "ext4"),
            spec("/mnt", &root, "ext4"),
        ];
        let cmd = CommandRunner::new(true);
        let mounted = partition(&cmd, "", PartitionMode::Manual, true, &specs).unwrap();
        assert_eq!(mounted, vec!["/mnt", "/mnt/boot"]);

        let history = cmd.history();
        assert!(history.contains(&format!("mkfs.ext4 -F {}", root)));
        assert!(history.contains(&format!("mkfs.fat -F32 {}", boot)));
        let root_mount = history.iter().position(|l| *l == format!("mount {} /mnt", root));
        let boot_mount = history
            .iter()
            .position(|l| *l == format!("mount {} /mnt/boot", boot));
        assert!(root_mount.is_some() && boot_mount.is_some());
        assert!(root_mount < boot_mount);
        // No trailing partition number: the whole path is taken as partition 1.
        assert!(history.iter().any(|l| l.contains("set 1 esp on")));
    }

    #[test]
    fn manual_no_format_still_mounts() {
        let (_data, data) = fake_disk();
        let specs = vec![spec("/mnt/data", &data, "don't format")];
        let cmd = CommandRunner::new(true);
        let mounted = partition(&cmd, "", PartitionMode::Manual, false, &specs).unwrap();
        assert_eq!(mounted, vec!["/mnt/data"]);
        let history = cmd.history();
        assert!(!history.iter().any(|l| l.starts_with("mkfs")));
        assert!(history.contains(&format!("mount {} /mnt/data", data)));
    }

    #[test]
    fn manual_missing_device_aborts() {
        let specs = vec![spec("/mnt", "/dev/prismstrap-missing2", "ext4")];
        let cmd = CommandRunner::new(true);
        let err = partition(&cmd, "", PartitionMode::Manual, true, &specs).unwrap_err();
        assert!(matches!(err, InstallError::DeviceNotFound(_)));
    }

    #[test]
    fn manual_format_failure_names_device() {
        let (_root, root) = fake_disk();
        let specs = vec![spec("/mnt", &root, "xfs")];
        let cmd = CommandRunner::new(true).failing("mkfs.xfs");
        let err = partition(&cmd, "", PartitionMode::Manual, true, &specs).unwrap_err();
        assert!(err.to_string().starts_with(&format!("Partition {}", root)));
    }
}
