//! Host system dependency checking

use crate::config::InstallConfig;
use crate::disk::filesystem::FilesystemType;
use crate::disk::formatting::auto_filesystem;
use crate::disk::partitioner::PartitionMode;
use crate::utils::command::command_exists;
use crate::utils::error::{InstallError, Result};
use std::collections::HashMap;
use tracing::info;

/// Binary to package mapping for Arch
fn binary_to_package() -> HashMap<&'static str, &'static str> {
    let mut map = HashMap::new();
    // Partitioning and mounting
    map.insert("parted", "parted");
    map.insert("partprobe", "parted");
    map.insert("mountpoint", "util-linux");

    // Filesystems
    map.insert("mkfs.fat", "dosfstools");
    map.insert("mkfs.ext4", "e2fsprogs");
    map.insert("mkfs.btrfs", "btrfs-progs");
    map.insert("mkfs.xfs", "xfsprogs");

    // Bootstrap
    map.insert("pacstrap", "arch-install-scripts");
    map.insert("genfstab", "arch-install-scripts");

    map
}

/// Host binaries an installation with `config` will call
pub fn required_binaries(config: &InstallConfig) -> Vec<&'static str> {
    let mut bins = vec!["mountpoint", "pacstrap", "genfstab"];

    let mode = PartitionMode::parse(&config.partition.mode).unwrap_or_default();
    let filesystems: Vec<FilesystemType> = match mode {
        PartitionMode::Auto => {
            bins.extend(["parted", "partprobe"]);
            vec![
                auto_filesystem(true, config.partition.efi),
                auto_filesystem(false, config.partition.efi),
            ]
        }
        PartitionMode::Manual => {
            bins.push("parted");
            config
                .partition_specs()
                .unwrap_or_default()
                .iter()
                .map(|spec| FilesystemType::classify(&spec.filesystem))
                .collect()
        }
    };

    for fs in filesystems {
        if let Some(mkfs) = fs.command() {
            if !bins.contains(&mkfs) {
                bins.push(mkfs);
            }
        }
    }

    bins
}

/// Missing host packages for `config`, each listed once
pub fn check_dependencies(config: &InstallConfig) -> Vec<String> {
    let bin_to_pkg = binary_to_package();
    let mut missing_packages: Vec<String> = Vec::new();

    for bin in required_binaries(config) {
        if command_exists(bin) {
            continue;
        }
        let pkg = match bin_to_pkg.get(bin) {
            Some(&pkg) => pkg.to_string(),
            None => format!("(provides {})", bin),
        };
        if !missing_packages.contains(&pkg) {
            missing_packages.push(pkg);
        }
    }

    missing_packages
}

/// Fail early when host tools the installation needs are missing.
pub fn ensure_dependencies(config: &InstallConfig) -> Result<()> {
    let missing = check_dependencies(config);

    if missing.is_empty() {
        info!("All required host dependencies are installed");
        return Ok(());
    }

    Err(InstallError::ValidationError(format!(
        "Missing host packages: {} (install with: pacman -S {})",
        missing.join(", "),
        missing.join(" ")
    )))
}
