//! Base system installation

use crate::install::packages;
use crate::utils::command::CommandRunner;
use crate::utils::error::Result;
use tracing::{debug, info, warn};

pub const DEFAULT_KERNEL: &str = "linux-cachyos";

pub const SUPPORTED_KERNELS: &[&str] = &[
    "linux-cachyos",
    "linux616-tkg-bore-llvm",
    "linux-zen",
    "linux",
];

const BASE_PACKAGES: &[&str] = &[
    // Base
    "base",
    "cachyos-ananicy-rules-git",
    "linux-firmware",
    "nano",
    "sudo",
    "curl",
    "wget",
    "openssh",
    // Distribution
    "prism",
    "prismlinux",
    "prismlinux-themes-fish",
    // Tools
    "btrfs-progs",
    "xfsprogs",
    "terminus-font",
    "ttf-liberation",
    "bash",
    "bash-completion",
    "glibc-locales",
    "fwupd",
    "unzip",
    // Repositories
    "archlinux-keyring",
    "archlinuxcn-keyring",
    "archlinuxcn-mirrorlist-git",
    "chaotic-keyring",
    "chaotic-mirrorlist",
];

/// A supported kernel package; empty or unknown names fall back to [`DEFAULT_KERNEL`].
pub fn normalize_kernel(kernel: &str) -> &'static str {
    let kernel = kernel.trim();
    if kernel.is_empty() {
        return DEFAULT_KERNEL;
    }
    match SUPPORTED_KERNELS.iter().find(|k| **k == kernel) {
        Some(k) => *k,
        None => {
            warn!("Unknown kernel {}, using {} instead", kernel, DEFAULT_KERNEL);
            DEFAULT_KERNEL
        }
    }
}

/// Base packages plus the kernel and its headers
pub fn package_list(kernel: &str) -> Vec<String> {
    let mut list: Vec<String> = BASE_PACKAGES.iter().map(|p| p.to_string()).collect();
    list.push(kernel.to_string());
    list.push(format!("{}-headers", kernel));
    list
}

/// Install the base system into `/mnt`.
pub fn install_base_system(cmd: &CommandRunner, kernel: &str) -> Result<()> {
    info!("Installing base system");

    if !cmd.is_dry_run() {
        if let Err(e) = std::fs::create_dir_all("/mnt/etc") {
            warn!("Failed to create /mnt/etc: {}", e);
        }
    }

    let kernel = normalize_kernel(kernel);
    debug!("Selected kernel: {}", kernel);

    packages::install_base(cmd, &package_list(kernel))?;

    info!("Base system installed");
    Ok(())
}
