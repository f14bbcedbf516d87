//! Installation configuration structure

use crate::disk::partitioner::PartitionSpec;
use crate::utils::error::{InstallError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Main installation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    pub partition: PartitionConfig,
    pub bootloader: BootloaderConfig,
    pub locale: LocaleConfig,
    pub networking: NetworkConfig,
    #[serde(default)]
    pub users: Vec<UserConfig>,
    #[serde(default)]
    pub rootpass: String,
    /// Desktop environment name; empty or "none" skips the desktop stage
    #[serde(default)]
    pub desktop: String,
    /// zram size in MiB, 0 sizes it from RAM
    #[serde(default)]
    pub zram: u64,
    #[serde(default)]
    pub extra_packages: Vec<String>,
    #[serde(default = "default_kernel")]
    pub kernel: String,
    #[serde(default)]
    pub flatpak: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Target device path (e.g., /dev/sda or just sda)
    pub device: String,
    /// "auto" or "manual"
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub efi: bool,
    /// Manual mode entries, `mountpoint:blockdevice:filesystem`
    #[serde(default)]
    pub partitions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootloaderConfig {
    #[serde(rename = "type")]
    pub kind: Bootloader,
    /// EFI directory for grub-efi, target disk for grub-legacy
    pub location: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Bootloader {
    #[serde(rename = "grub-efi")]
    GrubEfi,
    #[serde(rename = "grub-legacy")]
    GrubLegacy,
}

impl std::fmt::Display for Bootloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GrubEfi => write!(f, "grub-efi"),
            Self::GrubLegacy => write!(f, "grub-legacy"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    /// Alternating locale names and encodings, e.g. `["en_US.UTF-8", "UTF-8"]`
    pub locale: Vec<String>,
    pub keymap: String,
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub hostname: String,
    #[serde(default)]
    pub ipv6: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub name: String,
    pub password: String,
    /// Member of wheel with sudo rights
    #[serde(default)]
    pub hasroot: bool,
    #[serde(default)]
    pub shell: String,
}

fn default_kernel() -> String {
    "linux-cachyos".to_string()
}

fn default_mode() -> String {
    "auto".to_string()
}

/// `sda`, `/dev/sda` and `/dev//sda` all become `/dev/sda`. Absolute paths
/// outside `/dev` (loop images, by-id links resolved elsewhere) are only cleaned.
pub fn normalize_device_path(device: &str) -> String {
    let device = device.trim();
    let (base, relative) = match device.strip_prefix("/dev/") {
        Some(rest) => ("/dev", rest),
        None if device.starts_with('/') => ("", device),
        None => ("/dev", device),
    };
    let mut parts: Vec<&str> = Vec::new();
    for part in relative.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("{}/{}", base, parts.join("/"))
}

impl InstallConfig {
    /// Load configuration from a JSON file, or TOML when the path ends in `.toml`
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: InstallConfig = if path.ends_with(".toml") {
            toml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        debug!("Configuration loaded from {}", path);
        Ok(config)
    }

    /// Serialize in the format implied by `path`'s extension
    pub fn to_file_contents(&self, path: &str) -> Result<String> {
        if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| InstallError::ConfigError(e.to_string()))
        } else {
            Ok(serde_json::to_string_pretty(self)?)
        }
    }

    /// Target device with a `/dev/` prefix
    pub fn device_path(&self) -> String {
        normalize_device_path(&self.partition.device)
    }

    /// Parsed manual partition entries
    pub fn partition_specs(&self) -> Result<Vec<PartitionSpec>> {
        self.partition
            .partitions
            .iter()
            .map(|entry| PartitionSpec::parse(entry))
            .collect()
    }

    /// Generate a sample configuration
    pub fn sample() -> Self {
        InstallConfig {
            partition: PartitionConfig {
                device: "/dev/sda".to_string(),
                mode: default_mode(),
                efi: true,
                partitions: Vec::new(),
            },
            bootloader: BootloaderConfig {
                kind: Bootloader::GrubEfi,
                location: "/boot".to_string(),
            },
            locale: LocaleConfig {
                locale: vec!["en_US.UTF-8".to_string(), "UTF-8".to_string()],
                keymap: "us".to_string(),
                timezone: "Europe/London".to_string(),
            },
            networking: NetworkConfig {
                hostname: "prism".to_string(),
                ipv6: false,
            },
            users: vec![UserConfig {
                name: "user".to_string(),
                password: "changeme".to_string(),
                hasroot: true,
                shell: "fish".to_string(),
            }],
            rootpass: "changeme".to_string(),
            desktop: "plasma".to_string(),
            zram: 0,
            extra_packages: Vec::new(),
            kernel: default_kernel(),
            flatpak: false,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let required = [
            (self.partition.device.trim().is_empty(), "partition device is required"),
            (self.bootloader.location.is_empty(), "bootloader location is required"),
            (self.locale.locale.is_empty(), "at least one locale is required"),
            (self.locale.keymap.is_empty(), "keymap is required"),
            (self.locale.timezone.is_empty(), "timezone is required"),
            (self.networking.hostname.is_empty(), "hostname is required"),
            (self.users.is_empty(), "at least one user is required"),
            (self.rootpass.is_empty(), "root password is required"),
        ];
        if let Some((_, message)) = required.iter().find(|(missing, _)| *missing) {
            return Err(InstallError::ValidationError(message.to_string()));
        }

        if self.locale.locale.len() % 2 != 0 {
            return Err(InstallError::ValidationError(format!(
                "locale list must alternate names and encodings, got {} entries",
                self.locale.locale.len()
            )));
        }

        for (i, user) in self.users.iter().enumerate() {
            if user.name.is_empty() {
                return Err(InstallError::ValidationError(format!(
                    "user {}: name is required",
                    i
                )));
            }
            if user.name.contains(' ') {
                return Err(InstallError::ValidationError(format!(
                    "user {}: name cannot contain spaces",
                    i
                )));
            }
            if user.password.is_empty() {
                return Err(InstallError::ValidationError(format!(
                    "user {}: password is required",
                    i
                )));
            }
        }

        for (i, entry) in self.partition.partitions.iter().enumerate() {
            if entry.matches(':').count() != 2 {
                return Err(InstallError::ValidationError(format!(
                    "partition {}: invalid format '{}' (expected mountpoint:blockdevice:filesystem)",
                    i, entry
                )));
            }
        }

        if self.bootloader.kind == Bootloader::GrubEfi && !self.bootloader.location.starts_with('/')
        {
            return Err(InstallError::ValidationError(format!(
                "EFI directory '{}' must be an absolute path",
                self.bootloader.location
            )));
        }

        Ok(())
    }
}
