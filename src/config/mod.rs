//! Configuration loading and validation

pub mod install;

pub use install::{
    normalize_device_path, Bootloader, BootloaderConfig, InstallConfig, LocaleConfig,
    NetworkConfig, PartitionConfig, UserConfig,
};
