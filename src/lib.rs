//! prismstrap library - PrismLinux installation pipeline

pub mod cleanup;
pub mod config;
pub mod configure;
pub mod desktop;
pub mod disk;
pub mod install;
pub mod utils;

pub use config::InstallConfig;
pub use utils::error::InstallError;
