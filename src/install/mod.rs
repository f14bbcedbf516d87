//! Installation orchestration

pub mod base;
pub mod chroot;
pub mod extras;
pub mod finalize;
pub mod fstab;
pub mod installer;
pub mod keyring;
pub mod packages;

pub use installer::Installer;
