//! System configuration modules

pub mod bootloader;
pub mod locale;
pub mod network;
pub mod nvidia;
pub mod services;
pub mod users;
pub mod zram;
