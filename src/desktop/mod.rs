//! Desktop environment installers

mod common;

use crate::configure::services::enable_service;
use crate::install::packages;
use crate::utils::command::CommandRunner;
use crate::utils::error::{InstallError, Result};
use std::fmt;
use tracing::info;

/// Graphical environments the installer can set up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopEnvironment {
    None,
    Plasma,
    Gnome,
    Cosmic,
    Cinnamon,
    Hyprland,
}

impl DesktopEnvironment {
    const VALID: &'static str = "none, plasma (kde), gnome, cosmic, cinnamon, hyprland";

    /// Case-insensitive; empty selects [`DesktopEnvironment::None`].
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "plasma" | "kde" => Ok(Self::Plasma),
            "gnome" => Ok(Self::Gnome),
            "cosmic" => Ok(Self::Cosmic),
            "cinnamon" => Ok(Self::Cinnamon),
            "hyprland" => Ok(Self::Hyprland),
            _ => Err(InstallError::UnknownVariant {
                kind: "desktop environment",
                value: name.to_string(),
                valid: Self::VALID,
            }),
        }
    }

    /// Environment-specific packages
    pub fn packages(&self) -> &'static [&'static str] {
        match self {
            Self::None => &[],
            Self::Plasma => &[
                "prismlinux-plasma-settings",
                "sddm",
                "ghostty",
                "dolphin",
                "plasma-systemmonitor",
            ],
            Self::Gnome => &[
                "prismlinux-gnome-settings",
                "nautilus",
                "amberol",
                "mpv",
                "loupe",
                "gnome-system-monitor",
                "gdm",
            ],
            Self::Cosmic => &[
                "prismlinux-cosmic-settings",
                "cosmic-files",
                "cosmic-greeter",
                "ghostty",
            ],
            Self::Cinnamon => &[
                "prismlinux-cinnamon-settings",
                "nemo",
                "ghostty",
                "lightdm",
                "lightdm-gtk-greeter",
                "lightdm-gtk-greeter-settings",
            ],
            Self::Hyprland => &["prismlinux-hyprland-settings", "sddm"],
        }
    }

    /// Display manager unit
    pub fn display_manager(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Plasma | Self::Hyprland => Some("sddm"),
            Self::Gnome => Some("gdm"),
            Self::Cosmic => Some("cosmic-greeter"),
            Self::Cinnamon => Some("lightdm"),
        }
    }
}

impl fmt::Display for DesktopEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Plasma => write!(f, "plasma"),
            Self::Gnome => write!(f, "gnome"),
            Self::Cosmic => write!(f, "cosmic"),
            Self::Cinnamon => write!(f, "cinnamon"),
            Self::Hyprland => write!(f, "hyprland"),
        }
    }
}

/// Sound, portals and graphics shared by every environment
const DESKTOP_PACKAGES: &[&str] = &[
    "about",
    // Sound
    "pipewire",
    "pipewire-alsa",
    "pipewire-jack",
    "pipewire-pulse",
    "gst-plugin-pipewire",
    "libpulse",
    "sof-firmware",
    "wireplumber",
    // Desktop
    "xdg-user-dirs",
    "wpa_supplicant",
    "xdg-utils",
    "prismlinux-graphics",
];

const LIGHTDM_GREETER: &str = "[SeatDefaults]\ngreeter-session=lightdm-gtk-greeter\n";

/// Install `desktop` with networking, firewall, printing, bluetooth and power
/// management around it.
pub fn install_desktop(
    cmd: &CommandRunner,
    desktop: DesktopEnvironment,
    install_root: &str,
) -> Result<()> {
    if desktop == DesktopEnvironment::None {
        info!("No desktop environment selected, skipping");
        return Ok(());
    }

    common::install_components(cmd, install_root)?;

    info!("Installing {} environment", desktop);
    packages::install(cmd, DESKTOP_PACKAGES)?;
    packages::install(cmd, desktop.packages())?;

    if desktop == DesktopEnvironment::Cinnamon {
        cmd.append_file(
            format!("{}/etc/lightdm/lightdm.conf", install_root),
            LIGHTDM_GREETER,
        )?;
    }
    if let Some(dm) = desktop.display_manager() {
        enable_service(cmd, dm, install_root)?;
    }

    common::install_services(cmd, install_root)?;

    info!("Desktop setup complete");
    Ok(())
}
