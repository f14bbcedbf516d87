//! NVIDIA driver detection and setup

use crate::install::packages;
use crate::utils::command::CommandRunner;
use crate::utils::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::{debug, info, warn};

/// `[vendor:device]` pair in `lspci -nn` output
static PCI_ID: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\[([0-9a-fA-F]{4}):([0-9a-fA-F]{4})\]").ok());

const MODESET_PARAM: &str = "nvidia-drm.modeset=1";
const INITRAMFS_MODULES: &str = "nvidia nvidia_modeset nvidia_uvm nvidia_drm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvidiaDriver {
    /// Turing and newer
    Open,
    /// Pascal
    Legacy470,
    /// Maxwell and Kepler
    Legacy390,
    /// Fermi and older
    Legacy340,
}

impl NvidiaDriver {
    pub fn packages(&self) -> Vec<&'static str> {
        let driver: &[&str] = match self {
            Self::Open => &["nvidia-open", "nvidia-open-dkms", "nvidia-utils", "egl-wayland"],
            Self::Legacy470 => &["nvidia-470xx-dkms", "nvidia-470xx-utils", "egl-wayland"],
            Self::Legacy390 => &["nvidia-390xx-dkms", "nvidia-390xx-utils", "egl-wayland"],
            Self::Legacy340 => &["nvidia-340xx-dkms", "nvidia-340xx-utils"],
        };
        let mut packages = vec!["dkms"];
        packages.extend_from_slice(driver);
        packages
    }

    /// Whether the driver's modules belong in the initramfs
    pub fn needs_early_modules(&self) -> bool {
        !matches!(self, Self::Legacy340)
    }
}

impl fmt::Display for NvidiaDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "nvidia-open (latest)"),
            Self::Legacy470 => write!(f, "nvidia-470xx (legacy)"),
            Self::Legacy390 => write!(f, "nvidia-390xx (legacy)"),
            Self::Legacy340 => write!(f, "nvidia-340xx (legacy)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gpu {
    pub name: String,
    pub device_id: Option<u16>,
}

fn is_nvidia_gpu_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("nvidia")
        && (lower.contains("vga")
            || lower.contains("3d controller")
            || lower.contains("display controller"))
}

/// First NVIDIA display device in `lspci -nn` output.
pub fn find_gpu(lspci: &str) -> Option<Gpu> {
    let pattern = PCI_ID.as_ref()?;

    lspci.lines().filter(|l| is_nvidia_gpu_line(l)).find_map(|line| {
        let ids = pattern.captures(line)?;
        let device_id = u16::from_str_radix(&ids[2], 16).ok();

        let name = line
            .splitn(3, ':')
            .nth(2)
            .map(|rest| pattern.replace_all(rest, "").trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Unknown NVIDIA GPU".to_string());

        Some(Gpu { name, device_id })
    })
}

fn driver_by_device_id(id: u16) -> Option<NvidiaDriver> {
    match id {
        0x1E00..=0x2FFF => Some(NvidiaDriver::Open),
        0x1B00..=0x1DFF => Some(NvidiaDriver::Legacy470),
        0x1000..=0x1AFF => Some(NvidiaDriver::Legacy390),
        0x0000..=0x0FFF => Some(NvidiaDriver::Legacy340),
        _ => None,
    }
}

fn driver_by_name(name: &str) -> NvidiaDriver {
    const OPEN: &[&str] = &[
        "rtx 20", "rtx 30", "rtx 40", "rtx 50", "gtx 16", "rtx 2", "rtx 3", "rtx 4", "rtx 5",
    ];
    const PASCAL: &[&str] = &["gtx 10", "titan x", "titan xp"];
    const MAXWELL_KEPLER: &[&str] = &[
        "gtx 9", "gtx 8", "gtx 7", "gtx 6", "gt 6", "gt 7", "gt 710", "gt 720", "gt 730",
        "gt 740", "quadro k", "quadro m",
    ];
    const FERMI: &[&str] = &[
        "gtx 4", "gtx 5", "gt 4", "gt 5", "geforce 8", "geforce 9", "geforce 2", "geforce 3",
    ];

    let lower = name.to_lowercase();
    let any = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    if any(OPEN) {
        NvidiaDriver::Open
    } else if any(PASCAL) {
        NvidiaDriver::Legacy470
    } else if any(MAXWELL_KEPLER) {
        NvidiaDriver::Legacy390
    } else if any(FERMI) {
        NvidiaDriver::Legacy340
    } else {
        // Unrecognised names are assumed to be newer cards
        NvidiaDriver::Open
    }
}

/// Driver for `gpu`, by PCI device ID when known, else by marketing name.
pub fn select_driver(gpu: &Gpu) -> NvidiaDriver {
    gpu.device_id
        .and_then(driver_by_device_id)
        .unwrap_or_else(|| driver_by_name(&gpu.name))
}

/// Add the modeset parameter to GRUB_CMDLINE_LINUX_DEFAULT, appending the
/// setting when the file has none.
pub fn with_modeset(grub_defaults: &str) -> String {
    if grub_defaults.contains(MODESET_PARAM) {
        return grub_defaults.to_string();
    }

    let mut lines: Vec<String> = grub_defaults.split('\n').map(str::to_string).collect();
    let existing = lines.iter().position(|l| {
        let t = l.trim();
        !t.starts_with('#') && t.starts_with("GRUB_CMDLINE_LINUX_DEFAULT=")
    });

    match existing {
        Some(i) => {
            let line = &lines[i];
            let params = match (line.find('"'), line.rfind('"')) {
                (Some(start), Some(end)) if start < end => {
                    let current = &line[start + 1..end];
                    if current.is_empty() {
                        MODESET_PARAM.to_string()
                    } else {
                        format!("{} {}", MODESET_PARAM, current)
                    }
                }
                _ => MODESET_PARAM.to_string(),
            };
            lines[i] = format!("GRUB_CMDLINE_LINUX_DEFAULT=\"{}\"", params);
        }
        None => lines.push(format!("GRUB_CMDLINE_LINUX_DEFAULT=\"{}\"", MODESET_PARAM)),
    }
    lines.join("\n")
}

/// Put the NVIDIA modules in mkinitcpio's MODULES array.
pub fn with_initramfs_modules(mkinitcpio: &str) -> String {
    if mkinitcpio.contains("nvidia_drm") {
        return mkinitcpio.to_string();
    }

    let modules_line = format!("MODULES=({})", INITRAMFS_MODULES);
    let mut lines: Vec<String> = mkinitcpio.split('\n').map(str::to_string).collect();
    let is_setting = |l: &String| {
        let t = l.trim();
        !t.is_empty() && !t.starts_with('#')
    };

    let existing = lines
        .iter()
        .position(|l| is_setting(l) && l.trim().starts_with("MODULES="));
    match existing {
        Some(i) => lines[i] = modules_line,
        None => {
            let at = lines.iter().position(is_setting).unwrap_or(0);
            lines.insert(at, modules_line);
        }
    }
    lines.join("\n")
}

/// Detect an NVIDIA GPU on the host and set up its driver in the new root.
/// Hosts without one are left alone.
pub fn install_nvidia(cmd: &CommandRunner, install_root: &str) -> Result<()> {
    info!("Detecting NVIDIA GPU");

    let lspci = match cmd.run_output("lspci", &["-nn"]) {
        Ok(Some(out)) => out,
        Ok(None) => return Ok(()),
        Err(e) => {
            warn!("lspci failed, skipping GPU detection: {}", e);
            return Ok(());
        }
    };

    let Some(gpu) = find_gpu(&lspci) else {
        info!("No NVIDIA GPU detected, skipping driver installation");
        return Ok(());
    };
    info!("Detected GPU: {}", gpu.name);
    debug!("GPU device ID: {:?}", gpu.device_id.map(|id| format!("{:04x}", id)));

    let driver = select_driver(&gpu);
    info!("Selected driver: {}", driver);

    packages::install(cmd, &driver.packages())?;

    cmd.edit_file(format!("{}/etc/default/grub", install_root), with_modeset)?;
    if driver.needs_early_modules() {
        cmd.edit_file(
            format!("{}/etc/mkinitcpio.conf", install_root),
            with_initramfs_modules,
        )?;
    }

    info!("NVIDIA driver installation complete");
    Ok(())
}
