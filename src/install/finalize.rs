//! Last touches on the installed system

use crate::configure::{nvidia, zram};
use crate::disk::partitioner::TARGET_ROOT;
use crate::utils::command::CommandRunner;
use crate::utils::error::Result;
use std::path::Path;
use tracing::{info, warn};

const LIVE_VCONSOLE: &str = "/etc/vconsole.conf";

/// GPU drivers, live console settings and zram swap
pub fn finalize(cmd: &CommandRunner, zram_mib: u64) -> Result<()> {
    if let Err(e) = nvidia::install_nvidia(cmd, TARGET_ROOT) {
        warn!("NVIDIA driver installation failed: {}", e);
    }

    copy_live_config(cmd, Path::new(LIVE_VCONSOLE), TARGET_ROOT);

    zram::setup_zram(cmd, zram_mib, TARGET_ROOT)?;
    Ok(())
}

/// Carry the live session's console settings over, when there are any
fn copy_live_config(cmd: &CommandRunner, vconsole: &Path, install_root: &str) {
    info!("Copying live configuration");
    if !vconsole.exists() {
        return;
    }

    match std::fs::read_to_string(vconsole) {
        Ok(content) => {
            if let Err(e) = cmd.write_file(format!("{}/etc/vconsole.conf", install_root), &content) {
                warn!("Failed to copy vconsole.conf: {}", e);
            }
        }
        Err(e) => warn!("Failed to read {}: {}", vconsole.display(), e),
    }
}
