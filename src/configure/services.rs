//! systemd service management

use crate::utils::command::CommandRunner;
use crate::utils::error::Result;
use tracing::info;

/// Enable a systemd unit inside the new root
pub fn enable_service(cmd: &CommandRunner, service: &str, install_root: &str) -> Result<()> {
    info!("Enabling service: {}", service);
    cmd.run_in_chroot(
        install_root,
        &format!("systemctl --no-reload enable {}", service),
    )?;
    Ok(())
}

/// Enable several units in order, stopping at the first failure
pub fn enable_services(cmd: &CommandRunner, services: &[&str], install_root: &str) -> Result<()> {
    for service in services {
        enable_service(cmd, service, install_root)?;
    }
    Ok(())
}
