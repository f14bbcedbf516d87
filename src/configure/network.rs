//! Hostname and hosts file

use crate::config::NetworkConfig;
use crate::utils::command::CommandRunner;
use crate::utils::error::{InstallError, Result};
use tracing::info;

/// Contents of `/etc/hosts`
pub fn hosts_file(ipv6: bool) -> String {
    let mut hosts = String::from("127.0.0.1     localhost\n");
    if ipv6 {
        hosts.push_str("::1 localhost\n");
    }
    hosts
}

/// Write hostname and hosts into the new root
pub fn configure_network(
    cmd: &CommandRunner,
    config: &NetworkConfig,
    install_root: &str,
) -> Result<()> {
    let hostname = config.hostname.trim();
    if hostname.is_empty() {
        return Err(InstallError::ConfigError("Hostname is empty".to_string()));
    }

    info!("Setting hostname to {}", hostname);
    cmd.write_file(
        format!("{}/etc/hostname", install_root),
        &format!("{}\n", hostname),
    )?;

    info!("Writing hosts file (IPv6: {})", config.ipv6);
    cmd.write_file(format!("{}/etc/hosts", install_root), &hosts_file(config.ipv6))?;

    Ok(())
}
