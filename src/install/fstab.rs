//! fstab generation

use crate::utils::command::CommandRunner;
use crate::utils::error::{InstallError, Result};
use std::path::Path;
use tracing::info;

/// Append `genfstab -U` output for `root` to `<root>/etc/fstab` and check the result
/// is not empty.
pub fn generate_fstab(cmd: &CommandRunner, root: &str) -> Result<()> {
    info!("Generating fstab");

    let etc = format!("{}/etc", root);
    let fstab = format!("{}/fstab", etc);

    let Some(entries) = cmd.run_output("genfstab", &["-U", root])? else {
        return Ok(());
    };

    std::fs::create_dir_all(&etc)?;
    cmd.append_file(&fstab, &format!("{}\n", entries))?;
    verify_fstab(Path::new(&fstab))?;

    info!("fstab generated");
    Ok(())
}

/// An fstab that is missing or only whitespace means nothing will mount on boot.
pub fn verify_fstab(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(InstallError::ValidationError(format!(
            "{} was not created",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Err(InstallError::ValidationError(format!(
            "{} is empty",
            path.display()
        )));
    }
    Ok(())
}
