//! User creation and management

use crate::config::UserConfig;
use crate::install::packages;
use crate::utils::command::CommandRunner;
use crate::utils::error::Result;
use tracing::info;

/// Login shells a user can be given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserShell {
    Bash,
    Fish,
    Zsh,
}

impl UserShell {
    /// Anything other than `fish` or `zsh` gets bash.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "fish" => Self::Fish,
            "zsh" => Self::Zsh,
            _ => Self::Bash,
        }
    }

    pub fn package(&self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Fish => "fish",
            Self::Zsh => "zsh",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Bash => "/bin/bash",
            Self::Fish => "/usr/bin/fish",
            Self::Zsh => "/usr/bin/zsh",
        }
    }
}

const SUDOERS_WHEEL_COMMENTED: &str = "# %wheel ALL=(ALL:ALL) ALL";
const SUDOERS_WHEEL: &str = "%wheel ALL=(ALL:ALL) ALL";

/// Create a user account
pub fn create_user(cmd: &CommandRunner, user: &UserConfig, install_root: &str) -> Result<()> {
    let shell = UserShell::from_name(&user.shell);
    info!("Creating user: {} (shell: {})", user.name, shell.path());

    packages::install(cmd, &[shell.package()])?;

    cmd.run_in_chroot(
        install_root,
        &format!("useradd -m -s {} {}", shell.path(), user.name),
    )?;
    set_password(cmd, &user.name, &user.password, install_root)?;

    if user.hasroot {
        grant_sudo(cmd, &user.name, install_root)?;
    }

    info!("User {} created successfully", user.name);
    Ok(())
}

/// Add the user to wheel and let wheel use sudo
fn grant_sudo(cmd: &CommandRunner, username: &str, install_root: &str) -> Result<()> {
    info!("Granting sudo rights to {}", username);

    cmd.run_in_chroot(install_root, &format!("usermod -aG wheel {}", username))?;

    let sudoers = format!("{}/etc/sudoers", install_root);
    cmd.edit_file(&sudoers, enable_wheel)?;
    cmd.append_file(&sudoers, "\nDefaults pwfeedback\n")?;

    let accounts_dir = format!("{}/var/lib/AccountsService/users", install_root);
    if !cmd.is_dry_run() {
        std::fs::create_dir_all(&accounts_dir)?;
    }
    cmd.write_file(
        format!("{}/{}", accounts_dir, username),
        "[User]\nSession=plasma\n",
    )?;

    Ok(())
}

/// Uncomment the wheel rule in a sudoers file
pub fn enable_wheel(sudoers: &str) -> String {
    sudoers.replace(SUDOERS_WHEEL_COMMENTED, SUDOERS_WHEEL)
}

/// Set a password through chpasswd's stdin so it never shows up in a command line
fn set_password(cmd: &CommandRunner, username: &str, password: &str, install_root: &str) -> Result<()> {
    cmd.run_in_chroot_with_input(
        install_root,
        "chpasswd",
        &format!("{}:{}\n", username, password),
    )
}

/// Set root password
pub fn set_root_password(cmd: &CommandRunner, password: &str, install_root: &str) -> Result<()> {
    info!("Setting root password");
    set_password(cmd, "root", password, install_root)
}
