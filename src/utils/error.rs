//! Error types for prismstrap

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Must be run as root")]
    NotRoot,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Invalid partition number '{number}' for device {device}")]
    InvalidPartitionNumber { number: String, device: String },

    #[error("Partition error: {context}: {source}")]
    PartitionError {
        context: String,
        #[source]
        source: Box<InstallError>,
    },

    #[error("Filesystem error: {context}: {source}")]
    FilesystemError {
        context: String,
        #[source]
        source: Box<InstallError>,
    },

    #[error("Mount error: {context}: {source}")]
    MountError {
        context: String,
        #[source]
        source: Box<InstallError>,
    },

    /// A mount point directory could not be created. Nothing after this can work,
    /// so the top level turns it into a process exit.
    #[error("Cannot create mount point {path}: {source}")]
    MountPointUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Chroot error: {context}: {source}")]
    ChrootError {
        context: String,
        #[source]
        source: Box<InstallError>,
    },

    #[error("Command failed: {command}{}\n{stderr}", exit_suffix(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unknown {kind} '{value}' (valid: {valid})")]
    UnknownVariant {
        kind: &'static str,
        value: String,
        valid: &'static str,
    },

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<InstallError>,
    },

    #[error("{stage}: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: Box<InstallError>,
    },

    #[error("Installation cancelled: {0}")]
    Cancelled(String),

    #[error("Interrupted by signal")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Nix error: {0}")]
    Nix(#[from] nix::Error),
}

impl InstallError {
    /// Wrap a failure of the named pipeline stage.
    pub fn stage(stage: &str, source: InstallError) -> Self {
        InstallError::StageFailed {
            stage: stage.to_string(),
            source: Box::new(source),
        }
    }

    /// Process exit code for this error: the failed command's own exit code when one
    /// is known, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            InstallError::CommandFailed { code: Some(c), .. } if *c > 0 => *c,
            InstallError::StageFailed { source, .. }
            | InstallError::Context { source, .. }
            | InstallError::PartitionError { source, .. }
            | InstallError::FilesystemError { source, .. }
            | InstallError::MountError { source, .. }
            | InstallError::ChrootError { source, .. } => source.exit_code(),
            _ => 1,
        }
    }
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (exit code {})", c)).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, InstallError>;

/// Attach a description of the failed step while keeping the original error (and its
/// exit code) as the source.
pub trait ResultExt<T> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| InstallError::Context {
            context: f(),
            source: Box::new(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_reaches_through_stage_wrapper() {
        let inner = InstallError::CommandFailed {
            command: "pacstrap /mnt base".to_string(),
            code: Some(8),
            stderr: String::new(),
        };
        let err = InstallError::stage("Base System", inner);
        assert_eq!(err.exit_code(), 8);
        assert!(err.to_string().starts_with("Base System: Command failed: pacstrap /mnt base"));
    }

    #[test]
    fn context_keeps_exit_code() {
        let failed: Result<()> = Err(InstallError::CommandFailed {
            command: "mount /dev/sda2 /mnt".to_string(),
            code: Some(32),
            stderr: "wrong fs type".to_string(),
        });
        let err = failed
            .with_context(|| "mount /dev/sda2 at /mnt".to_string())
            .unwrap_err();
        assert_eq!(err.exit_code(), 32);
        assert!(err.to_string().starts_with("mount /dev/sda2 at /mnt: Command failed"));
    }

    #[test]
    fn exit_code_defaults_to_one() {
        assert_eq!(InstallError::NotRoot.exit_code(), 1);
        let signalled = InstallError::CommandFailed {
            command: "mkfs.ext4".to_string(),
            code: None,
            stderr: String::new(),
        };
        assert_eq!(signalled.exit_code(), 1);
    }
}
