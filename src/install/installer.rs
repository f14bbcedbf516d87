//! Main installation orchestrator

use crate::config::InstallConfig;
use crate::configure;
use crate::desktop::{self, DesktopEnvironment};
use crate::disk::mounts;
use crate::disk::partitioner::{self, PartitionMode, TARGET_ROOT};
use crate::install::{base, chroot, extras, finalize, fstab, keyring};
use crate::utils::command::CommandRunner;
use crate::utils::error::{InstallError, Result};
use crate::utils::signal;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Longest a full installation may take before it is abandoned between stages
pub const INSTALL_DEADLINE: Duration = Duration::from_secs(2 * 60 * 60);

const CLEANUP_SETTLE: Duration = Duration::from_secs(1);
const UNMOUNT_SETTLE: Duration = Duration::from_millis(200);

type StageFn = fn(&mut Installer) -> Result<()>;

/// One step of the pipeline. Failure of a required stage ends the run.
struct Stage {
    name: &'static str,
    required: bool,
    run: StageFn,
}

const STAGES: &[Stage] = &[
    Stage { name: "Partition Setup", required: true, run: Installer::partition_setup },
    Stage { name: "Base System", required: true, run: Installer::base_system },
    Stage { name: "Chroot Environment", required: true, run: Installer::chroot_environment },
    Stage { name: "System Keyring", required: true, run: Installer::system_keyring },
    Stage { name: "File System Table", required: true, run: Installer::file_system_table },
    Stage { name: "Bootloader", required: true, run: Installer::bootloader },
    Stage { name: "Locale Configuration", required: true, run: Installer::locale },
    Stage { name: "Network Configuration", required: true, run: Installer::network },
    Stage { name: "User Accounts", required: true, run: Installer::user_accounts },
    Stage { name: "Desktop Environment", required: false, run: Installer::desktop },
    Stage { name: "Additional Packages", required: false, run: Installer::additional_packages },
    Stage { name: "System Finalization", required: true, run: Installer::finalization },
];

/// Main installer struct
pub struct Installer {
    config: InstallConfig,
    cmd: CommandRunner,
    /// Everything mounted so far, in mount order
    mounted: Vec<String>,
    deadline: Duration,
}

impl Installer {
    pub fn new(config: InstallConfig, dry_run: bool) -> Self {
        Self {
            config,
            cmd: CommandRunner::new(dry_run),
            mounted: Vec::new(),
            deadline: INSTALL_DEADLINE,
        }
    }

    /// Commands issued so far
    pub fn history(&self) -> Vec<String> {
        self.cmd.history()
    }

    /// Run the full installation process. Mounts are released on every exit path,
    /// and a panic inside a stage is resumed once they are.
    pub fn run(&mut self) -> Result<()> {
        info!(
            "Starting installation on {} ({} mode, {})",
            self.config.device_path(),
            self.config.partition.mode,
            self.config.bootloader.kind
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_stages(STAGES)));
        self.cleanup();

        match outcome {
            Ok(Ok(())) => {
                info!("Installation finished successfully");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Installation failed: {}", e);
                Err(e)
            }
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn run_stages(&mut self, stages: &[Stage]) -> Result<()> {
        let started = Instant::now();
        let total = stages.len();

        for (i, stage) in stages.iter().enumerate() {
            if started.elapsed() >= self.deadline {
                return Err(InstallError::Cancelled(format!(
                    "deadline of {:?} exceeded before {}",
                    self.deadline, stage.name
                )));
            }
            if signal::is_interrupted() {
                return Err(InstallError::Interrupted);
            }

            info!("[{}/{}] {}", i + 1, total, stage.name);
            match (stage.run)(self) {
                Ok(()) => {}
                Err(e) if stage.required => {
                    error!("{} failed: {}", stage.name, e);
                    return Err(InstallError::stage(stage.name, e));
                }
                Err(e) => warn!("{} failed, continuing: {}", stage.name, e),
            }
        }
        Ok(())
    }

    /// Unmount everything recorded, most recent first
    fn cleanup(&mut self) {
        if self.mounted.is_empty() {
            return;
        }
        info!("Cleaning up {} mount points", self.mounted.len());
        self.cmd.settle(CLEANUP_SETTLE);

        while let Some(target) = self.mounted.pop() {
            mounts::unmount(&self.cmd, &target);
            self.cmd.settle(UNMOUNT_SETTLE);
        }
    }

    fn partition_setup(&mut self) -> Result<()> {
        let mode = PartitionMode::parse(&self.config.partition.mode).unwrap_or_else(|e| {
            warn!("{}, using automatic partitioning", e);
            PartitionMode::Auto
        });
        let specs = match mode {
            PartitionMode::Manual => self.config.partition_specs()?,
            PartitionMode::Auto => Vec::new(),
        };

        let mounted = partitioner::partition(
            &self.cmd,
            &self.config.device_path(),
            mode,
            self.config.partition.efi,
            &specs,
        )?;
        self.mounted.extend(mounted);
        Ok(())
    }

    fn base_system(&mut self) -> Result<()> {
        base::install_base_system(&self.cmd, &self.config.kernel)
    }

    fn chroot_environment(&mut self) -> Result<()> {
        chroot::setup_chroot(&self.cmd, TARGET_ROOT, &mut self.mounted)
    }

    fn system_keyring(&mut self) -> Result<()> {
        keyring::setup_keyring(&self.cmd)
    }

    fn file_system_table(&mut self) -> Result<()> {
        fstab::generate_fstab(&self.cmd, TARGET_ROOT)
    }

    fn bootloader(&mut self) -> Result<()> {
        configure::bootloader::install_bootloader(&self.cmd, &self.config.bootloader, TARGET_ROOT)
    }

    fn locale(&mut self) -> Result<()> {
        configure::locale::configure_locale(&self.cmd, &self.config.locale, TARGET_ROOT)
    }

    fn network(&mut self) -> Result<()> {
        configure::network::configure_network(&self.cmd, &self.config.networking, TARGET_ROOT)
    }

    fn user_accounts(&mut self) -> Result<()> {
        for user in &self.config.users {
            configure::users::create_user(&self.cmd, user, TARGET_ROOT)?;
        }
        configure::users::set_root_password(&self.cmd, &self.config.rootpass, TARGET_ROOT)
    }

    fn desktop(&mut self) -> Result<()> {
        let environment = DesktopEnvironment::parse(&self.config.desktop)?;
        desktop::install_desktop(&self.cmd, environment, TARGET_ROOT)
    }

    fn additional_packages(&mut self) -> Result<()> {
        extras::install_extras(&self.cmd, self.config.flatpak, &self.config.extra_packages)
    }

    fn finalization(&mut self) -> Result<()> {
        finalize::finalize(&self.cmd, self.config.zram)
    }
}
