//! prismstrap - Automated PrismLinux installer
//!
//! Reads a JSON or TOML installation config and installs PrismLinux onto the target disk.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use prismstrap::cleanup::Cleaner;
use prismstrap::install::Installer;
use prismstrap::utils::{deps, signal};
use prismstrap::{InstallConfig, InstallError};
use std::panic;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "prismstrap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Dry run mode - show what would be done without making changes
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install using a configuration file
    Config {
        /// Path to configuration file (JSON, or TOML with a .toml extension)
        file: String,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        file: String,
    },

    /// Unmount whatever a previous run left under /mnt
    Cleanup,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "prismstrap.json")]
        output: String,
    },
}

fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    panic::set_hook(Box::new(|info| {
        error!("Fatal: {}", info);
    }));

    match panic::catch_unwind(|| run(cli)) {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            error!("{:#}", e);
            let code = e.downcast_ref::<InstallError>().map_or(1, InstallError::exit_code);
            if matches!(e.downcast_ref::<InstallError>(), Some(InstallError::Interrupted)) {
                signal::reraise();
            }
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
        Err(_) => ExitCode::from(1),
    }
}

fn run(cli: Cli) -> Result<()> {
    let dry_run = cli.dry_run;
    if dry_run {
        info!("Running in dry-run mode - no changes will be made");
    }

    match cli.command {
        Commands::Config { file } => cmd_install(&file, dry_run),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Cleanup => cmd_cleanup(dry_run),
        Commands::GenerateConfig { output } => cmd_generate_config(&output),
    }
}

fn require_root(dry_run: bool) -> Result<()> {
    if !dry_run && !nix::unistd::geteuid().is_root() {
        return Err(InstallError::NotRoot.into());
    }
    Ok(())
}

fn cmd_install(path: &str, dry_run: bool) -> Result<()> {
    require_root(dry_run)?;
    signal::install_signal_handlers().context("installing signal handlers")?;

    info!("Loading configuration from {}", path);
    let config = InstallConfig::from_file(path)?;
    config.validate()?;

    if dry_run {
        let missing = deps::check_dependencies(&config);
        if !missing.is_empty() {
            warn!("Missing host packages: {}", missing.join(", "));
        }
    } else {
        deps::ensure_dependencies(&config)?;
    }

    let mut installer = Installer::new(config, dry_run);
    installer.run()?;

    info!("Installation complete, the system can be rebooted");
    Ok(())
}

fn cmd_validate(path: &str) -> Result<()> {
    let config = InstallConfig::from_file(path)?;
    config.validate()?;
    info!("Configuration {} is valid", path);
    Ok(())
}

fn cmd_generate_config(output: &str) -> Result<()> {
    let content = InstallConfig::sample().to_file_contents(output)?;
    std::fs::write(output, content).with_context(|| format!("writing {}", output))?;
    info!("Sample configuration written to {}", output);
    Ok(())
}

fn cmd_cleanup(dry_run: bool) -> Result<()> {
    require_root(dry_run)?;

    let cleaner = Cleaner::new(dry_run);
    cleaner.cleanup()?;

    Ok(())
}
