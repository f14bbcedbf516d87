//! Release whatever an interrupted installation left mounted

use crate::disk::mounts;
use crate::disk::partitioner::TARGET_ROOT;
use crate::utils::command::CommandRunner;
use crate::utils::error::Result;
use std::fs;
use tracing::{debug, info};

/// Cleanup utility
pub struct Cleaner {
    cmd: CommandRunner,
}

impl Cleaner {
    pub fn new(dry_run: bool) -> Self {
        Self {
            cmd: CommandRunner::new(dry_run),
        }
    }

    /// Unmount everything below the target root, deepest first, then sweep the
    /// well-known installer mount points.
    pub fn cleanup(&self) -> Result<()> {
        info!("Starting cleanup of {}", TARGET_ROOT);

        let table = fs::read_to_string("/proc/mounts").unwrap_or_default();
        let targets = mounts_under(&table, TARGET_ROOT);
        debug!("{} mount points under {}", targets.len(), TARGET_ROOT);

        for target in &targets {
            mounts::unmount(&self.cmd, target);
        }
        mounts::cleanup_all(&self.cmd);

        info!("Cleanup complete");
        Ok(())
    }

    pub fn history(&self) -> Vec<String> {
        self.cmd.history()
    }
}

/// Mount points in a `/proc/mounts` table at or below `root`, deepest first.
pub fn mounts_under(table: &str, root: &str) -> Vec<String> {
    let prefix = format!("{}/", root.trim_end_matches('/'));
    let mut found: Vec<String> = table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter(|mp| *mp == root || mp.starts_with(&prefix))
        .map(str::to_string)
        .collect();

    found.sort();
    found.dedup();
    found.sort_by_key(|mp| std::cmp::Reverse(mp.matches('/').count()));
    found
}
