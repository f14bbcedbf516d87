//! Disk management modules

pub mod boot_flags;
pub mod device;
pub mod filesystem;
pub mod formatting;
pub mod mounts;
pub mod partitioner;
pub mod partitioning;

#[cfg(test)]
pub(crate) mod test_support {
    use tempfile::NamedTempFile;

    /// An existing file standing in for a whole disk. Its name ends in a letter so a
    /// partition number can be appended.
    pub fn fake_disk() -> (NamedTempFile, String) {
        let file = tempfile::Builder::new()
            .prefix("disk")
            .suffix("-sda")
            .tempfile()
            .unwrap();
        let path = file.path().display().to_string();
        (file, path)
    }
}
