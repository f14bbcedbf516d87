//! Block device naming

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

static TRAILING_NUMBER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^(.+?)(\d+)$").ok());

/// NVMe and MMC devices put a `p` between the device and the partition number.
pub fn is_nvme_or_mmc(device: &str) -> bool {
    device.contains("nvme") || device.contains("mmcblk")
}

/// Get the partition naming prefix for a device
/// e.g., /dev/sda -> /dev/sda, /dev/nvme0n1 -> /dev/nvme0n1p
pub fn partition_prefix(device: &str) -> String {
    if is_nvme_or_mmc(device) {
        format!("{}p", device)
    } else {
        device.to_string()
    }
}

/// Get partition path for a device and partition number
pub fn partition_path(device: &str, partition_num: u32) -> String {
    format!("{}{}", partition_prefix(device), partition_num)
}

/// Partition device names for `numbers` on `device`, in the given order.
pub fn partition_names(device: &str, numbers: &[u32]) -> Vec<String> {
    numbers.iter().map(|&n| partition_path(device, n)).collect()
}

/// Split a partition path into its base device and partition number.
///
/// `/dev/sda1` gives `("/dev/sda", "1")`, `/dev/nvme0n1p3` gives `("/dev/nvme0n1", "3")`.
/// When no partition number can be found the whole path is returned with partition "1".
pub fn parse_partition(block_device: &str) -> (String, String) {
    if is_nvme_or_mmc(block_device) {
        return match block_device.rfind('p') {
            Some(idx) => (
                block_device[..idx].to_string(),
                block_device[idx + 1..].to_string(),
            ),
            None => {
                warn!(
                    "No partition separator in {}, assuming partition 1",
                    block_device
                );
                (block_device.to_string(), "1".to_string())
            }
        };
    }

    let captures = TRAILING_NUMBER
        .as_ref()
        .and_then(|re| re.captures(block_device));
    match captures {
        Some(caps) => (caps[1].to_string(), caps[2].to_string()),
        None => {
            warn!(
                "No partition number in {}, assuming partition 1",
                block_device
            );
            (block_device.to_string(), "1".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sata_partition() {
        assert_eq!(
            parse_partition("/dev/sda1"),
            ("/dev/sda".to_string(), "1".to_string())
        );
        assert_eq!(
            parse_partition("/dev/vdb12"),
            ("/dev/vdb".to_string(), "12".to_string())
        );
    }

    #[test]
    fn parses_nvme_and_mmc_partitions() {
        assert_eq!(
            parse_partition("/dev/nvme0n1p3"),
            ("/dev/nvme0n1".to_string(), "3".to_string())
        );
        assert_eq!(
            parse_partition("/dev/mmcblk0p2"),
            ("/dev/mmcblk0".to_string(), "2".to_string())
        );
    }

    #[test]
    fn missing_partition_number_defaults_to_one() {
        assert_eq!(
            parse_partition("/dev/sda"),
            ("/dev/sda".to_string(), "1".to_string())
        );
    }

    #[test]
    fn names_invert_parse() {
        for device in ["/dev/sda", "/dev/nvme0n1", "/dev/mmcblk1"] {
            let names = partition_names(device, &[1, 2, 10]);
            for (name, n) in names.iter().zip(["1", "2", "10"]) {
                assert_eq!(parse_partition(name), (device.to_string(), n.to_string()));
            }
        }
    }

    #[test]
    fn partition_paths() {
        assert_eq!(partition_path("/dev/sda", 1), "/dev/sda1");
        assert_eq!(partition_path("/dev/nvme0n1", 2), "/dev/nvme0n1p2");
        assert_eq!(
            partition_names("/dev/mmcblk0", &[1, 2]),
            vec!["/dev/mmcblk0p1", "/dev/mmcblk0p2"]
        );
    }
}
