//! Filesystem kinds and classification of free-text filesystem specs

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Ways people write "leave this partition alone", after lowercasing and trimming.
const NO_FORMAT_LITERALS: &[&str] = &["noformat", "no-format", "no format", "don't format"];

/// Phrases compared after quotes, dashes and underscores have been stripped.
const NO_FORMAT_PHRASES: &[&str] = &[
    "dontformat",
    "donotformat",
    "do not format",
    "dont format",
    "dont fmt",
    "do not fmt",
    "no formatting",
    "noformatting",
    "skip formatting",
    "skipformatting",
];

/// Word sets that together mean "don't format", wherever they occur.
const NO_FORMAT_KEYWORDS: &[&[&str]] = &[
    &["don", "format"],
    &["do", "not", "format"],
    &["skip", "format"],
    &["no", "format"],
];

static NO_FORMAT_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)^(don'?t|do\s*not|no|skip|none)[\s\-_]*(format|fmt)?$").ok()
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilesystemType {
    #[default]
    Ext4,
    Fat32,
    Btrfs,
    Xfs,
    /// Mount the partition as-is
    NoFormat,
}

impl FilesystemType {
    /// Classify a filesystem spec from the configuration. Never fails: anything
    /// unrecognised (including an empty string) is treated as ext4.
    pub fn classify(text: &str) -> Self {
        let normalized = text.trim().to_lowercase();

        match normalized.as_str() {
            "ext4" => return Self::Ext4,
            "fat32" => return Self::Fat32,
            "btrfs" => return Self::Btrfs,
            "xfs" => return Self::Xfs,
            _ => {}
        }

        if NO_FORMAT_LITERALS.contains(&normalized.as_str()) || means_no_format(&normalized) {
            debug!("'{}' classified as no-format", text);
            return Self::NoFormat;
        }

        warn!("Unknown filesystem '{}', defaulting to ext4", text);
        Self::Ext4
    }

    /// mkfs program, or `None` when nothing is formatted
    pub fn command(&self) -> Option<&'static str> {
        match self {
            Self::Ext4 => Some("mkfs.ext4"),
            Self::Fat32 => Some("mkfs.fat"),
            Self::Btrfs => Some("mkfs.btrfs"),
            Self::Xfs => Some("mkfs.xfs"),
            Self::NoFormat => None,
        }
    }

    /// Arguments placed before the device path
    pub fn args(&self) -> &'static [&'static str] {
        match self {
            Self::Ext4 => &["-F"],
            Self::Fat32 => &["-F32"],
            Self::Btrfs | Self::Xfs => &["-f"],
            Self::NoFormat => &[],
        }
    }

    pub fn needs_formatting(&self) -> bool {
        !matches!(self, Self::NoFormat)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ext4 => "ext4",
            Self::Fat32 => "fat32",
            Self::Btrfs => "btrfs",
            Self::Xfs => "xfs",
            Self::NoFormat => "noformat",
        }
    }
}

impl std::fmt::Display for FilesystemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Fuzzy "don't format" detection. Each check stands on its own.
fn means_no_format(normalized: &str) -> bool {
    let cleaned: String = normalized
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | '-' | '_'))
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if NO_FORMAT_PHRASES.contains(&cleaned.as_str()) {
        return true;
    }

    if NO_FORMAT_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(normalized))
    {
        return true;
    }

    NO_FORMAT_KEYWORDS
        .iter()
        .any(|words| words.iter().all(|w| normalized.contains(w)))
}
