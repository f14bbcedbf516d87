//! Locale, keymap and timezone configuration

use crate::config::LocaleConfig;
use crate::utils::command::CommandRunner;
use crate::utils::error::{InstallError, Result};
use tracing::{info, warn};

/// Configure locale, keymap and timezone
pub fn configure_locale(
    cmd: &CommandRunner,
    config: &LocaleConfig,
    install_root: &str,
) -> Result<()> {
    info!("Configuring locale, keymap, and timezone");

    set_locale(cmd, &config.locale, install_root)?;
    set_keymap(cmd, &config.keymap, install_root)?;
    set_timezone(cmd, &config.timezone, install_root)?;

    Ok(())
}

/// Always generated, whatever the configuration asks for
const FALLBACK_LOCALE: &str = "en_US.UTF-8 UTF-8";

/// `locale.gen` lines from alternating name and encoding entries, after
/// [`FALLBACK_LOCALE`].
///
/// `["de_DE", "ISO-8859-1"]` gives `en_US.UTF-8 UTF-8` and `de_DE ISO-8859-1`.
/// A trailing name without an encoding is dropped.
pub fn locale_gen_entries(locales: &[String]) -> Vec<String> {
    if locales.len() % 2 != 0 {
        warn!(
            "Locale list has an odd number of entries, ignoring '{}'",
            locales[locales.len() - 1]
        );
    }
    let mut entries = vec![FALLBACK_LOCALE.to_string()];
    for pair in locales.chunks_exact(2) {
        let entry = format!("{} {}", pair[0], pair[1]);
        if !entries.contains(&entry) {
            entries.push(entry);
        }
    }
    entries
}

/// Configure locale
fn set_locale(cmd: &CommandRunner, locales: &[String], install_root: &str) -> Result<()> {
    let entries = locale_gen_entries(locales);
    let Some(lang) = locales.first() else {
        return Err(InstallError::ConfigError("No locale configured".to_string()));
    };
    info!("Setting locale to {}", lang);

    let mut locale_gen = entries.join("\n");
    locale_gen.push('\n');
    cmd.append_file(format!("{}/etc/locale.gen", install_root), &locale_gen)?;
    cmd.write_file(
        format!("{}/etc/locale.conf", install_root),
        &format!("LANG={}\n", lang),
    )?;

    cmd.run_in_chroot(install_root, "locale-gen")?;
    Ok(())
}

/// Set keyboard layout
fn set_keymap(cmd: &CommandRunner, keymap: &str, install_root: &str) -> Result<()> {
    info!("Setting keymap to {}", keymap);
    cmd.write_file(
        format!("{}/etc/vconsole.conf", install_root),
        &format!("KEYMAP={}\n", keymap),
    )
}

/// Set system timezone
fn set_timezone(cmd: &CommandRunner, timezone: &str, install_root: &str) -> Result<()> {
    info!("Setting timezone to {}", timezone);

    cmd.run_in_chroot(
        install_root,
        &format!("ln -sf /usr/share/zoneinfo/{} /etc/localtime", timezone),
    )?;
    cmd.run_in_chroot(install_root, "hwclock --systohc")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LocaleConfig {
        LocaleConfig {
            locale: vec!["en_US.UTF-8".to_string(), "UTF-8".to_string()],
            keymap: "us".to_string(),
            timezone: "Europe/Berlin".to_string(),
        }
    }

    #[test]
    fn entries_pair_names_with_encodings() {
        let locales: Vec<String> = ["en_US.UTF-8", "UTF-8", "de_DE", "ISO-8859-1", "fr_FR"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            locale_gen_entries(&locales),
            vec!["en_US.UTF-8 UTF-8", "de_DE ISO-8859-1"]
        );
    }

    #[test]
    fn fallback_locale_is_always_generated() {
        let single = vec!["en_US.UTF-8".to_string()];
        assert_eq!(locale_gen_entries(&single), vec!["en_US.UTF-8 UTF-8"]);

        let german = vec!["de_DE.UTF-8".to_string(), "UTF-8".to_string()];
        assert_eq!(
            locale_gen_entries(&german),
            vec!["en_US.UTF-8 UTF-8", "de_DE.UTF-8 UTF-8"]
        );
    }

    #[test]
    fn locale_sequence() {
        let cmd = CommandRunner::new(true);
        configure_locale(&cmd, &config(), "/mnt").unwrap();
        assert_eq!(
            cmd.history(),
            vec![
                "append /mnt/etc/locale.gen",
                "write /mnt/etc/locale.conf",
                "arch-chroot /mnt locale-gen",
                "write /mnt/etc/vconsole.conf",
                "arch-chroot /mnt ln -sf /usr/share/zoneinfo/Europe/Berlin /etc/localtime",
                "arch-chroot /mnt hwclock --systohc",
            ]
        );
    }

    #[test]
    fn keymap_is_written() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("etc")).unwrap();
        let root_str = root.path().to_string_lossy().to_string();

        let cmd = CommandRunner::new(false);
        set_keymap(&cmd, "de", &root_str).unwrap();
        assert_eq!(
            std::fs::read_to_string(root.path().join("etc/vconsole.conf")).unwrap(),
            "KEYMAP=de\n"
        );
    }

    #[test]
    fn empty_locale_list_is_rejected() {
        let cmd = CommandRunner::new(true);
        let mut config = config();
        config.locale.clear();
        assert!(configure_locale(&cmd, &config, "/mnt").is_err());
        assert!(cmd.history().is_empty());
    }
}
