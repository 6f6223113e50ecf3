//! Config command - inspect and edit `config.ini`.
//!
//! Values are validated by the library's [`ConfigKey`] before anything is
//! written, so a bad `set` never leaves an unreadable file behind.

use std::path::Path;

use clap::Subcommand;
use texblock::config::{config_file_path, ConfigFile, ConfigKey};
use texblock::session::CodecKind;
use texblock::strategy::StrategyKind;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print one setting
    Get {
        /// Key as section.key (e.g. encoder.codec)
        key: String,
    },

    /// Change one setting
    Set {
        /// Key as section.key (e.g. pipeline.max_concurrent)
        key: String,

        /// New value; see `texblock config list` for what each key accepts
        value: String,
    },

    /// Restore one setting, or all of them, to the built-in default
    Reset {
        /// Key as section.key; omit to reset everything
        key: Option<String>,
    },

    /// Show every setting with its accepted values
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand against the default settings file.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    let path = config_file_path();
    match command {
        ConfigCommands::Get { key } => {
            println!("{}", get_value(&path, &key)?);
            Ok(())
        }
        ConfigCommands::Set { key, value } => {
            let change = set_value(&path, &key, &value)?;
            println!("{}", change);
            if let Some(warning) = codec_warning(&ConfigFile::load_from(&path)?) {
                eprintln!("warning: {}", warning);
            }
            Ok(())
        }
        ConfigCommands::Reset { key } => {
            let reset = reset_values(&path, key.as_deref())?;
            println!("Reset {} setting(s) in {}", reset, path.display());
            Ok(())
        }
        ConfigCommands::List => {
            print!("{}", render_list(&load_or_default(&path)?));
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'texblock config list' to see available keys.",
            key
        ))
    })
}

fn load_or_default(path: &Path) -> Result<ConfigFile, CliError> {
    if path.exists() {
        Ok(ConfigFile::load_from(path)?)
    } else {
        Ok(ConfigFile::default())
    }
}

fn get_value(path: &Path, key: &str) -> Result<String, CliError> {
    let key = parse_key(key)?;
    let value = key.get(&load_or_default(path)?);
    Ok(if value.is_empty() { "(not set)".to_string() } else { value })
}

/// Validates and stores one value, returning a description of the change.
fn set_value(path: &Path, key: &str, value: &str) -> Result<String, CliError> {
    let key = parse_key(key)?;
    let mut config = load_or_default(path)?;
    let old = key.get(&config);
    key.set(&mut config, value).map_err(|e| {
        CliError::Config(format!("{} (accepted: {})", e, key.allowed_values()))
    })?;
    config.save_to(path)?;

    let new = key.get(&config);
    Ok(if old == new {
        format!("{} unchanged ({})", key, new)
    } else {
        format!("{}: {} -> {}", key, display_value(&old), display_value(&new))
    })
}

/// Returns how many settings differed from their default.
fn reset_values(path: &Path, key: Option<&str>) -> Result<usize, CliError> {
    let keys: Vec<ConfigKey> = match key {
        Some(key) => vec![parse_key(key)?],
        None => ConfigKey::all().to_vec(),
    };
    let mut config = load_or_default(path)?;
    let mut reset = 0;
    for key in keys {
        if key.is_overridden(&config) {
            key.reset(&mut config);
            reset += 1;
        }
    }
    config.save_to(path)?;
    Ok(reset)
}

/// The YCoCg strategy cannot produce DXT planes; sessions refuse that pair.
fn codec_warning(config: &ConfigFile) -> Option<String> {
    (config.encoder.codec == CodecKind::Dxt && config.encoder.strategy == StrategyKind::YCoCg).then(|| {
        "encoder.strategy = ycocg only works with encoder.codec = ycocg; encoding will fail".to_string()
    })
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

fn render_list(config: &ConfigFile) -> String {
    let mut out = String::new();
    let mut current_section = "";
    for key in ConfigKey::all() {
        let section = key.section();
        if section != current_section {
            if !current_section.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("[{}]\n", section));
            current_section = section;
        }
        let marker = if key.is_overridden(config) { "*" } else { " " };
        out.push_str(&format!(
            "{} {:<15} = {:<12} # {}\n",
            marker,
            key.key_name(),
            display_value(&key.get(config)),
            key.allowed_values()
        ));
    }
    if let Some(warning) = codec_warning(config) {
        out.push_str(&format!("\nwarning: {}\n", warning));
    }
    out.push_str("\n* differs from the default\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_path(dir: &TempDir) -> std::path::PathBuf {
        dir.path().join("texblock").join("config.ini")
    }

    #[test]
    fn test_get_without_file_reads_defaults() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        assert_eq!(get_value(&path, "encoder.codec").unwrap(), "ycocg");
        assert_eq!(get_value(&path, "logging.directory").unwrap(), "(not set)");
        assert!(!path.exists());
    }

    #[test]
    fn test_set_reports_change_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);

        let change = set_value(&path, "pipeline.max_concurrent", "6").unwrap();
        assert!(change.starts_with("pipeline.max_concurrent: "), "{}", change);
        assert!(change.ends_with("-> 6"), "{}", change);
        assert_eq!(ConfigFile::load_from(&path).unwrap().pipeline.max_concurrent, 6);

        let again = set_value(&path, "pipeline.max_concurrent", "6").unwrap();
        assert!(again.contains("unchanged"));
    }

    #[test]
    fn test_invalid_value_lists_accepted_values_and_keeps_file() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        set_value(&path, "encoder.quality", "high").unwrap();

        let err = set_value(&path, "encoder.codec", "h264").unwrap_err().to_string();
        assert!(err.contains("dxt | ycocg"), "{}", err);
        let err = set_value(&path, "encoder.deflate_level", "12").unwrap_err().to_string();
        assert!(err.contains("0-9"), "{}", err);
        assert!(set_value(&path, "encoder.bitrate", "1").is_err());

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.encoder.codec, CodecKind::YCoCg);
        assert_eq!(get_value(&path, "encoder.quality").unwrap(), "high");
    }

    #[test]
    fn test_reset_one_and_all() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        set_value(&path, "encoder.alpha", "yes").unwrap();
        set_value(&path, "pipeline.worker_threads", "2").unwrap();

        assert_eq!(reset_values(&path, Some("encoder.alpha")).unwrap(), 1);
        assert_eq!(get_value(&path, "pipeline.worker_threads").unwrap(), "2");
        assert_eq!(reset_values(&path, None).unwrap(), 1);
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_list_marks_overrides_and_warns_on_bad_pair() {
        let mut config = ConfigFile::default();
        assert!(!render_list(&config).contains("warning"));

        config.encoder.codec = CodecKind::Dxt;
        config.encoder.strategy = StrategyKind::YCoCg;
        let listing = render_list(&config);
        assert!(listing.contains("[pipeline]"));
        assert!(listing.lines().any(|l| l.starts_with("* codec") && l.contains("dxt")));
        assert!(listing.lines().any(|l| l.starts_with("  quality")));
        assert!(listing.contains("warning: encoder.strategy = ycocg"));
    }
}
