//! Init command - write a settings file with the defaults.

use texblock::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Run the init command. An existing file is left alone unless `force`.
pub fn run(force: bool) -> Result<(), CliError> {
    let path = config_file_path();
    if path.exists() && !force {
        println!("Configuration file already exists: {}", path.display());
        println!("Use --force to overwrite it with the defaults.");
        return Ok(());
    }

    ConfigFile::default().save_to(&path)?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to customize texblock settings.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}
