use crate::defaults::CONFIG_FILE_NAME;
use crate::io::Configuration;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Read the configuration file. If it does not exist, the default settings are used
/// and written to the file so that the user can see all the used options.
pub fn read_input(config_file: Option<&str>) -> Result<Configuration> {
    let config_file_path: &Path = Path::new(config_file.unwrap_or(CONFIG_FILE_NAME));
    let config_string: String = if config_file_path.exists() {
        fs::read_to_string(config_file_path).with_context(|| {
            format!("Unable to read config file {}", config_file_path.display())
        })?
    } else {
        String::new()
    };
    // Load the configuration.
    let config: Configuration = toml::from_str(&config_string).with_context(|| {
        format!("Unable to parse config file {}", config_file_path.display())
    })?;
    if !config_file_path.exists() {
        let config_string: String =
            toml::to_string(&config).context("Unable to serialize the configuration")?;
        fs::write(config_file_path, config_string).with_context(|| {
            format!("Unable to write config file {}", config_file_path.display())
        })?;
    }
    Ok(config)
}
