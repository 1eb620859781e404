//! Configuration commands.

use std::path::Path;

use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout, inline secrets masked.
pub fn dump(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(&config.redacted())
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);
    Ok(())
}

/// Validate the configuration, resolving secret references on the way.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    let sync = config.sync_config()?;
    debug!(data_dir = %sync.data_dir.display(), time_zone = %sync.time_zone, "sync settings");

    let google = config.google.to_provider_config()?;
    config.google.token_source(&google, &sync.data_dir)?;
    println!("Google credentials are usable.");

    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file and data directory paths.
pub fn path(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    println!("config: {}", path.display());
    println!("data:   {}", config.data_dir().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_static_token() {
        let config = ClientConfig::parse("[google]\naccess_token = \"ya29.inline\"").unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn validate_requires_credentials() {
        let config = ClientConfig::default();
        assert!(matches!(
            validate(&config),
            Err(ClientError::AuthRequired(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let config =
            ClientConfig::parse("[google]\naccess_token = \"t\"\ntimeout_secs = 0").unwrap();
        assert!(matches!(validate(&config), Err(ClientError::Config(_))));
    }

    #[test]
    fn dump_serializes_redacted_config() {
        let config = ClientConfig::parse("[google]\naccess_token = \"ya29.inline\"").unwrap();
        let toml_str = toml::to_string_pretty(&config.redacted()).unwrap();
        assert!(toml_str.contains("<redacted>"));
        assert!(!toml_str.contains("ya29.inline"));
        assert!(dump(&config, Path::new("config.toml")).is_ok());
    }
}
