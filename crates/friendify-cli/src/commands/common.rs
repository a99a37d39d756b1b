//! Shared helpers for command handlers

use anyhow::{Context, Result};
use friendify_core::FriendifyConfig;
use std::path::Path;
use tracing::info;

/// Load the configuration at `path`, falling back to defaults when the file
/// does not exist. A file that exists but does not parse is an error.
pub fn load_config(path: &Path) -> Result<FriendifyConfig> {
    if !path.exists() {
        info!(path = %path.display(), "No config file, using defaults");
        return Ok(FriendifyConfig::default());
    }

    let config = FriendifyConfig::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    info!(path = %path.display(), device = %config.device.display_name, "Loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, FriendifyConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[device]\ndisplay_name = \"kitchen\"\n\n[transport]\nmax_peers = 3").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.device.display_name, "kitchen");
        assert_eq!(config.transport.max_peers, 3);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ranging]\nnear_threshold_m = -2.0").unwrap();

        let error = load_config(file.path()).unwrap_err();
        assert!(error.to_string().contains("failed to load config"));
    }
}
