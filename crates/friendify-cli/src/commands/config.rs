//! Configuration inspection

use anyhow::Result;
use friendify_core::FriendifyConfig;

/// Print the effective configuration as TOML
pub fn handle_config_command(config: &FriendifyConfig) -> Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
