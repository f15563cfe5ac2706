//! Daemon configuration loading
//!
//! The config lives at a fixed well-known path next to the supervised
//! repository. A missing or malformed file is fatal at startup; the core
//! never reloads it.

use std::path::Path;

use shared::Config;

use crate::error::{DaemonError, DaemonResult};

/// Well-known config path, relative to the daemon's working directory
pub const CONFIG_PATH: &str = "./redeploy.json";

/// Load and validate the daemon config from `path`
pub fn load(path: impl AsRef<Path>) -> DaemonResult<Config> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|_| DaemonError::config("Config file doesn't exist"))?;

    let config = Config::from_json(&text)?;
    Ok(config)
}
