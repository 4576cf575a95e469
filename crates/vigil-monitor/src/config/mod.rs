//! Monitor config loader (strict parsing).

pub mod schema;

use std::fs;

use vigil_core::error::{Result, VigilError};

pub use schema::{CollectorSection, MonitorSection, VigilConfig};

pub fn load_from_file(path: &str) -> Result<VigilConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| VigilError::BadConfig(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<VigilConfig> {
    let cfg: VigilConfig = serde_yaml::from_str(s)
        .map_err(|e| VigilError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
