use std::path::Path;
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;

use crate::error::Error;

/// Pipeline configuration, loaded from kebab-case YAML.
///
/// Every field has a default so an empty file (or no file at all) yields
/// a usable pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Configuration {
    /// Bounding box the content image is downscaled to fit before any
    /// blend math runs. The final composite is restored to the source
    /// resolution on export.
    #[serde(default = "Configuration::default_working_max_dim")]
    pub working_max_dim: u32,

    /// Square edge the style images are resampled to for the transfer
    /// backend.
    #[serde(default = "Configuration::default_style_size")]
    pub style_size: u32,

    /// Quiescence window for coalescing weight changes into one blend
    /// recompute.
    #[serde(with = "humantime_serde", default = "Configuration::default_debounce")]
    pub debounce: Duration,

    /// Concurrent style-transfer calls during batch stylization.
    #[serde(default = "Configuration::default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Configuration {
    fn default_working_max_dim() -> u32 {
        1024
    }

    fn default_style_size() -> u32 {
        256
    }

    fn default_debounce() -> Duration {
        Duration::from_millis(100)
    }

    fn default_max_in_flight() -> usize {
        2
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.working_max_dim > 0, "working-max-dim must be positive");
        ensure!(self.style_size > 0, "style-size must be positive");
        ensure!(self.max_in_flight > 0, "max-in-flight must be positive");
        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            working_max_dim: Self::default_working_max_dim(),
            style_size: Self::default_style_size(),
            debounce: Self::default_debounce(),
            max_in_flight: Self::default_max_in_flight(),
        }
    }
}

pub fn from_yaml_file(path: &Path) -> Result<Configuration, Error> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&raw)?)
}
