//! Client configuration module.
//!
//! Handles loading, validating, and merging `eyeball.toml`. User values are
//! layered over stock defaults, so a config file only needs the keys it wants
//! to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [endpoint]
//! url = "http://localhost:8080/process"  # Processing service
//! timeout_secs = 120                     # Bounded wait per submission
//!
//! [ingest]
//! max_images = 500                       # Images held per session
//!
//! [parameters]
//! # Initial filter values. Absent keys keep the built-in defaults.
//! resolution = 260
//! fovea_x = 130
//! kernel = "(5, 5)"
//! ```
//!
//! Parameter values go through the same setters as interactive edits, so
//! they are clamped rather than rejected. Unknown keys are rejected to catch
//! typos early.

use crate::ingest::DEFAULT_MAX_IMAGES;
use crate::params::{FoveaType, KernelSize, ParameterStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File name looked up in the working directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "eyeball.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Client configuration loaded from `eyeball.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Where and how long to wait for the processing service.
    pub endpoint: EndpointConfig,
    /// Image ingestion limits.
    pub ingest: IngestConfig,
    /// Initial parameter values.
    pub parameters: ParametersConfig,
}

impl ClientConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = reqwest::Url::parse(&self.endpoint.url) {
            return Err(ConfigError::Validation(format!(
                "endpoint.url is not a valid URL ({}): {e}",
                self.endpoint.url
            )));
        }
        if self.endpoint.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "endpoint.timeout_secs must be at least 1".into(),
            ));
        }
        if self.ingest.max_images == 0 {
            return Err(ConfigError::Validation(
                "ingest.max_images must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    /// URL the multipart request is POSTed to.
    pub url: String,
    /// Seconds to wait for a complete response before giving up.
    pub timeout_secs: u64,
}

impl EndpointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/process".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Maximum number of source images held at once.
    pub max_images: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_images: DEFAULT_MAX_IMAGES,
        }
    }
}

/// Sparse parameter overrides. `None` keeps the store default.
///
/// Integers are signed so out-of-range input reaches the clamping setters
/// instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParametersConfig {
    pub resolution: Option<i64>,
    pub fovea_x: Option<i64>,
    pub fovea_y: Option<i64>,
    pub fovea_radius: Option<i64>,
    pub peripheral_cone_cells: Option<i64>,
    pub fovea_rod_cells: Option<i64>,
    pub peripheral_blur_enabled: Option<bool>,
    pub kernel: Option<KernelSize>,
    pub peripheral_sigma: Option<f64>,
    pub peripheral_grayscale: Option<bool>,
    pub fovea_type: Option<FoveaType>,
    pub verbose: Option<bool>,
    pub multiprocessing: Option<bool>,
    pub num_cores: Option<i64>,
    pub retinal_warp: Option<bool>,
    pub peripheral_gaussian_sigma: Option<f64>,
}

impl ParametersConfig {
    /// Write every present value into `store`.
    ///
    /// Resolution goes first so the coordinate caps see the configured value.
    pub fn apply_to(&self, store: &mut ParameterStore) {
        if let Some(v) = self.resolution {
            store.set_resolution(v);
        }
        if let Some(v) = self.fovea_x {
            store.set_fovea_x(v);
        }
        if let Some(v) = self.fovea_y {
            store.set_fovea_y(v);
        }
        if let Some(v) = self.fovea_radius {
            store.set_fovea_radius(v);
        }
        if let Some(v) = self.peripheral_cone_cells {
            store.set_peripheral_cone_cells(v);
        }
        if let Some(v) = self.fovea_rod_cells {
            store.set_fovea_rod_cells(v);
        }
        if let Some(v) = self.peripheral_blur_enabled {
            store.set_peripheral_blur_enabled(v);
        }
        if let Some(v) = self.kernel {
            store.set_kernel(v);
        }
        if let Some(v) = self.peripheral_sigma {
            store.set_peripheral_sigma(v);
        }
        if let Some(v) = self.peripheral_grayscale {
            store.set_peripheral_grayscale(v);
        }
        if let Some(v) = self.fovea_type {
            store.set_fovea_type(v);
        }
        if let Some(v) = self.verbose {
            store.set_verbose(v);
        }
        if let Some(v) = self.multiprocessing {
            store.set_multiprocessing(v);
        }
        if let Some(v) = self.num_cores {
            store.set_num_cores(v);
        }
        if let Some(v) = self.retinal_warp {
            store.set_retinal_warp(v);
        }
        if let Some(v) = self.peripheral_gaussian_sigma {
            store.set_peripheral_gaussian_sigma(v);
        }
    }

    /// A fresh store with these overrides applied.
    pub fn to_store(&self) -> ParameterStore {
        let mut store = ParameterStore::new();
        self.apply_to(&mut store);
        store
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ClientConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ClientConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ClientConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `eyeball.toml` from the given directory, or defaults if absent.
pub fn load_config(dir: &Path) -> Result<ClientConfig, ConfigError> {
    resolve_config(
        stock_defaults_value(),
        load_raw_config(&dir.join(CONFIG_FILE_NAME))?,
    )
}

/// Load an explicitly named config file. A missing file is an error here.
pub fn load_config_file(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let overlay: toml::Value = toml::from_str(&content)?;
    resolve_config(stock_defaults_value(), Some(overlay))
}

/// Returns a fully-commented stock `eyeball.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Eyeball Client Configuration
# ============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Processing service
# ---------------------------------------------------------------------------
[endpoint]
# URL the images and parameters are POSTed to.
url = "http://localhost:8080/process"

# Seconds to wait for a complete response. A slower answer fails the
# submission with a timeout; earlier results are kept.
timeout_secs = 120

# ---------------------------------------------------------------------------
# Image ingestion
# ---------------------------------------------------------------------------
[ingest]
# Maximum number of source images held at once. Adding past this limit
# is refused as a whole.
max_images = 500

# ---------------------------------------------------------------------------
# Initial filter parameters
# ---------------------------------------------------------------------------
# Out-of-range values are clamped, not rejected. Fovea coordinates and
# radius are capped at the resolution.
[parameters]
# resolution = 260
# fovea_x = 0
# fovea_y = 0
# fovea_radius = 0
# peripheral_cone_cells = 0         # percent, 0-100
# fovea_rod_cells = 0               # percent, 0-100
# peripheral_blur_enabled = false
# kernel = "(3, 3)"                 # 3, 5, 7, 9, 11 or 21
# peripheral_sigma = 0.0
# peripheral_grayscale = false
# fovea_type = "static"             # static or dynamic
# verbose = false
# multiprocessing = false
# num_cores = 7
# retinal_warp = false
# peripheral_gaussian_sigma = 0.0
"##
}
