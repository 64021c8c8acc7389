//! Filter parameters: the editable store and its immutable snapshot.
//!
//! Every field is transmitted with every submission, including the ones whose
//! toggle is off (the kernel and sigma are sent even with blur disabled; the
//! service ignores them).
//!
//! ## Clamping
//!
//! Numeric setters never fail. Out-of-range values are clamped to the field's
//! bounds and text that does not parse as a number becomes the field minimum,
//! so the displayed value always equals what will be sent.
//!
//! Fovea coordinates and radius are capped at the resolution observed **when
//! they are written**. Lowering the resolution afterwards does not reclamp
//! them: the cap is a write-time rule, not a read-time one.
//!
//! ```text
//! resolution = 260
//! fovea_x    = 300   → stored as 260
//! resolution = 100   → fovea_x stays 260
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ParamError {
    #[error("unknown parameter: {0}")]
    UnknownField(String),
    #[error("invalid boolean for {field}: {value:?}")]
    InvalidBool { field: &'static str, value: String },
    #[error("invalid kernel size: {0:?} (expected one of 3, 5, 7, 9, 11, 21)")]
    InvalidKernel(String),
    #[error("invalid fovea type: {0:?} (expected static or dynamic)")]
    InvalidFoveaType(String),
}

pub const MIN_RESOLUTION: u32 = 1;
pub const MAX_PERCENT: u8 = 100;
pub const MIN_CORES: u32 = 1;

/// Square Gaussian kernel used for the peripheral blur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KernelSize {
    #[default]
    K3,
    K5,
    K7,
    K9,
    K11,
    K21,
}

impl KernelSize {
    pub const ALL: [KernelSize; 6] = [
        KernelSize::K3,
        KernelSize::K5,
        KernelSize::K7,
        KernelSize::K9,
        KernelSize::K11,
        KernelSize::K21,
    ];

    pub fn side(self) -> u32 {
        match self {
            Self::K3 => 3,
            Self::K5 => 5,
            Self::K7 => 7,
            Self::K9 => 9,
            Self::K11 => 11,
            Self::K21 => 21,
        }
    }

    pub fn from_side(side: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.side() == side)
    }
}

/// Renders the tuple form the service parses: `(5, 5)`.
impl fmt::Display for KernelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({0}, {0})", self.side())
    }
}

/// Accepts `(5, 5)`, `(5,5)`, `5x5` and a bare `5`.
impl FromStr for KernelSize {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParamError::InvalidKernel(s.to_string());
        let inner = s.trim().trim_start_matches('(').trim_end_matches(')');
        let sides: Vec<&str> = inner
            .split([',', 'x'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        let side = match sides.as_slice() {
            [single] => single.parse::<u32>().map_err(|_| invalid())?,
            [w, h] if w == h => w.parse::<u32>().map_err(|_| invalid())?,
            _ => return Err(invalid()),
        };
        Self::from_side(side).ok_or_else(invalid)
    }
}

impl TryFrom<String> for KernelSize {
    type Error = ParamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KernelSize> for String {
    fn from(value: KernelSize) -> Self {
        value.to_string()
    }
}

/// Fovea placement mode. Reserved: sent, but not exposed for editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoveaType {
    #[default]
    Static,
    Dynamic,
}

impl fmt::Display for FoveaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
        })
    }
}

impl FromStr for FoveaType {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            _ => Err(ParamError::InvalidFoveaType(s.to_string())),
        }
    }
}

/// Immutable copy of every parameter, taken when a submission starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterSnapshot {
    pub resolution: u32,
    pub fovea_x: u32,
    pub fovea_y: u32,
    pub fovea_radius: u32,
    pub peripheral_cone_cells: u8,
    pub fovea_rod_cells: u8,
    pub peripheral_blur_enabled: bool,
    pub kernel: KernelSize,
    pub peripheral_sigma: f64,
    pub peripheral_grayscale: bool,
    pub fovea_type: FoveaType,
    pub verbose: bool,
    pub multiprocessing: bool,
    pub num_cores: u32,
    pub retinal_warp: bool,
    pub peripheral_gaussian_sigma: f64,
}

impl ParameterSnapshot {
    /// Wire name and textual value of every field, in transmission order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("fovea_radius", self.fovea_radius.to_string()),
            ("peripheral_cone_cells", self.peripheral_cone_cells.to_string()),
            ("fovea_rod_cells", self.fovea_rod_cells.to_string()),
            ("peripheral_blur_enabled", self.peripheral_blur_enabled.to_string()),
            ("kernel_value", self.kernel.to_string()),
            ("fovea_type", self.fovea_type.to_string()),
            ("verbose", self.verbose.to_string()),
            ("multiprocessing", self.multiprocessing.to_string()),
            ("num_cores", self.num_cores.to_string()),
            ("input_image_resolution", self.resolution.to_string()),
            ("peripheral_sigma", self.peripheral_sigma.to_string()),
            ("peripheral_grayscale", self.peripheral_grayscale.to_string()),
            ("retinal_warp", self.retinal_warp.to_string()),
            ("fovea_x", self.fovea_x.to_string()),
            ("fovea_y", self.fovea_y.to_string()),
            (
                "peripheral_gaussian_sigma",
                self.peripheral_gaussian_sigma.to_string(),
            ),
        ]
    }
}

/// Current, editable parameter values for the session.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterStore {
    values: ParameterSnapshot,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self {
            values: ParameterSnapshot {
                resolution: 260,
                fovea_x: 0,
                fovea_y: 0,
                fovea_radius: 0,
                peripheral_cone_cells: 0,
                fovea_rod_cells: 0,
                peripheral_blur_enabled: false,
                kernel: KernelSize::K3,
                peripheral_sigma: 0.0,
                peripheral_grayscale: false,
                fovea_type: FoveaType::Static,
                verbose: false,
                multiprocessing: false,
                num_cores: 7,
                retinal_warp: false,
                peripheral_gaussian_sigma: 0.0,
            },
        }
    }
}

fn clamp_u32(value: i64, min: u32, max: u32) -> u32 {
    value.clamp(min as i64, max as i64) as u32
}

fn clamp_sigma(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

/// Lenient integer parse for form input: `"42"`, `" 42 "`, `"42.9"` → 42.
/// Anything else is `None` and the caller substitutes the minimum.
fn parse_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64)
    })
}

fn parse_float(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(0.0)
}

fn parse_bool(field: &'static str, raw: &str) -> Result<bool, ParamError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ParamError::InvalidBool {
            field,
            value: raw.to_string(),
        }),
    }
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        self.values
    }

    pub fn resolution(&self) -> u32 {
        self.values.resolution
    }

    pub fn fovea_x(&self) -> u32 {
        self.values.fovea_x
    }

    pub fn fovea_y(&self) -> u32 {
        self.values.fovea_y
    }

    pub fn fovea_radius(&self) -> u32 {
        self.values.fovea_radius
    }

    pub fn peripheral_cone_cells(&self) -> u8 {
        self.values.peripheral_cone_cells
    }

    pub fn fovea_rod_cells(&self) -> u8 {
        self.values.fovea_rod_cells
    }

    pub fn peripheral_blur_enabled(&self) -> bool {
        self.values.peripheral_blur_enabled
    }

    pub fn kernel(&self) -> KernelSize {
        self.values.kernel
    }

    pub fn peripheral_sigma(&self) -> f64 {
        self.values.peripheral_sigma
    }

    pub fn peripheral_grayscale(&self) -> bool {
        self.values.peripheral_grayscale
    }

    pub fn fovea_type(&self) -> FoveaType {
        self.values.fovea_type
    }

    pub fn num_cores(&self) -> u32 {
        self.values.num_cores
    }

    pub fn verbose(&self) -> bool {
        self.values.verbose
    }

    pub fn multiprocessing(&self) -> bool {
        self.values.multiprocessing
    }

    pub fn retinal_warp(&self) -> bool {
        self.values.retinal_warp
    }

    pub fn peripheral_gaussian_sigma(&self) -> f64 {
        self.values.peripheral_gaussian_sigma
    }

    /// Resolution in pixels, at least 1.
    pub fn set_resolution(&mut self, value: i64) {
        self.values.resolution = clamp_u32(value, MIN_RESOLUTION, u32::MAX);
    }

    pub fn set_fovea_x(&mut self, value: i64) {
        self.values.fovea_x = clamp_u32(value, 0, self.values.resolution);
    }

    pub fn set_fovea_y(&mut self, value: i64) {
        self.values.fovea_y = clamp_u32(value, 0, self.values.resolution);
    }

    pub fn set_fovea_radius(&mut self, value: i64) {
        self.values.fovea_radius = clamp_u32(value, 0, self.values.resolution);
    }

    pub fn set_peripheral_cone_cells(&mut self, value: i64) {
        self.values.peripheral_cone_cells = clamp_u32(value, 0, MAX_PERCENT as u32) as u8;
    }

    pub fn set_fovea_rod_cells(&mut self, value: i64) {
        self.values.fovea_rod_cells = clamp_u32(value, 0, MAX_PERCENT as u32) as u8;
    }

    pub fn set_peripheral_blur_enabled(&mut self, enabled: bool) {
        self.values.peripheral_blur_enabled = enabled;
    }

    pub fn set_kernel(&mut self, kernel: KernelSize) {
        self.values.kernel = kernel;
    }

    /// Non-finite or negative sigma becomes 0.
    pub fn set_peripheral_sigma(&mut self, value: f64) {
        self.values.peripheral_sigma = clamp_sigma(value);
    }

    pub fn set_peripheral_grayscale(&mut self, enabled: bool) {
        self.values.peripheral_grayscale = enabled;
    }

    pub fn set_fovea_type(&mut self, fovea_type: FoveaType) {
        self.values.fovea_type = fovea_type;
    }

    pub fn set_verbose(&mut self, enabled: bool) {
        self.values.verbose = enabled;
    }

    pub fn set_multiprocessing(&mut self, enabled: bool) {
        self.values.multiprocessing = enabled;
    }

    pub fn set_num_cores(&mut self, value: i64) {
        self.values.num_cores = clamp_u32(value, MIN_CORES, u32::MAX);
    }

    pub fn set_retinal_warp(&mut self, enabled: bool) {
        self.values.retinal_warp = enabled;
    }

    pub fn set_peripheral_gaussian_sigma(&mut self, value: f64) {
        self.values.peripheral_gaussian_sigma = clamp_sigma(value);
    }

    /// Set a field by name from raw text input.
    ///
    /// Both the field name and its wire name are accepted
    /// (`resolution` / `input_image_resolution`). Numeric text that does not
    /// parse becomes the field minimum.
    pub fn apply(&mut self, name: &str, raw: &str) -> Result<(), ParamError> {
        let int_or = |min: i64| parse_int(raw).unwrap_or(min);
        match name.trim() {
            "resolution" | "input_image_resolution" => {
                self.set_resolution(int_or(MIN_RESOLUTION as i64))
            }
            "fovea_x" => self.set_fovea_x(int_or(0)),
            "fovea_y" => self.set_fovea_y(int_or(0)),
            "fovea_radius" => self.set_fovea_radius(int_or(0)),
            "peripheral_cone_cells" => self.set_peripheral_cone_cells(int_or(0)),
            "fovea_rod_cells" => self.set_fovea_rod_cells(int_or(0)),
            "num_cores" => self.set_num_cores(int_or(MIN_CORES as i64)),
            "peripheral_sigma" => self.set_peripheral_sigma(parse_float(raw)),
            "peripheral_gaussian_sigma" => self.set_peripheral_gaussian_sigma(parse_float(raw)),
            "peripheral_blur_enabled" => {
                self.set_peripheral_blur_enabled(parse_bool("peripheral_blur_enabled", raw)?)
            }
            "peripheral_grayscale" => {
                self.set_peripheral_grayscale(parse_bool("peripheral_grayscale", raw)?)
            }
            "verbose" => self.set_verbose(parse_bool("verbose", raw)?),
            "multiprocessing" => self.set_multiprocessing(parse_bool("multiprocessing", raw)?),
            "retinal_warp" => self.set_retinal_warp(parse_bool("retinal_warp", raw)?),
            "kernel_value" | "kernel" => self.set_kernel(raw.parse()?),
            "fovea_type" => self.set_fovea_type(raw.parse()?),
            other => return Err(ParamError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    /// Apply a `name=value` assignment as given on the command line.
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<(), ParamError> {
        match assignment.split_once('=') {
            Some((name, raw)) => self.apply(name, raw),
            None => Err(ParamError::UnknownField(assignment.to_string())),
        }
    }
}
