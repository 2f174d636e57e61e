//! Wave and cloud configurations, orbital recipes and where to find them on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::ConfigError;
use crate::physics::QuantumNumbers;

pub const MAX_WAVES: u32 = 8;
pub const MAX_N: u32 = 8;

/// Fields shared by both model kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonConfig {
    pub resolution: u32,
    pub cpu: bool,
    /// Vertex shader basename; empty selects the mode default.
    pub vert: String,
    /// Fragment shader basename; empty selects the mode default.
    pub frag: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        CommonConfig {
            resolution: 180,
            cpu: false,
            vert: String::new(),
            frag: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaveConfig {
    pub common: CommonConfig,
    pub waves: u32,
    pub amplitude: f64,
    pub period: f64,
    pub wavelength: f64,
    pub parallel: bool,
    pub superposition: bool,
    pub sphere: bool,
}

impl Default for WaveConfig {
    fn default() -> Self {
        WaveConfig {
            common: CommonConfig::default(),
            waves: 4,
            amplitude: 0.4,
            period: 4.0,
            wavelength: 2.0,
            parallel: false,
            superposition: false,
            sphere: false,
        }
    }
}

impl WaveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.common.resolution == 0 {
            return Err(ConfigError::invalid("resolution must be positive"));
        }
        if !(1..=MAX_WAVES).contains(&self.waves) {
            return Err(ConfigError::invalid(format!(
                "waves must be within 1..={MAX_WAVES}, got {}",
                self.waves
            )));
        }
        for (name, value) in [
            ("amplitude", self.amplitude),
            ("period", self.period),
            ("wavelength", self.wavelength),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if self.superposition && !self.common.cpu {
            return Err(ConfigError::invalid("superposition needs cpu evaluation"));
        }
        Ok(())
    }

    /// Vertices per wave: one ring for circles, a grid for spheres.
    pub fn vertices_per_wave(&self) -> usize {
        let res = self.common.resolution as usize;
        if self.sphere {
            res * res
        } else {
            res
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloudConfig {
    pub common: CommonConfig,
    pub cloud_resolution: u32,
    pub cloud_lay_divisor: u32,
    pub cloud_tolerance: f64,
    pub cloud_cull_x: f64,
    pub cloud_cull_y: f64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        CloudConfig {
            common: CommonConfig::default(),
            cloud_resolution: 30,
            cloud_lay_divisor: 2,
            cloud_tolerance: 0.05,
            cloud_cull_x: 0.0,
            cloud_cull_y: 0.0,
        }
    }
}

impl CloudConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cloud_resolution == 0 {
            return Err(ConfigError::invalid("cloudResolution must be positive"));
        }
        if self.cloud_lay_divisor == 0 {
            return Err(ConfigError::invalid("cloudLayDivisor must be positive"));
        }
        if !(self.cloud_tolerance > 0.0 && self.cloud_tolerance <= 1.0) {
            return Err(ConfigError::invalid(format!(
                "cloudTolerance must be within (0, 1], got {}",
                self.cloud_tolerance
            )));
        }
        for (name, value) in [("cloudCull_x", self.cloud_cull_x), ("cloudCull_y", self.cloud_cull_y)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::invalid(format!("{name} must be within [0, 1], got {value}")));
            }
        }
        Ok(())
    }
}

/// A model configuration. The controller dispatches on the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Config {
    Wave(WaveConfig),
    Cloud(CloudConfig),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Config::Wave(cfg) => cfg.validate(),
            Config::Cloud(cfg) => cfg.validate(),
        }
    }

    /// Parses a JSON document. Any `cloud*` key makes it a cloud config;
    /// unknown keys are ignored and missing keys keep their defaults.
    pub fn from_json(text: &str) -> Result<Config, serde_json::Error> {
        let raw: RawConfig = serde_json::from_str(text)?;
        Ok(raw.into_config())
    }

    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = read(path)?;
        Config::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Flat on-disk form; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawConfig {
    waves: Option<u32>,
    amplitude: Option<f64>,
    period: Option<f64>,
    wavelength: Option<f64>,
    resolution: Option<u32>,
    parallel: Option<bool>,
    superposition: Option<bool>,
    cpu: Option<bool>,
    sphere: Option<bool>,
    vert: Option<String>,
    frag: Option<String>,
    cloud_lay_divisor: Option<u32>,
    cloud_resolution: Option<u32>,
    cloud_tolerance: Option<f64>,
    #[serde(rename = "cloudCull_x")]
    cloud_cull_x: Option<f64>,
    #[serde(rename = "cloudCull_y")]
    cloud_cull_y: Option<f64>,
}

impl RawConfig {
    fn is_cloud(&self) -> bool {
        self.cloud_lay_divisor.is_some()
            || self.cloud_resolution.is_some()
            || self.cloud_tolerance.is_some()
            || self.cloud_cull_x.is_some()
            || self.cloud_cull_y.is_some()
    }

    fn common(&self, defaults: CommonConfig) -> CommonConfig {
        CommonConfig {
            resolution: self.resolution.unwrap_or(defaults.resolution),
            cpu: self.cpu.unwrap_or(defaults.cpu),
            vert: self.vert.clone().unwrap_or(defaults.vert),
            frag: self.frag.clone().unwrap_or(defaults.frag),
        }
    }

    fn into_config(self) -> Config {
        if self.is_cloud() {
            let d = CloudConfig::default();
            Config::Cloud(CloudConfig {
                common: self.common(d.common),
                cloud_resolution: self.cloud_resolution.unwrap_or(d.cloud_resolution),
                cloud_lay_divisor: self.cloud_lay_divisor.unwrap_or(d.cloud_lay_divisor),
                cloud_tolerance: self.cloud_tolerance.unwrap_or(d.cloud_tolerance),
                cloud_cull_x: self.cloud_cull_x.unwrap_or(d.cloud_cull_x),
                cloud_cull_y: self.cloud_cull_y.unwrap_or(d.cloud_cull_y),
            })
        } else {
            let d = WaveConfig::default();
            Config::Wave(WaveConfig {
                common: self.common(d.common),
                waves: self.waves.unwrap_or(d.waves),
                amplitude: self.amplitude.unwrap_or(d.amplitude),
                period: self.period.unwrap_or(d.period),
                wavelength: self.wavelength.unwrap_or(d.wavelength),
                parallel: self.parallel.unwrap_or(d.parallel),
                superposition: self.superposition.unwrap_or(d.superposition),
                sphere: self.sphere.unwrap_or(d.sphere),
            })
        }
    }
}

fn default_weight() -> u32 {
    1
}

/// One (l, m_l) entry under a principal quantum number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrbitalTerm {
    pub l: u32,
    pub m: i32,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

impl OrbitalTerm {
    pub fn new(l: u32, m: i32) -> Self {
        OrbitalTerm { l, m, weight: 1 }
    }

    pub fn weighted(l: u32, m: i32, weight: u32) -> Self {
        OrbitalTerm { l, m, weight }
    }
}

/// Orbitals summed into one cloud, keyed by n.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeMap {
    terms: BTreeMap<u32, Vec<OrbitalTerm>>,
}

impl RecipeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(n: u32, l: u32, m: i32) -> Self {
        let mut recipe = Self::new();
        recipe.add(n, OrbitalTerm::new(l, m));
        recipe
    }

    pub fn add(&mut self, n: u32, term: OrbitalTerm) {
        self.terms.entry(n).or_default().push(term);
    }

    pub fn is_empty(&self) -> bool {
        self.terms.values().all(Vec::is_empty)
    }

    pub fn max_n(&self) -> u32 {
        self.terms
            .iter()
            .filter(|(_, terms)| !terms.is_empty())
            .map(|(&n, _)| n)
            .max()
            .unwrap_or(0)
    }

    pub fn orbital_count(&self) -> usize {
        self.terms.values().map(Vec::len).sum()
    }

    /// Orbitals in submission order: ascending n, then insertion order.
    pub fn orbitals(&self) -> impl Iterator<Item = (u32, OrbitalTerm)> + '_ {
        self.terms
            .iter()
            .flat_map(|(&n, terms)| terms.iter().map(move |&term| (n, term)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_empty() {
            return Err(ConfigError::invalid("recipe has no orbitals"));
        }
        for (n, term) in self.orbitals() {
            if !(1..=MAX_N).contains(&n) {
                return Err(ConfigError::invalid(format!("n must be within 1..={MAX_N}, got {n}")));
            }
            if QuantumNumbers::new(n, term.l, term.m).is_none() {
                return Err(ConfigError::invalid(format!(
                    "orbital ({n}, {}, {}) needs 0 <= l < n and |m| <= l",
                    term.l, term.m
                )));
            }
        }
        Ok(())
    }

    pub fn from_json(text: &str) -> Result<RecipeMap, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<RecipeMap, ConfigError> {
        let text = read(path)?;
        RecipeMap::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Root directory and the conventional subdirectories under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayout {
    pub root: PathBuf,
    pub shaders_dir: PathBuf,
    pub configs_dir: PathBuf,
}

impl FileLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        FileLayout {
            shaders_dir: root.join("shaders"),
            configs_dir: root.join("configs"),
            root,
        }
    }

    /// All `.json` files under the configs directory, sorted.
    pub fn config_files(&self) -> Vec<PathBuf> {
        files_with_extension(&self.configs_dir, "json")
    }
}

pub(crate) fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some(extension))
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}
