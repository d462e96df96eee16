//! The INI configuration file and its typed sections.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use tracing::{debug, info};

use super::error::ConfigError;
use super::keys::ConfigKey;
use crate::coord::LocalOrigin;
use crate::crs::CrsRegistry;
use crate::gml::{GmlOptions, DEFAULT_EXTRUSION_HEIGHT, DEFAULT_LAYER_NAME, DEFAULT_TARGET_CRS};
use crate::http::DEFAULT_TIMEOUT_SECS;
use crate::wms::{
    ChangeThresholds, RasterConfig, StreamMode, DEFAULT_MAX_TILE_PX, DEFAULT_MIN_TILE_PX,
    DEFAULT_PIXELS_PER_UNIT, DEFAULT_TILE_PX, DEFAULT_TILE_SIZE, DEFAULT_VIEW_RADIUS,
};

/// Section holding user CRS definitions, keyed by EPSG code.
///
/// Keys are bare codes (`2062 = +proj=...`) because INI treats `:` as a key
/// delimiter.
pub const CRS_SECTION: &str = "crs";

/// Default log level when neither the file nor `RUST_LOG` sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Path of the configuration file: `<config dir>/terralayer/config.ini`.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Directory holding the configuration file.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("terralayer")
}

/// `[scene]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSettings {
    pub target_crs: String,
    pub origin_x: Option<f64>,
    pub origin_y: Option<f64>,
    pub origin_z: Option<f64>,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            target_crs: DEFAULT_TARGET_CRS.to_string(),
            origin_x: None,
            origin_y: None,
            origin_z: None,
        }
    }
}

impl SceneSettings {
    /// Configured scene origin; `None` unless both `origin_x` and `origin_y`
    /// are set.
    pub fn origin(&self) -> Option<LocalOrigin> {
        match (self.origin_x, self.origin_y) {
            (Some(x), Some(y)) => Some(LocalOrigin::new(x, y, self.origin_z.unwrap_or(0.0))),
            _ => None,
        }
    }
}

/// `[wms]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WmsSettings {
    pub mode: StreamMode,
    pub pixels_per_unit: f64,
    pub update_threshold: f64,
    pub zoom_in_threshold: f64,
    pub zoom_out_threshold: f64,
    pub min_tile_px: u32,
    pub max_tile_px: u32,
    pub tile_size: f64,
    pub tile_px: u32,
    pub view_radius: u32,
    /// HTTP timeout in seconds.
    pub timeout: u64,
    pub min_update_interval_ms: u64,
}

impl Default for WmsSettings {
    fn default() -> Self {
        let thresholds = ChangeThresholds::default();
        Self {
            mode: StreamMode::default(),
            pixels_per_unit: DEFAULT_PIXELS_PER_UNIT,
            update_threshold: thresholds.update_threshold,
            zoom_in_threshold: thresholds.zoom_in_threshold,
            zoom_out_threshold: thresholds.zoom_out_threshold,
            min_tile_px: DEFAULT_MIN_TILE_PX,
            max_tile_px: DEFAULT_MAX_TILE_PX,
            tile_size: DEFAULT_TILE_SIZE,
            tile_px: DEFAULT_TILE_PX,
            view_radius: DEFAULT_VIEW_RADIUS,
            timeout: DEFAULT_TIMEOUT_SECS,
            min_update_interval_ms: 0,
        }
    }
}

/// `[gml]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GmlSettings {
    pub extrusion_height: f64,
    pub default_srs: Option<String>,
    pub layer_name: String,
}

impl Default for GmlSettings {
    fn default() -> Self {
        Self {
            extrusion_height: DEFAULT_EXTRUSION_HEIGHT,
            default_srs: None,
            layer_name: DEFAULT_LAYER_NAME.to_string(),
        }
    }
}

/// `[logging]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file; console only when unset.
    pub file: Option<PathBuf>,
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: None,
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Contents of `config.ini`, with defaults for every missing key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub scene: SceneSettings,
    pub wms: WmsSettings,
    pub gml: GmlSettings,
    pub logging: LoggingSettings,
    /// `<EPSG code> = <proj4>` entries, in file order.
    pub crs: Vec<(u32, String)>,
}

impl ConfigFile {
    /// Loads [`config_file_path`]; a missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parses INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|props| props.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        if let Some(props) = ini.section(Some(CRS_SECTION)) {
            for (code, proj4) in props.iter() {
                let parsed = code.trim().parse::<u32>().map_err(|_| {
                    let key = format!("{}.{}", CRS_SECTION, code);
                    ConfigError::invalid(&key, proj4, "key must be an EPSG code")
                })?;
                config.crs.push((parsed, proj4.to_string()));
            }
        }
        Ok(config)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        for (code, proj4) in &self.crs {
            ini.with_section(Some(CRS_SECTION))
                .set(code.to_string(), proj4.as_str());
        }
        ini
    }

    /// Writes to [`config_file_path`], creating the directory if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |message: String| ConfigError::Write {
            path: path.to_path_buf(),
            message,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|e| write_error(e.to_string()))?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Raster layer configuration for the `[scene]` and `[wms]` sections.
    pub fn raster_config(&self) -> RasterConfig {
        let wms = &self.wms;
        RasterConfig {
            mode: wms.mode,
            pixels_per_unit: wms.pixels_per_unit,
            thresholds: ChangeThresholds {
                update_threshold: wms.update_threshold,
                zoom_in_threshold: wms.zoom_in_threshold,
                zoom_out_threshold: wms.zoom_out_threshold,
            },
            min_tile_px: wms.min_tile_px,
            max_tile_px: wms.max_tile_px,
            tile_size: wms.tile_size,
            tile_px: wms.tile_px,
            view_radius: wms.view_radius,
            min_update_interval: Duration::from_millis(wms.min_update_interval_ms),
            target_crs: self.scene.target_crs.clone(),
            request_crs: None,
        }
    }

    /// GML loader options for the `[scene]` and `[gml]` sections.
    pub fn gml_options(&self) -> GmlOptions {
        let mut options = GmlOptions::new()
            .with_target_crs(self.scene.target_crs.clone())
            .with_extrusion_height(self.gml.extrusion_height)
            .with_layer_name(self.gml.layer_name.clone());
        if let Some(srs) = &self.gml.default_srs {
            options = options.with_default_srs(srs.clone());
        }
        if let Some(origin) = self.scene.origin() {
            options = options.with_origin(origin);
        }
        options
    }

    /// Default registry extended with the `[crs]` entries.
    pub fn crs_registry(&self) -> Result<CrsRegistry, ConfigError> {
        let mut registry = CrsRegistry::with_defaults();
        for (code, proj4) in &self.crs {
            registry.register_proj4(&format!("EPSG:{}", code), proj4)?;
        }
        Ok(registry)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.wms.timeout)
    }
}
