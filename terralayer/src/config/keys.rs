//! Typed access to individual settings by `section.key` name.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::error::ConfigError;
use super::file::ConfigFile;
use crate::crs::normalize_srs;
use crate::wms::StreamMode;

/// One configurable setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    SceneTargetCrs,
    SceneOriginX,
    SceneOriginY,
    SceneOriginZ,

    WmsMode,
    WmsPixelsPerUnit,
    WmsUpdateThreshold,
    WmsZoomInThreshold,
    WmsZoomOutThreshold,
    WmsMinTilePx,
    WmsMaxTilePx,
    WmsTileSize,
    WmsTilePx,
    WmsViewRadius,
    WmsTimeout,
    WmsMinUpdateIntervalMs,

    GmlExtrusionHeight,
    GmlDefaultSrs,
    GmlLayerName,

    LoggingFile,
    LoggingLevel,
}

const ALL_KEYS: [ConfigKey; 21] = [
    ConfigKey::SceneTargetCrs,
    ConfigKey::SceneOriginX,
    ConfigKey::SceneOriginY,
    ConfigKey::SceneOriginZ,
    ConfigKey::WmsMode,
    ConfigKey::WmsPixelsPerUnit,
    ConfigKey::WmsUpdateThreshold,
    ConfigKey::WmsZoomInThreshold,
    ConfigKey::WmsZoomOutThreshold,
    ConfigKey::WmsMinTilePx,
    ConfigKey::WmsMaxTilePx,
    ConfigKey::WmsTileSize,
    ConfigKey::WmsTilePx,
    ConfigKey::WmsViewRadius,
    ConfigKey::WmsTimeout,
    ConfigKey::WmsMinUpdateIntervalMs,
    ConfigKey::GmlExtrusionHeight,
    ConfigKey::GmlDefaultSrs,
    ConfigKey::GmlLayerName,
    ConfigKey::LoggingFile,
    ConfigKey::LoggingLevel,
];

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl ConfigKey {
    /// Every key, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &ALL_KEYS
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    pub fn section(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            SceneTargetCrs | SceneOriginX | SceneOriginY | SceneOriginZ => "scene",
            WmsMode | WmsPixelsPerUnit | WmsUpdateThreshold | WmsZoomInThreshold
            | WmsZoomOutThreshold | WmsMinTilePx | WmsMaxTilePx | WmsTileSize | WmsTilePx
            | WmsViewRadius | WmsTimeout | WmsMinUpdateIntervalMs => "wms",
            GmlExtrusionHeight | GmlDefaultSrs | GmlLayerName => "gml",
            LoggingFile | LoggingLevel => "logging",
        }
    }

    pub fn key_name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            SceneTargetCrs => "target_crs",
            SceneOriginX => "origin_x",
            SceneOriginY => "origin_y",
            SceneOriginZ => "origin_z",
            WmsMode => "mode",
            WmsPixelsPerUnit => "pixels_per_unit",
            WmsUpdateThreshold => "update_threshold",
            WmsZoomInThreshold => "zoom_in_threshold",
            WmsZoomOutThreshold => "zoom_out_threshold",
            WmsMinTilePx => "min_tile_px",
            WmsMaxTilePx => "max_tile_px",
            WmsTileSize => "tile_size",
            WmsTilePx => "tile_px",
            WmsViewRadius => "view_radius",
            WmsTimeout => "timeout",
            WmsMinUpdateIntervalMs => "min_update_interval_ms",
            GmlExtrusionHeight => "extrusion_height",
            GmlDefaultSrs => "default_srs",
            GmlLayerName => "layer_name",
            LoggingFile => "file",
            LoggingLevel => "level",
        }
    }

    /// Current value as written to the file; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        let optional = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        match self {
            SceneTargetCrs => config.scene.target_crs.clone(),
            SceneOriginX => optional(config.scene.origin_x),
            SceneOriginY => optional(config.scene.origin_y),
            SceneOriginZ => optional(config.scene.origin_z),
            WmsMode => config.wms.mode.to_string(),
            WmsPixelsPerUnit => config.wms.pixels_per_unit.to_string(),
            WmsUpdateThreshold => config.wms.update_threshold.to_string(),
            WmsZoomInThreshold => config.wms.zoom_in_threshold.to_string(),
            WmsZoomOutThreshold => config.wms.zoom_out_threshold.to_string(),
            WmsMinTilePx => config.wms.min_tile_px.to_string(),
            WmsMaxTilePx => config.wms.max_tile_px.to_string(),
            WmsTileSize => config.wms.tile_size.to_string(),
            WmsTilePx => config.wms.tile_px.to_string(),
            WmsViewRadius => config.wms.view_radius.to_string(),
            WmsTimeout => config.wms.timeout.to_string(),
            WmsMinUpdateIntervalMs => config.wms.min_update_interval_ms.to_string(),
            GmlExtrusionHeight => config.gml.extrusion_height.to_string(),
            GmlDefaultSrs => config.gml.default_srs.clone().unwrap_or_default(),
            GmlLayerName => config.gml.layer_name.clone(),
            LoggingFile => config
                .logging
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            LoggingLevel => config.logging.level.clone(),
        }
    }

    /// Validates `value` and stores it.
    ///
    /// An empty value clears optional settings.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let value = value.trim();
        match self {
            SceneTargetCrs => config.scene.target_crs = self.parse_srs(value)?,
            SceneOriginX => config.scene.origin_x = self.parse_optional(value)?,
            SceneOriginY => config.scene.origin_y = self.parse_optional(value)?,
            SceneOriginZ => config.scene.origin_z = self.parse_optional(value)?,
            WmsMode => {
                config.wms.mode = value
                    .parse::<StreamMode>()
                    .map_err(|reason| ConfigError::invalid(&self.name(), value, reason))?
            }
            WmsPixelsPerUnit => config.wms.pixels_per_unit = self.parse_positive(value)?,
            WmsUpdateThreshold => config.wms.update_threshold = self.parse_positive(value)?,
            WmsZoomInThreshold => config.wms.zoom_in_threshold = self.parse_positive(value)?,
            WmsZoomOutThreshold => config.wms.zoom_out_threshold = self.parse_positive(value)?,
            WmsMinTilePx => config.wms.min_tile_px = self.parse_number(value)?,
            WmsMaxTilePx => config.wms.max_tile_px = self.parse_number(value)?,
            WmsTileSize => config.wms.tile_size = self.parse_positive(value)?,
            WmsTilePx => config.wms.tile_px = self.parse_number(value)?,
            WmsViewRadius => config.wms.view_radius = self.parse_number(value)?,
            WmsTimeout => config.wms.timeout = self.parse_number(value)?,
            WmsMinUpdateIntervalMs => config.wms.min_update_interval_ms = self.parse_number(value)?,
            GmlExtrusionHeight => config.gml.extrusion_height = self.parse_positive(value)?,
            GmlDefaultSrs => {
                config.gml.default_srs = if value.is_empty() {
                    None
                } else {
                    Some(self.parse_srs(value)?)
                }
            }
            GmlLayerName => {
                if value.is_empty() {
                    return Err(ConfigError::invalid(&self.name(), value, "must not be empty"));
                }
                config.gml.layer_name = value.to_string();
            }
            LoggingFile => {
                config.logging.file = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            LoggingLevel => {
                let level = value.to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(ConfigError::invalid(
                        &self.name(),
                        value,
                        format!("expected one of {}", LOG_LEVELS.join(", ")),
                    ));
                }
                config.logging.level = level;
            }
        }
        Ok(())
    }

    fn parse_number<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        value
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(&self.name(), value, e))
    }

    fn parse_positive(&self, value: &str) -> Result<f64, ConfigError> {
        let parsed: f64 = self.parse_number(value)?;
        if !parsed.is_finite() || parsed <= 0.0 {
            return Err(ConfigError::invalid(&self.name(), value, "must be a positive number"));
        }
        Ok(parsed)
    }

    fn parse_optional(&self, value: &str) -> Result<Option<f64>, ConfigError> {
        if value.is_empty() {
            return Ok(None);
        }
        let parsed: f64 = self.parse_number(value)?;
        if !parsed.is_finite() {
            return Err(ConfigError::invalid(&self.name(), value, "must be finite"));
        }
        Ok(Some(parsed))
    }

    fn parse_srs(&self, value: &str) -> Result<String, ConfigError> {
        let normalized = normalize_srs(value);
        if !normalized.starts_with("EPSG:") {
            return Err(ConfigError::invalid(&self.name(), value, "expected an EPSG identifier"));
        }
        Ok(normalized)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}
