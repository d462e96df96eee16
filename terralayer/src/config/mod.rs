//! User configuration stored as INI at `<config dir>/terralayer/config.ini`.
//!
//! ```ini
//! [scene]
//! target_crs = EPSG:25831
//!
//! [wms]
//! mode = grid
//! tile_size = 500
//!
//! [crs]
//! 2062 = +proj=utm +zone=30 +ellps=intl +units=m
//! ```
//!
//! Every key has a default, so a missing file or section is not an error.

mod error;
mod file;
mod keys;

pub use error::ConfigError;
pub use file::{
    config_directory, config_file_path, ConfigFile, GmlSettings, LoggingSettings, SceneSettings,
    WmsSettings, CRS_SECTION, DEFAULT_LOG_LEVEL,
};
pub use keys::ConfigKey;
