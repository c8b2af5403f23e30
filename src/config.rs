//! Configuration management for crabwatch
//!
//! All settings are fixed at startup: the file is read once, command-line
//! overrides are applied, and the result is validated before the pipeline
//! is built.

use crate::errors::WatchError;
use crate::recording::Container;
use crate::source::CapturePolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub source: SourceConfig,
    pub detection: DetectionConfig,
    pub recording: RecordingConfig,
    pub capture: CaptureConfig,
}

/// Frame source selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// `camera:<index>` or `file:<path.y4m>`
    pub selector: String,
    /// Requested camera resolution [width, height]
    pub resolution: [u32; 2],
    /// Requested camera frame rate, also the fallback when a source reports none
    pub fps: f64,
}

/// Change-mask and classifier parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Background model history depth in frames
    pub history: u32,
    /// Squared Mahalanobis distance for a pixel to match the background
    pub var_threshold: f32,
    /// Gaussian blur kernel size (odd)
    pub blur_kernel: u32,
    /// Regions with area at or below this value are ignored
    pub min_area: f64,
    /// Draw region boxes onto frames before they are written
    pub annotate: bool,
}

/// Segment recording parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Grace period after the last motion before a segment is closed
    pub motion_timeout_secs: f64,
    /// Capture root directory for segment files
    pub output_directory: String,
    /// Output container
    pub container: Container,
}

/// Capture/processing decoupling
///
/// `inline` reads frames on the processing thread. The buffered policies
/// move capture onto its own thread, which changes behavior: `drop_oldest`
/// can discard frames before they are processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub buffer: CapturePolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig {
                selector: "camera:0".to_string(),
                resolution: [640, 480],
                fps: 30.0,
            },
            detection: DetectionConfig {
                history: 100,
                var_threshold: 15.0,
                blur_kernel: 5,
                min_area: 200.0,
                annotate: true,
            },
            recording: RecordingConfig {
                motion_timeout_secs: 3.0,
                output_directory: "captures".to_string(),
                container: Container::default(),
            },
            capture: CaptureConfig {
                buffer: CapturePolicy::Inline,
            },
        }
    }
}

impl WatchConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, WatchError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| WatchError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: WatchConfig = toml::from_str(&contents)
            .map_err(|e| WatchError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), WatchError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    WatchError::ConfigError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| WatchError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| WatchError::ConfigError(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("crabwatch.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    pub fn motion_timeout(&self) -> Result<Duration, WatchError> {
        Duration::try_from_secs_f64(self.recording.motion_timeout_secs).map_err(|e| {
            WatchError::ConfigError(format!(
                "Motion timeout {}s is not a valid duration: {}",
                self.recording.motion_timeout_secs, e
            ))
        })
    }

    pub fn output_directory(&self) -> PathBuf {
        PathBuf::from(&self.recording.output_directory)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.source.selector.trim().is_empty() {
            return Err("Source selector must not be empty".to_string());
        }
        if self.source.resolution[0] == 0 || self.source.resolution[1] == 0 {
            return Err("Invalid source resolution".to_string());
        }
        if !(self.source.fps > 0.0 && self.source.fps <= 240.0) {
            return Err("Invalid source FPS (must be in (0, 240])".to_string());
        }

        if self.detection.history == 0 {
            return Err("Background history must be at least 1 frame".to_string());
        }
        if !(self.detection.var_threshold.is_finite() && self.detection.var_threshold > 0.0) {
            return Err("Variance threshold must be positive".to_string());
        }
        if self.detection.blur_kernel == 0 || self.detection.blur_kernel % 2 == 0 {
            return Err("Blur kernel size must be a positive odd number".to_string());
        }
        if !(self.detection.min_area.is_finite() && self.detection.min_area >= 0.0) {
            return Err("Minimum region area must be >= 0".to_string());
        }

        let timeout = self.recording.motion_timeout_secs;
        if !(timeout.is_finite() && timeout > 0.0) {
            return Err("Motion timeout must be > 0 seconds".to_string());
        }
        if Duration::try_from_secs_f64(timeout).is_err() {
            return Err("Motion timeout is too large".to_string());
        }
        if self.recording.output_directory.trim().is_empty() {
            return Err("Output directory must not be empty".to_string());
        }

        match self.capture.buffer {
            CapturePolicy::Inline => {}
            CapturePolicy::DropOldest { capacity } | CapturePolicy::Block { capacity } => {
                if capacity == 0 {
                    return Err("Capture buffer capacity must be at least 1".to_string());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WatchConfig::default();
        assert_eq!(config.detection.history, 100);
        assert_eq!(config.detection.min_area, 200.0);
        assert_eq!(config.motion_timeout().unwrap(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad_timeout = WatchConfig::default();
        bad_timeout.recording.motion_timeout_secs = 0.0;
        assert!(bad_timeout.validate().is_err());

        let mut huge_timeout = WatchConfig::default();
        huge_timeout.recording.motion_timeout_secs = 1e20;
        assert!(huge_timeout.validate().is_err());
        assert_eq!(huge_timeout.motion_timeout().unwrap_err().kind(), "config-error");

        let mut bad_kernel = WatchConfig::default();
        bad_kernel.detection.blur_kernel = 4;
        assert!(bad_kernel.validate().is_err());

        let mut bad_area = WatchConfig::default();
        bad_area.detection.min_area = -1.0;
        assert!(bad_area.validate().is_err());

        let mut zero_area = WatchConfig::default();
        zero_area.detection.min_area = 0.0;
        assert!(zero_area.validate().is_ok());

        let mut bad_buffer = WatchConfig::default();
        bad_buffer.capture.buffer = CapturePolicy::DropOldest { capacity: 0 };
        assert!(bad_buffer.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("nested").join("crabwatch.toml");

        let mut config = WatchConfig::default();
        config.recording.motion_timeout_secs = 5.5;
        config.recording.container = Container::Y4m;
        config.capture.buffer = CapturePolicy::Block { capacity: 4 };
        assert!(config.save_to_file(&config_path).is_ok());

        let loaded = WatchConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.recording.motion_timeout_secs, 5.5);
        assert_eq!(loaded.recording.container, Container::Y4m);
        assert!(matches!(
            loaded.capture.buffer,
            CapturePolicy::Block { capacity: 4 }
        ));
    }

    #[test]
    fn test_config_toml_format() {
        let config = WatchConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[source]"));
        assert!(toml_string.contains("[detection]"));
        assert!(toml_string.contains("[recording]"));
        assert!(toml_string.contains("motion_timeout_secs"));
        assert!(toml_string.contains("min_area"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = WatchConfig::load_from_file("nonexistent_crabwatch.toml");
        assert!(result.is_ok());
        assert_eq!(result.unwrap().detection.blur_kernel, 5);
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[source\nselector = ").unwrap();

        let err = WatchConfig::load_from_file(&path).unwrap_err();
        assert_eq!(err.kind(), "config-error");
    }
}
