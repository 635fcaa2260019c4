use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{
    DEFAULT_ACCEPTANCE_THRESHOLD, DEFAULT_ALERT_LABEL, DEFAULT_CROP_FACTOR,
    DEFAULT_MODEL_INPUT_SIZE, DEFAULT_PREVIEW_HEIGHT, DEFAULT_PREVIEW_WIDTH,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Pipeline settings resolved once per session; never re-read per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub preview_width: u32,
    pub preview_height: u32,
    pub crop_factor: f64,
    pub acceptance_threshold: f32,
    pub preserve_aspect: bool,
    pub model_input_size: u32,
    pub alert_label: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preview_width: DEFAULT_PREVIEW_WIDTH,
            preview_height: DEFAULT_PREVIEW_HEIGHT,
            crop_factor: DEFAULT_CROP_FACTOR,
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            preserve_aspect: false,
            model_input_size: DEFAULT_MODEL_INPUT_SIZE,
            alert_label: DEFAULT_ALERT_LABEL.to_string(),
        }
    }
}

impl PipelineConfig {
    /// `<config dir>/maskwatch/config.json`, when the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("maskwatch").join("config.json"))
    }

    /// Reads and validates a JSON config. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config at [`Self::default_path`], falling back to defaults
    /// when the file is absent or unusable.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path().filter(|p| p.exists()) else {
            return Self::default();
        };
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preview_width == 0 || self.preview_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "preview size must be positive, got {}x{}",
                self.preview_width, self.preview_height
            )));
        }
        if !(self.crop_factor > 0.0 && self.crop_factor <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "crop_factor must be in (0, 1], got {}",
                self.crop_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.acceptance_threshold) {
            return Err(ConfigError::Invalid(format!(
                "acceptance_threshold must be in [0, 1], got {}",
                self.acceptance_threshold
            )));
        }
        if self.model_input_size == 0 {
            return Err(ConfigError::Invalid(
                "model_input_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!((config.preview_width, config.preview_height), (800, 600));
        assert_relative_eq!(config.crop_factor, 0.5);
        assert_relative_eq!(config.acceptance_threshold, 0.6);
        assert!(!config.preserve_aspect);
        assert_eq!(config.model_input_size, 224);
        assert_eq!(config.alert_label, "no_mask");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = PipelineConfig {
            crop_factor: 0.25,
            preserve_aspect: true,
            ..PipelineConfig::default()
        };

        config.save(&path).unwrap();
        let loaded = PipelineConfig::load(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "acceptance_threshold": 0.75 }"#).unwrap();

        let loaded = PipelineConfig::load(&path).unwrap();

        assert_relative_eq!(loaded.acceptance_threshold, 0.75);
        assert_eq!(loaded.model_input_size, 224);
    }

    #[test]
    fn test_load_malformed_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            PipelineConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = PipelineConfig::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "crop_factor": 0.0 }"#).unwrap();

        assert!(matches!(
            PipelineConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[rstest]
    #[case::zero_preview(PipelineConfig { preview_width: 0, ..PipelineConfig::default() })]
    #[case::crop_above_one(PipelineConfig { crop_factor: 1.5, ..PipelineConfig::default() })]
    #[case::crop_nan(PipelineConfig { crop_factor: f64::NAN, ..PipelineConfig::default() })]
    #[case::threshold_above_one(PipelineConfig { acceptance_threshold: 1.1, ..PipelineConfig::default() })]
    #[case::zero_input(PipelineConfig { model_input_size: 0, ..PipelineConfig::default() })]
    fn test_validate_rejects(#[case] config: PipelineConfig) {
        assert!(config.validate().is_err());
    }
}
