use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Parameters of the image enhancement stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceSettings {
    pub contrast_factor: f32,
    pub contrast_midpoint: f32,
    pub brightness_factor: f32,
    /// JPEG quality used when re-encoding between stages (1–100).
    pub jpeg_quality: u8,
}

impl Default for EnhanceSettings {
    fn default() -> Self {
        Self {
            contrast_factor: 1.5,
            contrast_midpoint: 128.0,
            brightness_factor: 1.1,
            jpeg_quality: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerSettings {
    /// Tesseract language string.
    pub language: String,
    /// Directory containing `*.traineddata`; `None` uses the system default.
    pub tessdata_path: Option<String>,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self { language: "jpn+eng".to_string(), tessdata_path: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Overrides the platform data directory when set.
    pub data_dir: Option<PathBuf>,
    pub enhance: EnhanceSettings,
    pub recognizer: RecognizerSettings,
}

impl WalletConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: WalletConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let e = &self.enhance;
        if !(1..=100).contains(&e.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "enhance.jpeg_quality must be 1-100, got {}",
                e.jpeg_quality
            )));
        }
        if e.brightness_factor <= 0.0 || e.contrast_factor <= 0.0 {
            return Err(ConfigError::Invalid(
                "enhance factors must be positive".to_string(),
            ));
        }
        if self.recognizer.language.trim().is_empty() {
            return Err(ConfigError::Invalid("recognizer.language is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let c = WalletConfig::from_toml("").unwrap();
        assert_eq!(c, WalletConfig::default());
        assert_eq!(c.enhance.contrast_factor, 1.5);
        assert_eq!(c.enhance.brightness_factor, 1.1);
        assert_eq!(c.enhance.jpeg_quality, 90);
        assert_eq!(c.recognizer.language, "jpn+eng");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let c = WalletConfig::from_toml(
            r#"
            data_dir = "/tmp/wallet"

            [enhance]
            brightness_factor = 1.2

            [recognizer]
            tessdata_path = "/usr/share/tessdata"
            "#,
        )
        .unwrap();
        assert_eq!(c.data_dir, Some(PathBuf::from("/tmp/wallet")));
        assert_eq!(c.enhance.brightness_factor, 1.2);
        assert_eq!(c.enhance.contrast_midpoint, 128.0);
        assert_eq!(c.recognizer.language, "jpn+eng");
        assert_eq!(c.recognizer.tessdata_path.as_deref(), Some("/usr/share/tessdata"));
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let err = WalletConfig::from_toml("[enhance]\njpeg_quality = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            WalletConfig::from_toml("enhance = [").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let c = WalletConfig::load_or_default(Path::new("/nonexistent/cardwallet.toml")).unwrap();
        assert_eq!(c, WalletConfig::default());
    }

    #[test]
    fn loads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[enhance]\njpeg_quality = 75\n\n[recognizer]\nlanguage = \"eng\"\n")
            .unwrap();

        let c = WalletConfig::load_or_default(&path).unwrap();
        assert_eq!(c.enhance.jpeg_quality, 75);
        assert_eq!(c.enhance.contrast_factor, 1.5);
        assert_eq!(c.recognizer.language, "eng");
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[recognizer]\nlanguage = \"  \"\n").unwrap();

        assert!(matches!(
            WalletConfig::load_or_default(&path).unwrap_err(),
            ConfigError::Invalid(_)
        ));
    }
}
