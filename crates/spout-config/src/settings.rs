use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON formatted logs
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Defaults, then `<config_dir>/spout.yaml`, then `SPOUT__*` variables
    /// (e.g. `SPOUT__LOGGING__LEVEL=debug`)
    pub fn load(config_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_dir = config_dir.as_ref();
        let s = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(
                config::File::with_name(&config_dir.join("spout.yaml").to_string_lossy())
                    .required(false),
            )
            .add_source(config::Environment::with_prefix("SPOUT").separator("__"))
            .build()?;

        let settings = s.try_deserialize()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("spout-settings-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = temp_dir();
        let settings = Settings::load(&dir).unwrap();

        assert_eq!(settings.logging.level, "info");
        assert!(!settings.logging.json);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = temp_dir();
        std::fs::write(dir.join("spout.yaml"), "logging:\n  json: true\n").unwrap();

        let settings = Settings::load(&dir).unwrap();

        assert!(settings.logging.json);
        assert_eq!(settings.logging.level, "info");

        std::fs::remove_dir_all(dir).unwrap();
    }
}
