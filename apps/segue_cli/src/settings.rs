//! 配置文件

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use segue_transport::TransportConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub transport: TransportConfig,
}

impl Settings {
    /// 没有指定文件时使用默认值
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_tables() {
        let settings = Settings::parse(
            r#"
            [transport]
            volume = 0.5

            [transport.player]
            buffer_size = 4096
            "#,
        )
        .unwrap();

        assert_eq!(settings.transport.volume, 0.5);
        assert_eq!(settings.transport.player.buffer_size, 4096);
        assert_eq!(settings.transport.player.almost_ended_secs, 2.0);
    }

    #[test]
    fn test_missing_path_is_default() {
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }

    #[test]
    fn test_unreadable_file_is_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/segue.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
