//! Run configuration loaded from TOML
//!
//! ```toml
//! sources = ["topologies/", "extra/edge.topo"]
//! extension = "topo"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Extension of topology source files when none is configured
pub const DEFAULT_EXTENSION: &str = "topo";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopologyConfig {
    /// Files or directories holding topology sources
    pub sources: Vec<PathBuf>,
    /// File extension scanned for in directories, without the dot
    pub extension: String,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl TopologyConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_sources(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.sources.extend(paths);
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = TopologyConfig::from_str("").unwrap();
        assert_eq!(config, TopologyConfig::default());
        assert_eq!(config.extension, "topo");
    }

    #[test]
    fn test_sources_and_extension() {
        let config = TopologyConfig::from_str(
            r#"
sources = ["topologies/", "extra/edge.stc"]
extension = "stc"
"#,
        )
        .unwrap();
        assert_eq!(
            config.sources,
            vec![PathBuf::from("topologies/"), PathBuf::from("extra/edge.stc")]
        );
        assert_eq!(config.extension, "stc");
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            TopologyConfig::from_str("source = []"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_cli_overrides() {
        let config = TopologyConfig::default()
            .with_sources([PathBuf::from("a.topo")])
            .with_extension(".dsl");
        assert_eq!(config.sources, vec![PathBuf::from("a.topo")]);
        assert_eq!(config.extension, "dsl");
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            TopologyConfig::from_file(Path::new("/nonexistent/topo.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
