//! Project configuration (ucharm.toml)
//!
//! Optional. Every field has a default, and command-line flags win over
//! anything set here.
//!
//! ```toml
//! [build]
//! interpreter = "vendor/micropython"
//! stub = "target/release/ucharm-stub"
//! output = "dist/app"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = "ucharm.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read ucharm.toml: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse ucharm.toml: {0}")]
    ParseError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub build: BuildConfig,
}

/// `[build]` table
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Interpreter executable to embed
    pub interpreter: Option<PathBuf>,

    /// Loader stub to prepend
    pub stub: Option<PathBuf>,

    /// Output artifact path
    pub output: Option<PathBuf>,
}

impl ProjectConfig {
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `path`, resolving relative paths against its directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_str(&content)?;
        if let Some(base) = path.parent() {
            config.build.rebase(base);
        }
        Ok(config)
    }

    /// Load `dir/ucharm.toml`, or the defaults if there is none.
    pub fn load_optional(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        tracing::debug!(path = %path.display(), "loading config");
        Self::from_file(&path)
    }
}

impl BuildConfig {
    fn rebase(&mut self, base: &Path) {
        for path in [&mut self.interpreter, &mut self.stub, &mut self.output]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = ProjectConfig::from_str("").unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn test_build_section() {
        let config = ProjectConfig::from_str(
            r#"
            [build]
            interpreter = "/opt/micropython"
            output = "dist/app"
            "#,
        )
        .unwrap();
        assert_eq!(config.build.interpreter, Some(PathBuf::from("/opt/micropython")));
        assert_eq!(config.build.output, Some(PathBuf::from("dist/app")));
        assert_eq!(config.build.stub, None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ProjectConfig::from_str("[build]\ncompress = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_relative_paths_rebased() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[build]\ninterpreter = \"bin/micropython\"\nstub = \"/abs/stub\"\n",
        )
        .unwrap();

        let config = ProjectConfig::load_optional(dir.path()).unwrap();
        assert_eq!(config.build.interpreter, Some(dir.path().join("bin/micropython")));
        assert_eq!(config.build.stub, Some(PathBuf::from("/abs/stub")));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ProjectConfig::load_optional(dir.path()).unwrap(), ProjectConfig::default());
    }
}
