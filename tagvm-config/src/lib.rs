//! Shared configuration loader for tagvm.
//!
//! `defaults/tagvm.default.toml` is embedded into every binary so that docs and
//! runtime behavior stay in sync. Hosts layer user-specific files on top of
//! those defaults via [`Loader`] before deserializing into [`TagvmConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../defaults/tagvm.default.toml");

/// Top-level configuration consumed by tagvm hosts.
#[derive(Debug, Clone, Deserialize)]
pub struct TagvmConfig {
    pub engine: EngineConfig,
    pub output: OutputConfig,
    pub log: LogConfig,
}

/// Knobs handed to the evaluator.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub max_frame_depth: usize,
    pub allow_gaps: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Tags,
    Json,
    Yaml,
    Treeviz,
}

impl OutputFormat {
    /// Registry name of the formatter for this output format.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Tags => "tags",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Treeviz => "treeviz",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

/// Builds a [`TagvmConfig`] from layered sources, later layers winning.
///
/// The `tagvm` binary layers the embedded defaults, then the file named by `--config`,
/// then flag overrides such as `--format` (applied as `output.format`).
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with `defaults/tagvm.default.toml`.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a TOML file over the defaults, as `--config` does. Missing files fail `build`.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer a TOML file that may not exist, such as a per-user config.
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Override one dotted key (`output.format`, `engine.allow_gaps`) above every file.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Merge the layers and deserialize, failing on unknown formats or malformed files.
    pub fn build(self) -> Result<TagvmConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<TagvmConfig, ConfigError> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_default_config() {
        let config = load_defaults().expect("defaults to deserialize");
        assert_eq!(config.engine.max_frame_depth, 4096);
        assert!(config.engine.allow_gaps);
        assert_eq!(config.output.format, OutputFormat::Tags);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn supports_overrides() {
        let config = Loader::new()
            .set_override("output.format", "yaml")
            .expect("override to apply")
            .set_override("engine.max_frame_depth", 12i64)
            .expect("override to apply")
            .build()
            .expect("config to build");
        assert_eq!(config.output.format, OutputFormat::Yaml);
        assert_eq!(config.engine.max_frame_depth, 12);
    }

    #[test]
    fn missing_optional_file_is_ignored() {
        let config = Loader::new()
            .with_optional_file("/definitely/not/here/tagvm.toml")
            .build()
            .expect("optional file to be skipped");
        assert_eq!(config.output.format.as_str(), "tags");
    }

    #[test]
    fn user_file_layers_over_defaults() {
        let dir = std::env::temp_dir().join(format!("tagvm-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("user.toml");
        let mut file = std::fs::File::create(&path).expect("create user file");
        writeln!(file, "[engine]\nallow_gaps = false").expect("write user file");

        let config = Loader::new()
            .with_file(&path)
            .build()
            .expect("user file to load");
        assert!(!config.engine.allow_gaps);
        assert_eq!(config.engine.max_frame_depth, 4096);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
