//! Dotted `section.key` access to individual settings.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ConfigFile};

/// One setting in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    EncoderCodec,
    EncoderAlpha,
    EncoderStrategy,
    EncoderQuality,
    EncoderSecondStage,
    EncoderDeflateLevel,
    PipelineMaxConcurrent,
    PipelineWorkerThreads,
    PipelineSlicing,
    PipelineSimd,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// Every key, grouped by section in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::EncoderCodec,
            ConfigKey::EncoderAlpha,
            ConfigKey::EncoderStrategy,
            ConfigKey::EncoderQuality,
            ConfigKey::EncoderSecondStage,
            ConfigKey::EncoderDeflateLevel,
            ConfigKey::PipelineMaxConcurrent,
            ConfigKey::PipelineWorkerThreads,
            ConfigKey::PipelineSlicing,
            ConfigKey::PipelineSimd,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingDirectory,
        ]
    }

    pub fn section(self) -> &'static str {
        match self {
            ConfigKey::EncoderCodec
            | ConfigKey::EncoderAlpha
            | ConfigKey::EncoderStrategy
            | ConfigKey::EncoderQuality
            | ConfigKey::EncoderSecondStage
            | ConfigKey::EncoderDeflateLevel => "encoder",
            ConfigKey::PipelineMaxConcurrent
            | ConfigKey::PipelineWorkerThreads
            | ConfigKey::PipelineSlicing
            | ConfigKey::PipelineSimd => "pipeline",
            ConfigKey::LoggingLevel | ConfigKey::LoggingDirectory => "logging",
        }
    }

    pub fn key_name(self) -> &'static str {
        match self {
            ConfigKey::EncoderCodec => "codec",
            ConfigKey::EncoderAlpha => "alpha",
            ConfigKey::EncoderStrategy => "strategy",
            ConfigKey::EncoderQuality => "quality",
            ConfigKey::EncoderSecondStage => "second_stage",
            ConfigKey::EncoderDeflateLevel => "deflate_level",
            ConfigKey::PipelineMaxConcurrent => "max_concurrent",
            ConfigKey::PipelineWorkerThreads => "worker_threads",
            ConfigKey::PipelineSlicing => "slicing",
            ConfigKey::PipelineSimd => "simd",
            ConfigKey::LoggingLevel => "level",
            ConfigKey::LoggingDirectory => "directory",
        }
    }

    /// `section.key`.
    pub fn name(self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Values `set` accepts, for help output.
    pub fn allowed_values(self) -> &'static str {
        match self {
            ConfigKey::EncoderCodec => "dxt | ycocg",
            ConfigKey::EncoderStrategy => "gpu | vq | ycocg",
            ConfigKey::EncoderQuality => "fast | normal | high",
            ConfigKey::EncoderSecondStage => "stored | deflate",
            ConfigKey::EncoderDeflateLevel => "0-9",
            ConfigKey::PipelineMaxConcurrent => "1 or more",
            ConfigKey::PipelineWorkerThreads => "0 (one per core) or a thread count",
            ConfigKey::EncoderAlpha | ConfigKey::PipelineSlicing | ConfigKey::PipelineSimd => {
                "true | false"
            }
            ConfigKey::LoggingLevel => "trace | debug | info | warn | error, or a filter directive",
            ConfigKey::LoggingDirectory => "a directory, or empty for stderr only",
        }
    }

    /// Restores the built-in default.
    pub fn reset(self, config: &mut ConfigFile) {
        let defaults = ConfigFile::default();
        match self {
            ConfigKey::EncoderCodec => config.encoder.codec = defaults.encoder.codec,
            ConfigKey::EncoderAlpha => config.encoder.alpha = defaults.encoder.alpha,
            ConfigKey::EncoderStrategy => config.encoder.strategy = defaults.encoder.strategy,
            ConfigKey::EncoderQuality => config.encoder.quality = defaults.encoder.quality,
            ConfigKey::EncoderSecondStage => config.encoder.second_stage = defaults.encoder.second_stage,
            ConfigKey::EncoderDeflateLevel => config.encoder.deflate_level = defaults.encoder.deflate_level,
            ConfigKey::PipelineMaxConcurrent => config.pipeline.max_concurrent = defaults.pipeline.max_concurrent,
            ConfigKey::PipelineWorkerThreads => config.pipeline.worker_threads = defaults.pipeline.worker_threads,
            ConfigKey::PipelineSlicing => config.pipeline.slicing = defaults.pipeline.slicing,
            ConfigKey::PipelineSimd => config.pipeline.simd = defaults.pipeline.simd,
            ConfigKey::LoggingLevel => config.logging.level = defaults.logging.level,
            ConfigKey::LoggingDirectory => config.logging.directory = defaults.logging.directory,
        }
    }

    /// True when `config` holds something other than the default.
    pub fn is_overridden(self, config: &ConfigFile) -> bool {
        self.get(config) != self.get(&ConfigFile::default())
    }

    /// Current value as written to the file.
    pub fn get(self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::EncoderCodec => config.encoder.codec.to_string(),
            ConfigKey::EncoderAlpha => config.encoder.alpha.to_string(),
            ConfigKey::EncoderStrategy => config.encoder.strategy.to_string(),
            ConfigKey::EncoderQuality => config.encoder.quality.to_string(),
            ConfigKey::EncoderSecondStage => config.encoder.second_stage.to_string(),
            ConfigKey::EncoderDeflateLevel => config.encoder.deflate_level.to_string(),
            ConfigKey::PipelineMaxConcurrent => config.pipeline.max_concurrent.to_string(),
            ConfigKey::PipelineWorkerThreads => config.pipeline.worker_threads.to_string(),
            ConfigKey::PipelineSlicing => config.pipeline.slicing.to_string(),
            ConfigKey::PipelineSimd => config.pipeline.simd.to_string(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Parses `value` and stores it.
    pub fn set(self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::EncoderCodec => config.encoder.codec = self.parse(value)?,
            ConfigKey::EncoderAlpha => config.encoder.alpha = self.parse_bool(value)?,
            ConfigKey::EncoderStrategy => config.encoder.strategy = self.parse(value)?,
            ConfigKey::EncoderQuality => config.encoder.quality = self.parse(value)?,
            ConfigKey::EncoderSecondStage => config.encoder.second_stage = self.parse(value)?,
            ConfigKey::EncoderDeflateLevel => {
                let level: u32 = self.parse(value)?;
                if level > 9 {
                    return Err(self.invalid(value, "level must be 0 to 9"));
                }
                config.encoder.deflate_level = level;
            }
            ConfigKey::PipelineMaxConcurrent => {
                let max: usize = self.parse(value)?;
                if max == 0 {
                    return Err(self.invalid(value, "must be at least 1"));
                }
                config.pipeline.max_concurrent = max;
            }
            ConfigKey::PipelineWorkerThreads => config.pipeline.worker_threads = self.parse(value)?,
            ConfigKey::PipelineSlicing => config.pipeline.slicing = self.parse_bool(value)?,
            ConfigKey::PipelineSimd => config.pipeline.simd = self.parse_bool(value)?,
            ConfigKey::LoggingLevel => {
                if value.is_empty() {
                    return Err(self.invalid(value, "level cannot be empty"));
                }
                config.logging.level = value.to_string();
            }
            ConfigKey::LoggingDirectory => {
                config.logging.directory = (!value.is_empty()).then(|| PathBuf::from(value));
            }
        }
        Ok(())
    }

    fn parse<T>(self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        value.parse().map_err(|e: T::Err| self.invalid(value, &e.to_string()))
    }

    fn parse_bool(self, value: &str) -> Result<bool, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid(value, "expected true or false")),
        }
    }

    fn invalid(self, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}
