//! Persistent settings.
//!
//! Settings live in an INI file at `<config dir>/texblock/config.ini`:
//!
//! ```ini
//! [encoder]
//! codec = ycocg
//! alpha = false
//! strategy = vq
//! quality = normal
//! second_stage = deflate
//! deflate_level = 6
//!
//! [pipeline]
//! max_concurrent = 8
//! worker_threads = 0
//! slicing = true
//! simd = true
//!
//! [logging]
//! level = info
//! directory =
//! ```
//!
//! Missing keys keep their defaults; `worker_threads = 0` means one per core.

mod keys;

pub use keys::ConfigKey;

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use crate::frame::{Deflate, StageKind};
use crate::session::{default_worker_threads, CodecKind, EncoderConfig, DEFAULT_MAX_CONCURRENT};
use crate::strategy::{Quality, StrategyKind};

/// Errors reading or writing the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("No configuration directory on this platform")]
    NoConfigDir,
}

/// `[encoder]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    pub codec: CodecKind,
    pub alpha: bool,
    pub strategy: StrategyKind,
    pub quality: Quality,
    pub second_stage: StageKind,
    pub deflate_level: u32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            codec: CodecKind::YCoCg,
            alpha: false,
            strategy: StrategyKind::VectorQuantization,
            quality: Quality::default(),
            second_stage: StageKind::default(),
            deflate_level: Deflate::DEFAULT_LEVEL,
        }
    }
}

/// `[pipeline]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub max_concurrent: usize,
    /// 0 picks one worker per core.
    pub worker_threads: usize,
    pub slicing: bool,
    pub simd: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            worker_threads: 0,
            slicing: true,
            simd: true,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Directory for a daily log file; stderr only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// Everything the settings file holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub encoder: EncoderSettings,
    pub pipeline: PipelineSettings,
    pub logging: LoggingSettings,
}

/// Default location of the settings file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("texblock")
        .join("config.ini")
}

impl ConfigFile {
    /// Loads the default file, or defaults when it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|s| s.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Writes to the default location, creating its directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini.write_to_file(path).map_err(write_err)
    }

    /// Resolved worker count.
    pub fn worker_threads(&self) -> usize {
        match self.pipeline.worker_threads {
            0 => default_worker_threads(),
            n => n,
        }
    }

    /// Encoder settings for a stream of `width`×`height` frames.
    pub fn to_encoder_config(&self, width: u32, height: u32) -> EncoderConfig {
        let e = &self.encoder;
        EncoderConfig::new(e.codec, width, height)
            .with_alpha(e.alpha)
            .with_strategy(e.strategy)
            .with_quality(e.quality)
            .with_second_stage(e.second_stage, e.deflate_level)
            .with_max_concurrent(self.pipeline.max_concurrent)
            .with_worker_threads(self.worker_threads())
            .with_slicing(self.pipeline.slicing)
            .with_simd(self.pipeline.simd)
    }
}
