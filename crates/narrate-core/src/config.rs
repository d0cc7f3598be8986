//! Narration settings as handed over by the command-line front end.
//!
//! The front end collects backend selection, voice, rate, gain and cache
//! location; this module gives those a serde shape, loads them from a
//! TOML file, and converts them into the per-backend configuration
//! structs consumed at construction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backend::neural::NeuralConfig;
use crate::backend::system::SystemConfig;
use crate::backend::{BackendKind, SpeechRate};
use crate::error::{NarrateError, NarrateResult};

/// Pipeline inputs supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationSettings {
    /// Which backend kind to construct
    pub backend: BackendKind,
    /// Voice id, `None` keeps the backend default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// System rate in words per minute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words_per_minute: Option<u32>,
    /// Neural speed multiplier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    /// System output gain in `[0.0, 1.0]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain: Option<f32>,
    /// Asset cache directory override (neural backend)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::System,
            voice: None,
            words_per_minute: None,
            speed: None,
            gain: None,
            cache_dir: None,
        }
    }
}

impl NarrationSettings {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::Io`] when the file cannot be read and
    /// [`NarrateError::Validation`] when it does not parse.
    pub fn from_toml_file(path: &Path) -> NarrateResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|err| {
            NarrateError::validation(format!(
                "invalid settings file {}: {err}",
                path.display()
            ))
        })
    }

    /// Configuration for constructing the system backend.
    #[must_use]
    pub fn system_config(&self) -> SystemConfig {
        let mut config = SystemConfig::default();
        if let Some(voice) = &self.voice {
            config.voice = Some(voice.clone());
        }
        if let Some(words_per_minute) = self.words_per_minute {
            config.words_per_minute = words_per_minute;
        }
        if let Some(gain) = self.gain {
            config.gain = gain;
        }
        config
    }

    /// Configuration for constructing the neural backend.
    #[must_use]
    pub fn neural_config(&self) -> NeuralConfig {
        let mut config = NeuralConfig::default();
        if let Some(voice) = &self.voice {
            config.voice = voice.clone();
        }
        if let Some(speed) = self.speed {
            config.speed = speed;
        }
        config.cache_dir = self.cache_dir.clone();
        config
    }

    /// The configured rate in the selected backend's unit, if any.
    #[must_use]
    pub fn rate(&self) -> Option<SpeechRate> {
        match self.backend {
            BackendKind::System => self.words_per_minute.map(SpeechRate::WordsPerMinute),
            BackendKind::Neural => self.speed.map(SpeechRate::Multiplier),
        }
    }
}
