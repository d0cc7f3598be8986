//! The synthesis capability surface and its two backend variants.
//!
//! A process constructs exactly one backend kind up front and drives it
//! through the [`SynthesisBackend`] trait; batch orchestration and
//! duration estimation never look behind the trait, so further backend
//! kinds slot in without touching them.

pub mod neural;
pub mod system;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::Segment;
use crate::duration;
use crate::error::{NarrateError, NarrateResult};
use crate::voice_catalog::VoiceDescriptor;
use crate::MAX_TEXT_LENGTH;

/// Extension of the canonical waveform container.
pub const CANONICAL_EXTENSION: &str = "wav";

/// The available backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Synchronous OS speech driver
    System,
    /// Offline neural vocoder
    Neural,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Neural => write!(f, "neural"),
        }
    }
}

/// Speech rate in the unit of the backend it is meant for.
///
/// Handing a rate in the wrong unit to a backend is a validation error,
/// not a silent conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeechRate {
    /// Words per minute, the system driver's unit
    WordsPerMinute(u32),
    /// Baseline-relative multiplier, the neural vocoder's unit
    Multiplier(f32),
}

/// A produced audio file: fully written and closed before it is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOutput {
    /// Path of the written file, always with the canonical extension
    pub path: PathBuf,
    /// Size of the file in bytes
    pub bytes: u64,
}

/// One narration call's worth of caller input.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationRequest {
    /// Normalized narration text
    pub text: String,
    /// Target voice id, `None` keeps the backend's current voice
    pub voice: Option<String>,
    /// Speech rate in the backend's unit
    pub rate: Option<SpeechRate>,
    /// Output gain in `[0.0, 1.0]`; only the system backend honors it
    pub gain: Option<f32>,
}

impl NarrationRequest {
    /// Create a request for the given text with no overrides.
    #[must_use]
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            voice: None,
            rate: None,
            gain: None,
        }
    }

    /// Set the target voice id
    #[must_use]
    pub fn with_voice<S: Into<String>>(mut self, voice: S) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Set the speech rate
    #[must_use]
    pub fn with_rate(mut self, rate: SpeechRate) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Set the output gain
    #[must_use]
    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = Some(gain);
        self
    }
}

/// Substitute the canonical waveform extension on a requested path.
///
/// Callers may ask for any suffix; the produced file always carries the
/// canonical one and the substituted path is what gets returned.
#[must_use]
pub fn canonical_output_path(requested: &Path) -> PathBuf {
    match requested.extension() {
        Some(ext) if ext.eq_ignore_ascii_case(CANONICAL_EXTENSION) => requested.to_path_buf(),
        _ => requested.with_extension(CANONICAL_EXTENSION),
    }
}

/// Reject text a single-shot synthesis call cannot handle.
pub(crate) fn validate_text(text: &str) -> NarrateResult<()> {
    if text.trim().is_empty() {
        return Err(NarrateError::validation("narration text is empty"));
    }
    if text.len() > MAX_TEXT_LENGTH {
        return Err(NarrateError::validation(format!(
            "narration text exceeds {MAX_TEXT_LENGTH} bytes, split it into segments"
        )));
    }
    Ok(())
}

/// Shared capability set of all synthesis backends.
///
/// Implementations are not reentrant: every operation takes `&mut self`
/// and blocks until completion, so exclusive ownership serializes access
/// to the underlying engine session.
pub trait SynthesisBackend {
    /// Which backend variant this is.
    fn kind(&self) -> BackendKind;

    /// The voices this backend can speak with.
    fn voices(&self) -> Vec<VoiceDescriptor>;

    /// Select the active voice.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::Validation`] when the id is rejected by
    /// the backend's catalog. Backends with a driver-owned voice list
    /// accept any id and let the driver decide.
    fn set_voice(&mut self, voice_id: &str) -> NarrateResult<()>;

    /// Set the speech rate in this backend's unit.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::Validation`] for an out-of-range value or
    /// a rate in the other backend's unit; the previous rate is kept.
    fn set_rate(&mut self, rate: SpeechRate) -> NarrateResult<()>;

    /// Current speaking rate expressed as words per minute, the common
    /// currency of duration estimation.
    fn effective_wpm(&self) -> f64;

    /// Estimate the spoken duration of `text` in seconds.
    ///
    /// A word-count heuristic, not a measurement of generated audio.
    fn estimate_duration(&self, text: &str) -> f64 {
        duration::estimate_seconds(text, self.effective_wpm())
    }

    /// Synthesize `text` into an audio file at `output_path`.
    ///
    /// Blocks until the file is fully written. The returned path always
    /// carries the canonical extension, whatever suffix was requested.
    ///
    /// # Errors
    ///
    /// [`NarrateError::Validation`] for unusable text,
    /// [`NarrateError::Synthesis`] when the engine fails,
    /// [`NarrateError::Io`] when the file cannot be written, and
    /// [`NarrateError::EngineInit`] when a required session restart
    /// fails.
    fn synthesize(&mut self, text: &str, output_path: &Path) -> NarrateResult<SynthesisOutput>;

    /// Synthesize a planned batch of segments.
    ///
    /// Failing segments are logged and omitted; the returned outputs are
    /// the successes in original segment order.
    ///
    /// # Errors
    ///
    /// Only fatal session errors ([`NarrateError::EngineInit`]) abort
    /// the batch.
    fn synthesize_segments(&mut self, segments: &[Segment]) -> NarrateResult<Vec<SynthesisOutput>>;

    /// Apply a request's overrides to this backend.
    ///
    /// # Errors
    ///
    /// Returns the first [`NarrateError::Validation`] a setter raises.
    fn apply_request(&mut self, request: &NarrationRequest) -> NarrateResult<()> {
        if let Some(voice) = &request.voice {
            self.set_voice(voice)?;
        }
        if let Some(rate) = request.rate {
            self.set_rate(rate)?;
        }
        Ok(())
    }
}
