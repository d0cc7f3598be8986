//! Synthesis through the offline neural vocoder.
//!
//! The vocoder is a Kokoro ONNX model driven by phoneme token ids and a
//! per-voice style vector. Model files are resolved from the on-disk
//! asset cache before the engine session is created; a machine that has
//! them cached runs fully offline. Output is 24 kHz mono float WAV.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::assets::{kokoro_assets, AssetResolver, ACOUSTIC_MODEL, VOICE_TABLE};
use crate::backend::{
    canonical_output_path, validate_text, BackendKind, SpeechRate, SynthesisBackend,
    SynthesisOutput,
};
use crate::batch::Segment;
use crate::duration::NEURAL_BASE_WPM;
use crate::error::{NarrateError, NarrateResult};
use crate::phoneme::{self, Phonemizer};
use crate::session::{EngineLifecycle, EngineSession};
use crate::voice_catalog::{VoiceCatalog, VoiceDescriptor};
use crate::{DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE};

/// Lowest accepted speed multiplier.
pub const MIN_SPEED: f32 = 0.5;

/// Highest accepted speed multiplier.
pub const MAX_SPEED: f32 = 2.0;

/// Voice used when the caller does not pick one.
pub const DEFAULT_VOICE: &str = "af_heart";

// Style vector geometry of the voice-embedding table: one 256-float row
// per possible token count, 510 rows per voice.
const STYLE_DIM: usize = 256;
const STYLE_ROWS: usize = 510;

/// Configuration for constructing a [`NeuralBackend`].
#[derive(Debug, Clone)]
pub struct NeuralConfig {
    /// Initial voice id from the curated catalog
    pub voice: String,
    /// Initial speed multiplier in `[0.5, 2.0]`
    pub speed: f32,
    /// Asset cache directory override; `None` uses the user cache
    pub cache_dir: Option<PathBuf>,
    /// Asset download base URL override, e.g. a mirror or test server
    pub asset_base_url: Option<String>,
    /// Explicit phonemizer binary override
    pub phonemizer: Option<PathBuf>,
}

impl Default for NeuralConfig {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE.to_string(),
            speed: 1.0,
            cache_dir: None,
            asset_base_url: None,
            phonemizer: None,
        }
    }
}

/// Validated voice and speed state of the neural backend.
///
/// Setters reject out-of-domain values and leave the prior state
/// untouched when they do.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuralSettings {
    voice: String,
    speed: f32,
}

impl NeuralSettings {
    /// Build settings validated against the given catalog.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::Validation`] for an unknown voice or an
    /// out-of-range speed.
    pub fn new(catalog: &VoiceCatalog, voice: &str, speed: f32) -> NarrateResult<Self> {
        let mut settings = Self {
            voice: String::new(),
            speed: 1.0,
        };
        settings.set_voice(catalog, voice)?;
        settings.set_speed(speed)?;
        Ok(settings)
    }

    /// Active voice id
    #[must_use]
    pub fn voice(&self) -> &str {
        &self.voice
    }

    /// Current speed multiplier
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Select a voice from the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::Validation`] naming the valid ids when
    /// the voice is not in the catalog; the previous voice is kept.
    pub fn set_voice(&mut self, catalog: &VoiceCatalog, voice_id: &str) -> NarrateResult<()> {
        if !catalog.contains(voice_id) {
            return Err(NarrateError::validation(format!(
                "unknown voice '{voice_id}', choose from: {}",
                catalog.ids().join(", ")
            )));
        }
        self.voice = voice_id.to_string();
        Ok(())
    }

    /// Set the speed multiplier.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::Validation`] for a value outside
    /// `[0.5, 2.0]`; the previous speed is kept.
    pub fn set_speed(&mut self, speed: f32) -> NarrateResult<()> {
        if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
            return Err(NarrateError::validation(format!(
                "speed must be between {MIN_SPEED} and {MAX_SPEED}, got {speed}"
            )));
        }
        self.speed = speed;
        Ok(())
    }
}

/// The voice-embedding table: consecutive per-voice blocks of
/// `STYLE_ROWS` style vectors, little-endian f32, in catalog order.
struct VoiceTable {
    data: Vec<f32>,
    order: Vec<String>,
}

impl VoiceTable {
    fn load(path: &Path, order: Vec<String>) -> NarrateResult<Self> {
        let raw = fs::read(path).map_err(|err| {
            NarrateError::engine_init(format!(
                "failed to read voice table {}: {err}",
                path.display()
            ))
        })?;
        if raw.len() % 4 != 0 {
            return Err(NarrateError::engine_init(
                "voice table size is not a whole number of floats",
            ));
        }
        let mut data = Vec::with_capacity(raw.len() / 4);
        for chunk in raw.chunks_exact(4) {
            let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if !value.is_finite() {
                return Err(NarrateError::engine_init(
                    "voice table contains non-finite values",
                ));
            }
            data.push(value);
        }
        Ok(Self { data, order })
    }

    /// Style vector for a voice, row selected by token count.
    fn style(&self, voice_id: &str, token_count: usize) -> NarrateResult<Vec<f32>> {
        let voice_index = self
            .order
            .iter()
            .position(|id| id == voice_id)
            .ok_or_else(|| {
                NarrateError::synthesis(format!("voice '{voice_id}' missing from voice table"))
            })?;
        let row = token_count.min(STYLE_ROWS - 1);
        let start = (voice_index * STYLE_ROWS + row) * STYLE_DIM;
        self.data
            .get(start..start + STYLE_DIM)
            .map(<[f32]>::to_vec)
            .ok_or_else(|| {
                NarrateError::synthesis(format!(
                    "voice table too small for voice '{voice_id}'"
                ))
            })
    }
}

/// Configuration for the vocoder session.
#[derive(Debug, Clone)]
pub struct NeuralSessionConfig {
    model_path: PathBuf,
    voice_table_path: PathBuf,
    voice_order: Vec<String>,
}

/// Live vocoder session: the loaded ONNX model plus its voice table.
pub struct NeuralSession {
    session: ort::session::Session,
    voice_table: VoiceTable,
}

fn build_session(
    model_path: &Path,
    intra_threads: usize,
) -> Result<ort::session::Session, ort::Error> {
    ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_file(model_path)
}

impl EngineSession for NeuralSession {
    type Config = NeuralSessionConfig;
    const RESTART_AFTER_FLUSH: bool = false;

    fn start(config: &NeuralSessionConfig) -> NarrateResult<Self> {
        let intra_threads = std::cmp::min(num_cpus::get_physical(), 8);
        let session = build_session(&config.model_path, intra_threads).map_err(|err| {
            NarrateError::engine_init(format!(
                "failed to load acoustic model {}: {err}",
                config.model_path.display()
            ))
        })?;
        let voice_table = VoiceTable::load(&config.voice_table_path, config.voice_order.clone())?;
        tracing::info!(
            model = %config.model_path.display(),
            threads = intra_threads,
            "neural engine session ready"
        );
        Ok(Self {
            session,
            voice_table,
        })
    }

    fn stop(&mut self) {}
}

impl NeuralSession {
    fn infer(
        &mut self,
        tokens: Vec<i64>,
        style: Vec<f32>,
        speed: f32,
    ) -> NarrateResult<Vec<f32>> {
        let mut inputs: HashMap<String, ort::value::Value> = HashMap::new();

        let token_count = tokens.len();
        let tokens_tensor = ort::value::Tensor::from_array(([1, token_count], tokens))
            .map_err(|err| NarrateError::synthesis(format!("failed to create tokens tensor: {err}")))?;
        inputs.insert("tokens".to_string(), tokens_tensor.into());

        let style_len = style.len();
        let style_tensor = ort::value::Tensor::from_array(([1, style_len], style))
            .map_err(|err| NarrateError::synthesis(format!("failed to create style tensor: {err}")))?;
        inputs.insert("style".to_string(), style_tensor.into());

        let speed_tensor = ort::value::Tensor::from_array(([1], vec![speed]))
            .map_err(|err| NarrateError::synthesis(format!("failed to create speed tensor: {err}")))?;
        inputs.insert("speed".to_string(), speed_tensor.into());

        let outputs = self
            .session
            .run(inputs)
            .map_err(|err| NarrateError::synthesis(format!("vocoder inference failed: {err}")))?;

        if let Some(value) = outputs.get("audio") {
            extract_samples(value)
        } else if let Some(value) = outputs.get("output") {
            extract_samples(value)
        } else if let Some((_, value)) = outputs.iter().next() {
            extract_samples(&value)
        } else {
            Err(NarrateError::synthesis("vocoder produced no outputs"))
        }
    }
}

fn extract_samples(value: &ort::value::Value) -> NarrateResult<Vec<f32>> {
    let (_, data) = value.try_extract_tensor::<f32>().map_err(|err| {
        NarrateError::synthesis(format!("failed to extract audio samples: {err}"))
    })?;
    Ok(data.to_vec())
}

/// Scale samples so the peak sits at full scale, clamped to `[-1, 1]`.
fn postprocess(samples: &[f32]) -> Vec<f32> {
    let peak = samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max);
    if peak > 0.0 {
        samples
            .iter()
            .map(|&s| (s / peak).clamp(-1.0, 1.0))
            .collect()
    } else {
        samples.to_vec()
    }
}

fn write_waveform(path: &Path, samples: &[f32], sample_rate: u32) -> NarrateResult<()> {
    let spec = hound::WavSpec {
        channels: DEFAULT_CHANNELS,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|err| NarrateError::io(format!("failed to create waveform file: {err}")))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|err| NarrateError::io(format!("failed to write waveform sample: {err}")))?;
    }
    writer
        .finalize()
        .map_err(|err| NarrateError::io(format!("failed to finalize waveform file: {err}")))?;
    Ok(())
}

/// Backend over the offline neural vocoder.
pub struct NeuralBackend {
    lifecycle: EngineLifecycle<NeuralSession>,
    phonemizer: Phonemizer,
    catalog: VoiceCatalog,
    settings: NeuralSettings,
}

impl std::fmt::Debug for NeuralBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeuralBackend")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl NeuralBackend {
    /// Construct the backend.
    ///
    /// Model assets are resolved (and fetched if missing) before the
    /// engine session is created; construction blocks until both are
    /// done. There is no partially usable state: every asset resolves or
    /// construction fails.
    ///
    /// # Errors
    ///
    /// [`NarrateError::Validation`] for an unusable initial voice or
    /// speed, [`NarrateError::AssetUnavailable`] when a required asset
    /// cannot be resolved, [`NarrateError::EngineInit`] when the ONNX
    /// runtime or model cannot be loaded.
    pub fn new(config: NeuralConfig) -> NarrateResult<Self> {
        let catalog = VoiceCatalog::neural();
        let settings = NeuralSettings::new(&catalog, &config.voice, config.speed)?;

        let resolver = AssetResolver::new(config.cache_dir)?;
        let bundle = resolver.resolve(&kokoro_assets(config.asset_base_url.as_deref()))?;

        let phonemizer = Phonemizer::detect(config.phonemizer);

        let session_config = NeuralSessionConfig {
            model_path: bundle.path(ACOUSTIC_MODEL)?.to_path_buf(),
            voice_table_path: bundle.path(VOICE_TABLE)?.to_path_buf(),
            voice_order: catalog.ids().iter().map(ToString::to_string).collect(),
        };
        let lifecycle = EngineLifecycle::<NeuralSession>::start(session_config)?;

        Ok(Self {
            lifecycle,
            phonemizer,
            catalog,
            settings,
        })
    }

    /// Current voice and speed settings.
    #[must_use]
    pub fn settings(&self) -> &NeuralSettings {
        &self.settings
    }

    /// The espeak locale of the active voice.
    fn locale(&self) -> String {
        self.catalog
            .get(self.settings.voice())
            .map_or_else(|| "en-us".to_string(), |voice| voice.language.to_lowercase())
    }

    /// Core synthesis path shared by single-shot and batch calls.
    fn synthesize_into(&mut self, text: &str, output_path: &Path) -> NarrateResult<SynthesisOutput> {
        let path = canonical_output_path(output_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let locale = self.locale();
        let phonemes = self.phonemizer.phonemize(text, &locale);
        let tokens = phoneme::token_ids(&phonemes);

        let speed = self.settings.speed();
        let session = self.lifecycle.acquire()?;
        let style = session.voice_table.style(self.settings.voice(), tokens.len())?;
        let raw = session.infer(tokens, style, speed)?;

        let samples = postprocess(&raw);
        write_waveform(&path, &samples, DEFAULT_SAMPLE_RATE)?;
        let bytes = fs::metadata(&path)?.len();
        tracing::debug!(samples = samples.len(), path = %path.display(), "segment rendered");
        Ok(SynthesisOutput { path, bytes })
    }
}

impl SynthesisBackend for NeuralBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Neural
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.catalog.voices().to_vec()
    }

    fn set_voice(&mut self, voice_id: &str) -> NarrateResult<()> {
        self.settings.set_voice(&self.catalog, voice_id)
    }

    fn set_rate(&mut self, rate: SpeechRate) -> NarrateResult<()> {
        match rate {
            SpeechRate::Multiplier(speed) => self.settings.set_speed(speed),
            SpeechRate::WordsPerMinute(_) => Err(NarrateError::validation(
                "neural backend expects a speed multiplier, not words per minute",
            )),
        }
    }

    fn effective_wpm(&self) -> f64 {
        NEURAL_BASE_WPM * f64::from(self.settings.speed())
    }

    fn synthesize(&mut self, text: &str, output_path: &Path) -> NarrateResult<SynthesisOutput> {
        validate_text(text)?;
        self.synthesize_into(text, output_path)
    }

    fn synthesize_segments(&mut self, segments: &[Segment]) -> NarrateResult<Vec<SynthesisOutput>> {
        let mut outputs = Vec::new();
        for segment in segments {
            match self.synthesize_into(&segment.text, &segment.output_path) {
                Ok(output) => outputs.push(output),
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    tracing::warn!(segment = segment.index, %error, "skipping failed segment");
                }
            }
        }
        // Uniform lifecycle transition; a no-op for this engine.
        self.lifecycle.flush_completed();
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> VoiceCatalog {
        VoiceCatalog::neural()
    }

    #[test]
    fn test_settings_defaults_validate() {
        let settings = NeuralSettings::new(&catalog(), DEFAULT_VOICE, 1.0).unwrap();
        assert_eq!(settings.voice(), DEFAULT_VOICE);
        assert_eq!(settings.speed(), 1.0);
    }

    #[test]
    fn test_set_speed_rejects_out_of_range_and_keeps_state() {
        let mut settings = NeuralSettings::new(&catalog(), DEFAULT_VOICE, 1.0).unwrap();

        let err = settings.set_speed(3.0).unwrap_err();
        assert!(matches!(err, NarrateError::Validation { .. }));
        assert_eq!(settings.speed(), 1.0);

        assert!(settings.set_speed(0.4).is_err());
        assert_eq!(settings.speed(), 1.0);

        settings.set_speed(2.0).unwrap();
        assert_eq!(settings.speed(), 2.0);
    }

    #[test]
    fn test_set_voice_rejects_unknown_and_names_valid_ids() {
        let mut settings = NeuralSettings::new(&catalog(), DEFAULT_VOICE, 1.0).unwrap();

        let err = settings.set_voice(&catalog(), "af_nobody").unwrap_err();
        assert_eq!(settings.voice(), DEFAULT_VOICE);
        let message = err.to_string();
        assert!(message.contains("af_nobody"));
        assert!(message.contains("af_heart"));
        assert!(message.contains("bm_lewis"));

        settings.set_voice(&catalog(), "bf_emma").unwrap();
        assert_eq!(settings.voice(), "bf_emma");
    }

    #[test]
    fn test_voice_table_style_lookup() {
        let order = vec!["first".to_string(), "second".to_string()];
        let floats_per_voice = STYLE_ROWS * STYLE_DIM;
        let data: Vec<f32> = (0..2 * floats_per_voice).map(|i| i as f32).collect();
        let table = VoiceTable { data, order };

        let style = table.style("first", 0).unwrap();
        assert_eq!(style.len(), STYLE_DIM);
        assert_eq!(style[0], 0.0);

        let style = table.style("second", 1).unwrap();
        assert_eq!(style[0], (floats_per_voice + STYLE_DIM) as f32);
    }

    #[test]
    fn test_voice_table_row_clamped_to_window() {
        let order = vec!["only".to_string()];
        let data: Vec<f32> = vec![0.5; STYLE_ROWS * STYLE_DIM];
        let table = VoiceTable { data, order };

        assert!(table.style("only", 10_000).is_ok());
    }

    #[test]
    fn test_voice_table_bounds_checked() {
        let table = VoiceTable {
            data: vec![0.0; STYLE_DIM],
            order: vec!["tiny".to_string()],
        };
        assert!(table.style("tiny", 4).is_err());
        assert!(table.style("absent", 0).is_err());
    }

    #[test]
    fn test_postprocess_normalizes_peak() {
        let samples = postprocess(&[0.0, 0.25, -0.5]);
        assert_eq!(samples, vec![0.0, 0.5, -1.0]);

        let silence = postprocess(&[0.0, 0.0]);
        assert_eq!(silence, vec![0.0, 0.0]);
    }

    #[test]
    fn test_waveform_written_and_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_waveform(&path, &[0.0, 0.1, -0.1], DEFAULT_SAMPLE_RATE).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(reader.spec().channels, DEFAULT_CHANNELS);
        assert_eq!(reader.len(), 3);
    }

    #[test]
    fn test_config_defaults() {
        let config = NeuralConfig::default();
        assert_eq!(config.voice, DEFAULT_VOICE);
        assert_eq!(config.speed, 1.0);
        assert!(config.cache_dir.is_none());
    }
}
