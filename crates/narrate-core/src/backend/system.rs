//! Synthesis through the synchronous OS speech driver.
//!
//! The driver is an `espeak-ng` (or `espeak`) binary spawned per
//! utterance with its output stream directed at the target file; the
//! call blocks until the driver exits. Voice ids are whatever the driver
//! reports and are passed through unchecked. After a queued batch flush
//! the driver handle is not reused: it is re-probed through the session
//! lifecycle first, which sidesteps the reuse hang some platform drivers
//! exhibit.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::backend::{
    canonical_output_path, validate_text, BackendKind, NarrationRequest, SpeechRate,
    SynthesisBackend, SynthesisOutput,
};
use crate::batch::Segment;
use crate::error::{NarrateError, NarrateResult};
use crate::phoneme::find_in_path;
use crate::session::{EngineLifecycle, EngineSession};
use crate::voice_catalog::{Gender, VoiceCatalog, VoiceDescriptor};

/// Default speech rate in words per minute.
pub const DEFAULT_WORDS_PER_MINUTE: u32 = 150;

const DEFAULT_GAIN: f32 = 1.0;

// The driver's amplitude scale runs 0..=200 with 100 as its default;
// gain 1.0 maps onto that default.
const FULL_GAIN_AMPLITUDE: f32 = 100.0;

/// Configuration for constructing a [`SystemBackend`].
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Initial voice id; `None` keeps the driver default
    pub voice: Option<String>,
    /// Speech rate in words per minute
    pub words_per_minute: u32,
    /// Output gain in `[0.0, 1.0]`
    pub gain: f32,
    /// Explicit driver binary; when `None` the PATH is searched
    pub driver: Option<PathBuf>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            voice: None,
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
            gain: DEFAULT_GAIN,
            driver: None,
        }
    }
}

/// Validated utterance settings of the system backend.
///
/// Setters reject out-of-domain values and leave the prior state
/// untouched when they do.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemSettings {
    voice: Option<String>,
    words_per_minute: u32,
    gain: f32,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            voice: None,
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
            gain: DEFAULT_GAIN,
        }
    }
}

impl SystemSettings {
    /// Active voice id, if one was selected
    #[must_use]
    pub fn voice(&self) -> Option<&str> {
        self.voice.as_deref()
    }

    /// Current rate in words per minute
    #[must_use]
    pub fn words_per_minute(&self) -> u32 {
        self.words_per_minute
    }

    /// Current output gain
    #[must_use]
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Select a voice. Membership is not checked; the driver decides.
    pub fn set_voice(&mut self, voice_id: &str) {
        self.voice = Some(voice_id.to_string());
    }

    /// Set the rate in words per minute.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::Validation`] for a zero rate.
    pub fn set_words_per_minute(&mut self, words_per_minute: u32) -> NarrateResult<()> {
        if words_per_minute == 0 {
            return Err(NarrateError::validation(
                "speed must be a positive number of words per minute",
            ));
        }
        self.words_per_minute = words_per_minute;
        Ok(())
    }

    /// Set the output gain.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::Validation`] for a gain outside
    /// `[0.0, 1.0]`.
    pub fn set_gain(&mut self, gain: f32) -> NarrateResult<()> {
        if !(0.0..=1.0).contains(&gain) {
            return Err(NarrateError::validation(format!(
                "gain must be between 0.0 and 1.0, got {gain}"
            )));
        }
        self.gain = gain;
        Ok(())
    }

    fn amplitude(&self) -> u32 {
        (self.gain * FULL_GAIN_AMPLITUDE).round() as u32
    }
}

/// Configuration for the driver session.
#[derive(Debug, Clone)]
pub struct SystemDriverConfig {
    /// Explicit driver binary; when `None` the PATH is searched
    pub program: Option<PathBuf>,
}

struct QueuedUtterance {
    index: usize,
    text: String,
    output_path: PathBuf,
}

/// A probed handle to the OS speech driver, with a batch queue.
pub struct SystemSession {
    program: PathBuf,
    queued: Vec<QueuedUtterance>,
}

impl EngineSession for SystemSession {
    type Config = SystemDriverConfig;
    const RESTART_AFTER_FLUSH: bool = true;

    fn start(config: &SystemDriverConfig) -> NarrateResult<Self> {
        let program = match &config.program {
            Some(program) => program.clone(),
            None => ["espeak-ng", "espeak"]
                .iter()
                .find_map(|candidate| find_in_path(candidate))
                .ok_or_else(|| {
                    NarrateError::engine_init(
                        "no speech driver found on PATH (tried espeak-ng, espeak)",
                    )
                })?,
        };

        let probe = Command::new(&program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match probe {
            Ok(status) if status.success() => {
                tracing::debug!(driver = %program.display(), "speech driver probed");
                Ok(Self {
                    program,
                    queued: Vec::new(),
                })
            }
            Ok(status) => Err(NarrateError::engine_init(format!(
                "speech driver '{}' probe exited with {status}",
                program.display()
            ))),
            Err(err) => Err(NarrateError::engine_init(format!(
                "speech driver '{}' could not be started: {err}",
                program.display()
            ))),
        }
    }

    fn stop(&mut self) {
        self.queued.clear();
    }
}

impl SystemSession {
    /// Run one blocking driver invocation writing to `output_path`.
    fn speak_to_file(
        &self,
        text: &str,
        output_path: &Path,
        settings: &SystemSettings,
    ) -> NarrateResult<()> {
        let mut command = Command::new(&self.program);
        command
            .arg("-q")
            .arg("-w")
            .arg(output_path)
            .args(["-s", &settings.words_per_minute().to_string()])
            .args(["-a", &settings.amplitude().to_string()]);
        if let Some(voice) = settings.voice() {
            command.args(["-v", voice]);
        }
        command.arg(text);

        let output = command
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| {
                NarrateError::synthesis(format!("failed to run speech driver: {err}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NarrateError::synthesis(format!(
                "speech driver exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if !output_path.is_file() {
            return Err(NarrateError::synthesis(format!(
                "speech driver produced no output at {}",
                output_path.display()
            )));
        }
        Ok(())
    }

    fn enqueue(&mut self, segment: &Segment) {
        self.queued.push(QueuedUtterance {
            index: segment.index,
            text: segment.text.clone(),
            output_path: segment.output_path.clone(),
        });
    }

    /// Drain the queue in one blocking pass, returning the per-utterance
    /// outcomes in queue order.
    fn flush(&mut self, settings: &SystemSettings) -> Vec<(usize, PathBuf, NarrateResult<()>)> {
        let queued = std::mem::take(&mut self.queued);
        queued
            .into_iter()
            .map(|utterance| {
                let result = self.speak_to_file(&utterance.text, &utterance.output_path, settings);
                (utterance.index, utterance.output_path, result)
            })
            .collect()
    }

    fn list_voices(&self) -> Vec<VoiceDescriptor> {
        let output = Command::new(&self.program)
            .arg("--voices")
            .stderr(Stdio::null())
            .output();
        match output {
            Ok(out) if out.status.success() => {
                parse_voice_listing(&String::from_utf8_lossy(&out.stdout))
            }
            _ => {
                tracing::warn!("speech driver voice listing unavailable");
                Vec::new()
            }
        }
    }
}

/// Parse the driver's `--voices` table into descriptors.
///
/// Lenient by design: rows that do not match the expected column shape
/// are skipped, and the driver remains the authority on valid ids.
pub(crate) fn parse_voice_listing(listing: &str) -> Vec<VoiceDescriptor> {
    let mut voices = Vec::new();
    for line in listing.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        let language = fields[1];
        let gender = match fields[2].rsplit('/').next() {
            Some("M") => Gender::Male,
            Some("F") => Gender::Female,
            _ => Gender::Neutral,
        };
        let name_fields: Vec<&str> = fields[3..]
            .iter()
            .copied()
            .take_while(|field| !field.contains('/'))
            .collect();
        let name = if name_fields.is_empty() {
            language.to_string()
        } else {
            name_fields.join(" ")
        };
        voices.push(VoiceDescriptor::new(
            language.to_string(),
            name,
            gender,
            language.to_string(),
        ));
    }
    voices
}

/// Backend over the synchronous OS speech driver.
pub struct SystemBackend {
    lifecycle: EngineLifecycle<SystemSession>,
    settings: SystemSettings,
    catalog: VoiceCatalog,
}

impl SystemBackend {
    /// Construct the backend, probing the driver and reading its voice
    /// listing.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::EngineInit`] when no usable driver is
    /// found and [`NarrateError::Validation`] for out-of-domain initial
    /// settings.
    pub fn new(config: SystemConfig) -> NarrateResult<Self> {
        let mut settings = SystemSettings::default();
        settings.set_words_per_minute(config.words_per_minute)?;
        settings.set_gain(config.gain)?;
        if let Some(voice) = &config.voice {
            settings.set_voice(voice);
        }

        let mut lifecycle = EngineLifecycle::<SystemSession>::start(SystemDriverConfig {
            program: config.driver,
        })?;
        let catalog = VoiceCatalog::from_voices(lifecycle.acquire()?.list_voices());
        tracing::info!(voices = catalog.len(), "system speech driver ready");

        Ok(Self {
            lifecycle,
            settings,
            catalog,
        })
    }

    /// Current utterance settings.
    #[must_use]
    pub fn settings(&self) -> &SystemSettings {
        &self.settings
    }

    /// Set the output gain.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::Validation`] for a gain outside
    /// `[0.0, 1.0]`; the previous gain is kept.
    pub fn set_gain(&mut self, gain: f32) -> NarrateResult<()> {
        self.settings.set_gain(gain)
    }
}

impl SynthesisBackend for SystemBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::System
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.catalog.voices().to_vec()
    }

    fn set_voice(&mut self, voice_id: &str) -> NarrateResult<()> {
        self.settings.set_voice(voice_id);
        Ok(())
    }

    fn set_rate(&mut self, rate: SpeechRate) -> NarrateResult<()> {
        match rate {
            SpeechRate::WordsPerMinute(wpm) => self.settings.set_words_per_minute(wpm),
            SpeechRate::Multiplier(_) => Err(NarrateError::validation(
                "system backend expects a words-per-minute rate, not a multiplier",
            )),
        }
    }

    fn effective_wpm(&self) -> f64 {
        f64::from(self.settings.words_per_minute())
    }

    fn synthesize(&mut self, text: &str, output_path: &Path) -> NarrateResult<SynthesisOutput> {
        validate_text(text)?;
        let path = canonical_output_path(output_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let session = self.lifecycle.acquire()?;
        session.speak_to_file(text, &path, &self.settings)?;
        let bytes = fs::metadata(&path)?.len();
        Ok(SynthesisOutput { path, bytes })
    }

    fn synthesize_segments(&mut self, segments: &[Segment]) -> NarrateResult<Vec<SynthesisOutput>> {
        let session = self.lifecycle.acquire()?;
        for segment in segments {
            session.enqueue(segment);
        }
        // One blocking pass over the whole queue instead of a wait per
        // segment; the driver handle is re-probed before any later use.
        let outcomes = session.flush(&self.settings);
        self.lifecycle.flush_completed();

        let mut outputs = Vec::new();
        for (index, path, result) in outcomes {
            let produced =
                result.and_then(|()| fs::metadata(&path).map_err(NarrateError::from));
            match produced {
                Ok(metadata) => outputs.push(SynthesisOutput {
                    path,
                    bytes: metadata.len(),
                }),
                Err(error) => {
                    tracing::warn!(segment = index, %error, "skipping failed segment");
                }
            }
        }
        Ok(outputs)
    }

    fn apply_request(&mut self, request: &NarrationRequest) -> NarrateResult<()> {
        if let Some(gain) = request.gain {
            self.settings.set_gain(gain)?;
        }
        if let Some(voice) = &request.voice {
            self.settings.set_voice(voice);
        }
        if let Some(rate) = request.rate {
            self.set_rate(rate)?;
        }
        Ok(())
    }
}
