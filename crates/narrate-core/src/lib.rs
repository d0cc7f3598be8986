//! # Narrate Core
//!
//! Offline narration pipeline turning long-form posts into audio.
//!
//! ## Features
//!
//! - Markdown flattening into plain narration text
//! - Interchangeable synthesis backends: the OS speech driver or an
//!   offline neural vocoder, behind one capability trait
//! - Model asset resolution with a persistent on-disk cache
//! - Batch segment synthesis with stable, sortable file naming
//! - Word-count based duration estimation
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use narrate_core::{normalize, SynthesisBackend, SystemBackend, SystemConfig};
//!
//! fn main() -> narrate_core::NarrateResult<()> {
//!     let mut backend = SystemBackend::new(SystemConfig::default())?;
//!
//!     let text = normalize("# Hello\n\nSome **bold** text.\n");
//!     println!("roughly {:.0} seconds", backend.estimate_duration(&text));
//!
//!     let output = backend.synthesize(&text, Path::new("narration.wav"))?;
//!     println!("wrote {} ({} bytes)", output.path.display(), output.bytes);
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assets;
pub mod backend;
pub mod batch;
pub mod config;
pub mod duration;
pub mod error;
pub mod phoneme;
pub mod session;
pub mod text;
pub mod voice_catalog;

// Re-export main types for convenience
pub use backend::neural::{NeuralBackend, NeuralConfig};
pub use backend::system::{SystemBackend, SystemConfig};
pub use backend::{
    BackendKind, NarrationRequest, SpeechRate, SynthesisBackend, SynthesisOutput,
    CANONICAL_EXTENSION,
};
pub use batch::{BatchSynthesizer, Segment};
pub use config::NarrationSettings;
pub use error::{NarrateError, NarrateResult};
pub use session::SessionState;
pub use text::{normalize, word_count};
pub use voice_catalog::{Gender, VoiceCatalog, VoiceDescriptor};

/// Version information for the narrate-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sample rate of the neural vocoder's output (24 kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Number of audio channels (mono)
pub const DEFAULT_CHANNELS: u16 = 1;

/// Maximum text length for a single synthesis call
pub const MAX_TEXT_LENGTH: usize = 100_000;
