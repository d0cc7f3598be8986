//! Batch segment orchestration.
//!
//! A batch is an ordered list of text segments rendered into one output
//! directory under a zero-padded positional filename scheme, so a plain
//! directory listing sorts back into narration order. One segment's
//! failure never aborts the batch: the segment is logged and omitted.

use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::{SynthesisBackend, SynthesisOutput, CANONICAL_EXTENSION};
use crate::error::NarrateResult;

/// One unit of text within a batch, identified by its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Zero-based position within the batch
    pub index: usize,
    /// Text to synthesize
    pub text: String,
    /// Planned output file for this segment
    pub output_path: PathBuf,
}

/// Runs an ordered list of segments through a backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchSynthesizer;

impl BatchSynthesizer {
    /// Create a batch synthesizer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Synthesize `texts` into `out_dir`, one file per segment.
    ///
    /// Returns the successfully produced outputs ordered by original
    /// segment index; failed segments are omitted, with no placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NarrateError::Io`] when the output directory
    /// cannot be created, or a fatal engine error from the backend.
    /// Per-segment synthesis failures do not propagate.
    pub fn run(
        &self,
        backend: &mut dyn SynthesisBackend,
        texts: &[String],
        out_dir: &Path,
    ) -> NarrateResult<Vec<SynthesisOutput>> {
        fs::create_dir_all(out_dir)?;

        let segments: Vec<Segment> = texts
            .iter()
            .enumerate()
            .map(|(index, text)| Segment {
                index,
                text: text.clone(),
                output_path: out_dir.join(format!("segment_{index:03}.{CANONICAL_EXTENSION}")),
            })
            .collect();

        tracing::debug!(segments = segments.len(), dir = %out_dir.display(), "starting batch");
        let outputs = backend.synthesize_segments(&segments)?;
        tracing::info!(
            produced = outputs.len(),
            requested = segments.len(),
            "batch finished"
        );
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, SpeechRate};
    use crate::error::NarrateResult;
    use crate::voice_catalog::VoiceDescriptor;
    use tempfile::TempDir;

    // Records the plan it was handed and "produces" every segment.
    struct RecordingBackend {
        planned: Vec<Segment>,
    }

    impl SynthesisBackend for RecordingBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::System
        }

        fn voices(&self) -> Vec<VoiceDescriptor> {
            Vec::new()
        }

        fn set_voice(&mut self, _voice_id: &str) -> NarrateResult<()> {
            Ok(())
        }

        fn set_rate(&mut self, _rate: SpeechRate) -> NarrateResult<()> {
            Ok(())
        }

        fn effective_wpm(&self) -> f64 {
            150.0
        }

        fn synthesize(
            &mut self,
            _text: &str,
            _output_path: &Path,
        ) -> NarrateResult<SynthesisOutput> {
            unreachable!("single-shot path not used by batch tests")
        }

        fn synthesize_segments(
            &mut self,
            segments: &[Segment],
        ) -> NarrateResult<Vec<SynthesisOutput>> {
            self.planned = segments.to_vec();
            Ok(segments
                .iter()
                .map(|segment| SynthesisOutput {
                    path: segment.output_path.clone(),
                    bytes: 0,
                })
                .collect())
        }
    }

    #[test]
    fn test_plans_zero_padded_paths_in_order() {
        let dir = TempDir::new().unwrap();
        let texts: Vec<String> = (0..12).map(|i| format!("segment {i}")).collect();
        let mut backend = RecordingBackend {
            planned: Vec::new(),
        };

        let outputs = BatchSynthesizer::new()
            .run(&mut backend, &texts, dir.path())
            .unwrap();

        assert_eq!(outputs.len(), 12);
        assert_eq!(backend.planned[0].output_path, dir.path().join("segment_000.wav"));
        assert_eq!(backend.planned[9].output_path, dir.path().join("segment_009.wav"));
        assert_eq!(backend.planned[11].output_path, dir.path().join("segment_011.wav"));

        // Lexicographic file order matches narration order.
        let mut names: Vec<String> = backend
            .planned
            .iter()
            .map(|s| s.output_path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let in_order = names.clone();
        names.sort();
        assert_eq!(names, in_order);
    }

    #[test]
    fn test_creates_output_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let mut backend = RecordingBackend {
            planned: Vec::new(),
        };

        BatchSynthesizer::new()
            .run(&mut backend, &["x".to_string()], &nested)
            .unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_empty_batch_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut backend = RecordingBackend {
            planned: Vec::new(),
        };
        let outputs = BatchSynthesizer::new()
            .run(&mut backend, &[], dir.path())
            .unwrap();
        assert!(outputs.is_empty());
    }
}
