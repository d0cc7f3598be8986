//! Heuristic narration duration estimation.
//!
//! Estimates are derived from word counts and a words-per-minute figure,
//! never from generated audio. Treat them as ballpark numbers for
//! reporting, not as a playback-length guarantee.

use crate::text;

/// Empirical words-per-minute of the neural vocoder at multiplier 1.0.
pub const NEURAL_BASE_WPM: f64 = 165.0;

/// Estimate how many seconds it takes to speak `text` at the given rate.
///
/// `words_per_minute` must be positive; non-positive rates yield 0.0
/// (backend setters reject such rates before they get here).
#[must_use]
pub fn estimate_seconds(text: &str, words_per_minute: f64) -> f64 {
    if words_per_minute <= 0.0 {
        return 0.0;
    }
    let words = text::word_count(text) as f64;
    words * 60.0 / words_per_minute
}
