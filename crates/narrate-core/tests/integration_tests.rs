//! Integration tests for narrate-core

use std::path::Path;

use narrate_core::backend::canonical_output_path;
use narrate_core::backend::neural::{NeuralSettings, DEFAULT_VOICE};
use narrate_core::duration::{estimate_seconds, NEURAL_BASE_WPM};
use narrate_core::{
    normalize, word_count, BackendKind, Gender, NarrateError, NarrationSettings, NeuralBackend,
    NeuralConfig, SpeechRate, VoiceCatalog,
};

#[test]
fn test_markdown_flattening_pipeline() {
    let post = "# Title\n\nSome **bold** text with [link](http://x).\n";
    let text = normalize(post);
    assert_eq!(text, "Title Some bold text with link.");
    assert_eq!(word_count(&text), 6);
}

#[test]
fn test_normalize_is_idempotent_on_flattened_output() {
    let post = "## Heading\n\nFirst *paragraph*.\n\nSecond [one](u).\n";
    let once = normalize(post);
    assert_eq!(normalize(&once), once);
}

#[test]
fn test_system_duration_estimate() {
    // 5 words at 150 wpm take exactly two seconds.
    assert_eq!(estimate_seconds("one two three four five", 150.0), 2.0);
}

#[test]
fn test_doubling_rate_halves_duration_for_both_kinds() {
    let text = "the quick brown fox jumps over the lazy dog";

    let system_slow = estimate_seconds(text, 120.0);
    let system_fast = estimate_seconds(text, 240.0);
    assert_eq!(system_fast, system_slow / 2.0);

    let neural_slow = estimate_seconds(text, NEURAL_BASE_WPM * 0.9);
    let neural_fast = estimate_seconds(text, NEURAL_BASE_WPM * 1.8);
    assert_eq!(neural_fast, neural_slow / 2.0);
}

#[test]
fn test_canonical_extension_is_always_applied() {
    for requested in ["clip.mp3", "clip.ogg", "clip", "clip.wav"] {
        let path = canonical_output_path(Path::new(requested));
        let extension = path.extension().unwrap().to_string_lossy().to_lowercase();
        assert_eq!(extension, "wav", "requested: {requested}");
    }
}

#[test]
fn test_neural_speed_rejection_keeps_state() {
    let catalog = VoiceCatalog::neural();
    let mut settings = NeuralSettings::new(&catalog, DEFAULT_VOICE, 1.0).unwrap();

    let err = settings.set_speed(3.0).unwrap_err();
    assert!(matches!(err, NarrateError::Validation { .. }));
    assert_eq!(settings.speed(), 1.0);
}

#[test]
fn test_neural_backend_without_assets_or_network_fails_fast() {
    let cache = tempfile::tempdir().unwrap();
    let config = NeuralConfig {
        cache_dir: Some(cache.path().to_path_buf()),
        // Nothing listens on port 1, so the single fetch attempt fails.
        asset_base_url: Some("http://127.0.0.1:1".to_string()),
        ..NeuralConfig::default()
    };

    let err = NeuralBackend::new(config).unwrap_err();
    assert!(matches!(err, NarrateError::AssetUnavailable { .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_neural_catalog_shape() {
    let catalog = VoiceCatalog::neural();
    assert!(catalog.contains(DEFAULT_VOICE));
    assert!(!catalog.voices_by_gender(Gender::Male).is_empty());
    assert!(!catalog.voices_by_language("en-GB").is_empty());

    let mut ids = catalog.ids();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), catalog.len());
}

#[test]
fn test_settings_select_backend_rate_unit() {
    let system = NarrationSettings {
        words_per_minute: Some(170),
        speed: Some(1.5),
        ..NarrationSettings::default()
    };
    assert_eq!(system.backend, BackendKind::System);
    assert_eq!(system.rate(), Some(SpeechRate::WordsPerMinute(170)));

    let neural = NarrationSettings {
        backend: BackendKind::Neural,
        words_per_minute: Some(170),
        speed: Some(1.5),
        ..NarrationSettings::default()
    };
    assert_eq!(neural.rate(), Some(SpeechRate::Multiplier(1.5)));
}
