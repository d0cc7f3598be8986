//! Voice descriptors and the fixed per-backend voice catalogs.

use serde::{Deserialize, Serialize};

/// Gender classification for voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Male voice
    Male,
    /// Female voice
    Female,
    /// Non-binary or unreported gender
    Neutral,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Male => write!(f, "Male"),
            Self::Female => write!(f, "Female"),
            Self::Neutral => write!(f, "Neutral"),
        }
    }
}

/// A single voice a backend can speak with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    /// Unique identifier within its catalog
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Voice gender
    pub gender: Gender,
    /// Language tag (e.g. "en-US", "en-GB")
    pub language: String,
}

impl VoiceDescriptor {
    /// Create a new voice descriptor
    #[must_use]
    pub fn new<S: Into<String>>(id: S, name: S, gender: Gender, language: S) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            gender,
            language: language.into(),
        }
    }
}

/// A fixed, read-only collection of voices owned by one backend.
///
/// Ids are unique within a catalog; duplicate ids from a driver listing
/// are dropped, first occurrence wins.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VoiceCatalog {
    voices: Vec<VoiceDescriptor>,
}

impl VoiceCatalog {
    /// Build a catalog from a list of descriptors, deduplicating by id.
    #[must_use]
    pub fn from_voices(voices: Vec<VoiceDescriptor>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let voices = voices
            .into_iter()
            .filter(|voice| seen.insert(voice.id.clone()))
            .collect();
        Self { voices }
    }

    /// The curated voice set of the offline neural vocoder.
    #[must_use]
    pub fn neural() -> Self {
        let voices = vec![
            VoiceDescriptor::new("af_heart", "Heart (American Female)", Gender::Female, "en-US"),
            VoiceDescriptor::new("af_bella", "Bella (American Female)", Gender::Female, "en-US"),
            VoiceDescriptor::new("af_nicole", "Nicole (American Female)", Gender::Female, "en-US"),
            VoiceDescriptor::new("af_sarah", "Sarah (American Female)", Gender::Female, "en-US"),
            VoiceDescriptor::new("af_sky", "Sky (American Female)", Gender::Female, "en-US"),
            VoiceDescriptor::new("am_adam", "Adam (American Male)", Gender::Male, "en-US"),
            VoiceDescriptor::new("am_michael", "Michael (American Male)", Gender::Male, "en-US"),
            VoiceDescriptor::new("bf_emma", "Emma (British Female)", Gender::Female, "en-GB"),
            VoiceDescriptor::new("bf_isabella", "Isabella (British Female)", Gender::Female, "en-GB"),
            VoiceDescriptor::new("bm_george", "George (British Male)", Gender::Male, "en-GB"),
            VoiceDescriptor::new("bm_lewis", "Lewis (British Male)", Gender::Male, "en-GB"),
        ];
        Self::from_voices(voices)
    }

    /// Get a voice by id
    #[must_use]
    pub fn get(&self, voice_id: &str) -> Option<&VoiceDescriptor> {
        self.voices.iter().find(|voice| voice.id == voice_id)
    }

    /// Check whether a voice id belongs to this catalog
    #[must_use]
    pub fn contains(&self, voice_id: &str) -> bool {
        self.get(voice_id).is_some()
    }

    /// All voice ids, in catalog order
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.voices.iter().map(|voice| voice.id.as_str()).collect()
    }

    /// All descriptors, in catalog order
    #[must_use]
    pub fn voices(&self) -> &[VoiceDescriptor] {
        &self.voices
    }

    /// Voices filtered by gender
    #[must_use]
    pub fn voices_by_gender(&self, gender: Gender) -> Vec<&VoiceDescriptor> {
        self.voices
            .iter()
            .filter(|voice| voice.gender == gender)
            .collect()
    }

    /// Voices filtered by language tag (case-insensitive, primary-tag match)
    #[must_use]
    pub fn voices_by_language(&self, language: &str) -> Vec<&VoiceDescriptor> {
        self.voices
            .iter()
            .filter(|voice| {
                voice.language.eq_ignore_ascii_case(language)
                    || voice
                        .language
                        .split('-')
                        .next()
                        .unwrap_or("")
                        .eq_ignore_ascii_case(language)
            })
            .collect()
    }

    /// Number of voices in the catalog
    #[must_use]
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}
