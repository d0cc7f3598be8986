//! Grapheme-to-phoneme stage for the neural vocoder.
//!
//! Primary path shells out to `espeak-ng` (or `espeak`) for IPA
//! phonemes in the locale of the active voice. When no phonemizer binary
//! is on the PATH, or a run fails, the raw text is passed through
//! unchanged: the vocoder's symbol table covers plain letters and
//! punctuation, so the deterministic fallback still tokenizes. The stage
//! as a whole never fails.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use once_cell::sync::Lazy;

/// Token window of the vocoder, including the leading/trailing pad.
pub const MAX_TOKENS: usize = 510;

// Symbol inventory of the vocoder: pad, punctuation, plain letters, IPA.
static SYMBOL_IDS: Lazy<HashMap<char, i64>> = Lazy::new(|| {
    let pad = "$";
    let punctuation = ";:,.!?¡¿—…\"«»\u{201c}\u{201d} ";
    let letters = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let letters_ipa = "ɑɐɒæɓʙβɔɕçɗɖðʤəɘɚɛɜɝɞɟʄɡɠɢʛɦɧħɥʜɨɪʝɭɬɫɮʟɱɯɰŋɳɲɴøɵɸθœɶʘɹɺɾɻʀʁɽʂʃʈʧʉʊʋⱱʌɣɤʍχʎʏʑʐʒʔʡʕʢǀǁǂǃˈˌːˑʼʴʰʱʲʷˠˤ˞↓↑→↗↘'̩'ᵻ";

    let mut map = HashMap::new();
    let symbols = pad
        .chars()
        .chain(punctuation.chars())
        .chain(letters.chars())
        .chain(letters_ipa.chars());
    for (index, symbol) in symbols.enumerate() {
        map.insert(symbol, index as i64);
    }
    map
});

/// Map a phoneme string onto vocoder token ids.
///
/// The sequence is wrapped in pad tokens and truncated to the model's
/// token window; characters outside the symbol inventory are skipped.
/// Deterministic: equal input always yields equal output.
#[must_use]
pub fn token_ids(phonemes: &str) -> Vec<i64> {
    let mut ids = vec![0_i64];
    for ch in phonemes.chars() {
        if ids.len() == MAX_TOKENS - 1 {
            break;
        }
        if let Some(&id) = SYMBOL_IDS.get(&ch) {
            ids.push(id);
        }
    }
    ids.push(0);
    ids
}

/// Converts narration text into a phoneme string.
pub struct Phonemizer {
    program: Option<PathBuf>,
}

impl Phonemizer {
    /// Locate a phonemizer binary.
    ///
    /// An explicit `program` wins; otherwise `espeak-ng` then `espeak`
    /// are searched on the PATH. A missing binary is not an error, it
    /// just selects the built-in fallback.
    #[must_use]
    pub fn detect(program: Option<PathBuf>) -> Self {
        let program = program.or_else(|| {
            ["espeak-ng", "espeak"]
                .iter()
                .find_map(|candidate| find_in_path(candidate))
        });
        match &program {
            Some(path) => tracing::debug!(program = %path.display(), "phonemizer located"),
            None => {
                tracing::warn!("no espeak phonemizer on PATH, using letter-level fallback");
            }
        }
        Self { program }
    }

    /// Whether an external phonemizer binary was found.
    #[must_use]
    pub fn has_driver(&self) -> bool {
        self.program.is_some()
    }

    /// Convert `text` to a phoneme string for the given espeak locale
    /// (e.g. "en-us", "en-gb"). Falls back to the raw text when the
    /// external phonemizer is unavailable or fails.
    #[must_use]
    pub fn phonemize(&self, text: &str, language: &str) -> String {
        if let Some(program) = &self.program {
            match run_espeak(program, text, language) {
                Ok(ipa) if !ipa.is_empty() => return ipa,
                Ok(_) => tracing::debug!("phonemizer produced empty output, falling back"),
                Err(message) => tracing::warn!(%message, "phonemizer failed, falling back"),
            }
        }
        text.to_string()
    }
}

fn run_espeak(program: &Path, text: &str, language: &str) -> Result<String, String> {
    let output = Command::new(program)
        .args(["-q", "--ipa=3", "-v", language])
        .arg(text)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|err| format!("failed to execute '{}': {err}", program.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "'{}' exited with {}: {}",
            program.display(),
            output.status,
            stderr.trim()
        ));
    }

    // espeak emits one clause per line; rejoin with plain spaces.
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Search the PATH for an executable, returning its full path.
pub(crate) fn find_in_path(command: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(command);
        if candidate.is_file() {
            return Some(candidate);
        }
        #[cfg(windows)]
        {
            let with_exe = dir.join(format!("{command}.exe"));
            if with_exe.is_file() {
                return Some(with_exe);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_ids_are_pad_bracketed() {
        let ids = token_ids("ab");
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[0], 0);
        assert_eq!(*ids.last().unwrap(), 0);
        assert!(ids[1] > 0 && ids[2] > 0);
    }

    #[test]
    fn test_token_ids_deterministic() {
        assert_eq!(token_ids("hˈɛloʊ"), token_ids("hˈɛloʊ"));
    }

    #[test]
    fn test_unknown_symbols_are_skipped() {
        let with_unknown = token_ids("a\u{1F600}b");
        let without = token_ids("ab");
        assert_eq!(with_unknown, without);
    }

    #[test]
    fn test_empty_input_yields_pads_only() {
        assert_eq!(token_ids(""), vec![0, 0]);
    }

    #[test]
    fn test_truncated_to_token_window() {
        let long = "a".repeat(MAX_TOKENS * 2);
        let ids = token_ids(&long);
        assert_eq!(ids.len(), MAX_TOKENS);
        assert_eq!(*ids.last().unwrap(), 0);
    }

    #[test]
    fn test_fallback_passes_text_through() {
        let phonemizer = Phonemizer {
            program: None,
        };
        assert!(!phonemizer.has_driver());
        assert_eq!(phonemizer.phonemize("hello there", "en-us"), "hello there");
    }

    #[test]
    fn test_distinct_symbols_get_distinct_ids() {
        let a = token_ids("a")[1];
        let b = token_ids("b")[1];
        let schwa = token_ids("ə")[1];
        assert_ne!(a, b);
        assert_ne!(a, schwa);
    }
}
