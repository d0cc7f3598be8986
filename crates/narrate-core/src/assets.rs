//! Resolution and caching of binary model assets.
//!
//! The neural backend needs a couple of large files that do not ship
//! with the crate. They live in a per-user cache directory that survives
//! process restarts: a file already on disk is accepted as-is (a prior
//! successful download is trusted, no checksum), a missing file gets
//! exactly one fetch attempt. Any failure surfaces as
//! [`NarrateError::AssetUnavailable`] and is never retried here.
//!
//! The cache is append-only. Concurrent processes racing to write the
//! same file are harmless: the last successful write wins.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::{NarrateError, NarrateResult};

/// File name of the neural acoustic model within its bundle.
pub const ACOUSTIC_MODEL: &str = "kokoro-v1.0.onnx";

/// File name of the voice-embedding table within its bundle.
pub const VOICE_TABLE: &str = "voices-v1.0.bin";

const KOKORO_RELEASE_URL: &str =
    "https://github.com/thewh1teagle/kokoro-onnx/releases/download/model-files-v1.0";

/// One required asset file and where to fetch it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    /// File name inside the bundle directory
    pub name: String,
    /// Fixed upstream URL
    pub url: String,
}

/// A named set of asset files a backend requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSource {
    /// Bundle name, used as the subdirectory under the cache root
    pub name: String,
    /// The required files
    pub files: Vec<AssetFile>,
}

/// The asset set of the Kokoro neural vocoder.
///
/// `base_url` overrides the upstream release location, e.g. for a local
/// mirror or a test server.
#[must_use]
pub fn kokoro_assets(base_url: Option<&str>) -> AssetSource {
    let base = base_url
        .unwrap_or(KOKORO_RELEASE_URL)
        .trim_end_matches('/')
        .to_string();
    AssetSource {
        name: "kokoro".to_string(),
        files: vec![
            AssetFile {
                name: ACOUSTIC_MODEL.to_string(),
                url: format!("{base}/{ACOUSTIC_MODEL}"),
            },
            AssetFile {
                name: VOICE_TABLE.to_string(),
                url: format!("{base}/{VOICE_TABLE}"),
            },
        ],
    }
}

/// A fully resolved asset set: every required file exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBundle {
    paths: HashMap<String, PathBuf>,
}

impl AssetBundle {
    /// Local path of a named asset.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::AssetUnavailable`] when the name is not
    /// part of the resolved set.
    pub fn path(&self, name: &str) -> NarrateResult<&Path> {
        self.paths.get(name).map(PathBuf::as_path).ok_or_else(|| {
            NarrateError::asset_unavailable(format!("asset '{name}' missing from resolved bundle"))
        })
    }

    /// Number of resolved files
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the bundle is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Resolves asset sources against the on-disk cache, fetching what is
/// missing.
pub struct AssetResolver {
    cache_dir: PathBuf,
    client: reqwest::blocking::Client,
}

impl AssetResolver {
    /// Create a resolver rooted at `cache_dir`, or at the platform user
    /// cache location when `None`. The directory is created if absent.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::AssetUnavailable`] when no cache location
    /// can be determined or created.
    pub fn new(cache_dir: Option<PathBuf>) -> NarrateResult<Self> {
        let cache_dir = match cache_dir {
            Some(dir) => dir,
            None => ProjectDirs::from("dev", "narrate", "narrate")
                .ok_or_else(|| {
                    NarrateError::asset_unavailable("could not determine a user cache directory")
                })?
                .cache_dir()
                .join("models"),
        };
        fs::create_dir_all(&cache_dir).map_err(|err| {
            NarrateError::asset_unavailable(format!(
                "failed to create cache directory {}: {err}",
                cache_dir.display()
            ))
        })?;
        Ok(Self {
            cache_dir,
            client: reqwest::blocking::Client::new(),
        })
    }

    /// The cache directory this resolver reads and writes.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Resolve every file of `source`, fetching missing ones.
    ///
    /// Idempotent: when all files are already cached no network I/O
    /// happens at all.
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::AssetUnavailable`] on the first file that
    /// cannot be fetched or is still missing after its single fetch
    /// attempt.
    pub fn resolve(&self, source: &AssetSource) -> NarrateResult<AssetBundle> {
        let bundle_dir = self.cache_dir.join(&source.name);
        fs::create_dir_all(&bundle_dir).map_err(|err| {
            NarrateError::asset_unavailable(format!(
                "failed to create bundle directory {}: {err}",
                bundle_dir.display()
            ))
        })?;

        let mut paths = HashMap::new();
        for file in &source.files {
            let target = bundle_dir.join(&file.name);
            if target.is_file() {
                tracing::debug!(asset = %file.name, "asset already cached");
            } else {
                tracing::info!(asset = %file.name, url = %file.url, "downloading asset");
                self.fetch(&file.url, &target)?;
                if !target.is_file() {
                    return Err(NarrateError::asset_unavailable(format!(
                        "asset '{}' still missing after download",
                        file.name
                    )));
                }
            }
            paths.insert(file.name.clone(), target);
        }
        Ok(AssetBundle { paths })
    }

    fn fetch(&self, url: &str, target: &Path) -> NarrateResult<()> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| NarrateError::asset_unavailable(format!("failed to fetch {url}: {err}")))?;
        if !response.status().is_success() {
            return Err(NarrateError::asset_unavailable(format!(
                "failed to fetch {url}: HTTP {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .map_err(|err| NarrateError::asset_unavailable(format!("failed to read {url}: {err}")))?;
        fs::write(target, &bytes).map_err(|err| {
            NarrateError::asset_unavailable(format!(
                "failed to write {}: {err}",
                target.display()
            ))
        })?;
        tracing::info!(asset = %target.display(), bytes = bytes.len(), "asset downloaded");
        Ok(())
    }
}
