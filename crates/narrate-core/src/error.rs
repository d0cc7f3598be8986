//! Error types for the narration pipeline.

/// Result type alias for narration operations
pub type NarrateResult<T> = Result<T, NarrateError>;

/// Main error type for narration pipeline operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NarrateError {
    /// A required model asset is missing and could not be fetched
    #[error("asset unavailable: {message}")]
    AssetUnavailable {
        /// Description of the asset and why it could not be resolved
        message: String,
    },

    /// An engine session could not be constructed
    #[error("engine initialization failed: {message}")]
    EngineInit {
        /// Description of the missing capability or construction failure
        message: String,
    },

    /// A caller-supplied parameter is outside the backend's accepted domain
    #[error("invalid parameter: {message}")]
    Validation {
        /// Description of the rejected parameter
        message: String,
    },

    /// A synthesis call failed at the driver or runtime level
    #[error("synthesis failed: {message}")]
    Synthesis {
        /// Description of the synthesis failure
        message: String,
    },

    /// An output file could not be created or written
    #[error("file I/O error: {message}")]
    Io {
        /// Description of the file operation failure
        message: String,
    },
}

impl NarrateError {
    /// Create a new asset unavailability error
    #[must_use]
    pub fn asset_unavailable<S: Into<String>>(message: S) -> Self {
        Self::AssetUnavailable {
            message: message.into(),
        }
    }

    /// Create a new engine initialization error
    #[must_use]
    pub fn engine_init<S: Into<String>>(message: S) -> Self {
        Self::EngineInit {
            message: message.into(),
        }
    }

    /// Create a new parameter validation error
    #[must_use]
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new synthesis error
    #[must_use]
    pub fn synthesis<S: Into<String>>(message: S) -> Self {
        Self::Synthesis {
            message: message.into(),
        }
    }

    /// Create a new file I/O error
    #[must_use]
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Check if this error aborts the whole run rather than a single call
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::AssetUnavailable { .. } | Self::EngineInit { .. })
    }

    /// Check if this error is due to invalid caller input
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if a batch may skip the failing segment and continue
    #[must_use]
    pub const fn is_segment_recoverable(&self) -> bool {
        matches!(self, Self::Synthesis { .. } | Self::Io { .. })
    }

    /// Get the error category for logging/metrics
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::AssetUnavailable { .. } => "asset",
            Self::EngineInit { .. } => "engine",
            Self::Validation { .. } => "validation",
            Self::Synthesis { .. } => "synthesis",
            Self::Io { .. } => "io",
        }
    }
}

impl From<std::io::Error> for NarrateError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = NarrateError::synthesis("driver exited");
        assert_eq!(err.category(), "synthesis");
        assert!(!err.is_fatal());
        assert!(!err.is_user_error());
        assert!(err.is_segment_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = NarrateError::validation("speed must be positive");
        assert_eq!(err.to_string(), "invalid parameter: speed must be positive");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(NarrateError::asset_unavailable("test").category(), "asset");
        assert_eq!(NarrateError::engine_init("test").category(), "engine");
        assert_eq!(NarrateError::validation("test").category(), "validation");
        assert_eq!(NarrateError::synthesis("test").category(), "synthesis");
        assert_eq!(NarrateError::io("test").category(), "io");
    }

    #[test]
    fn test_fatal_errors() {
        assert!(NarrateError::asset_unavailable("test").is_fatal());
        assert!(NarrateError::engine_init("test").is_fatal());
        assert!(!NarrateError::validation("test").is_fatal());
        assert!(!NarrateError::synthesis("test").is_fatal());
    }

    #[test]
    fn test_user_errors() {
        assert!(NarrateError::validation("test").is_user_error());
        assert!(!NarrateError::synthesis("test").is_user_error());
        assert!(!NarrateError::asset_unavailable("test").is_user_error());
    }

    #[test]
    fn test_segment_recoverable() {
        assert!(NarrateError::synthesis("test").is_segment_recoverable());
        assert!(NarrateError::io("test").is_segment_recoverable());
        assert!(!NarrateError::engine_init("test").is_segment_recoverable());
        assert!(!NarrateError::asset_unavailable("test").is_segment_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = NarrateError::from(io_err);
        assert!(matches!(err, NarrateError::Io { .. }));
    }

    #[test]
    fn test_error_equality() {
        let err1 = NarrateError::synthesis("same");
        let err2 = NarrateError::synthesis("same");
        let err3 = NarrateError::synthesis("different");

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
