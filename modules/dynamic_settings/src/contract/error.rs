//! Contract error types for the dynamic settings service
//!
//! These errors are transport-agnostic and returned to every in-process consumer.
//! Each variant carries the offending key.

/// Settings lookup and update errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// Key is absent in the backing store
    NotFound {
        /// Setting key
        key: String,
    },
    /// Backing store could not be reached or rejected the request
    Unavailable {
        /// Setting key
        key: String,
        /// Transport error details
        message: String,
    },
    /// Stored value could not be converted to the requested type
    Parse {
        /// Setting key
        key: String,
        /// Requested type (int64, uint64, bool, duration, url)
        expected: &'static str,
        /// Parser error details
        message: String,
    },
}

impl SettingsError {
    /// Key the error refers to
    pub fn key(&self) -> &str {
        match self {
            Self::NotFound { key } | Self::Unavailable { key, .. } | Self::Parse { key, .. } => key,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { key } => {
                write!(f, "setting not found: {}", key)
            }
            Self::Unavailable { key, message } => {
                write!(f, "settings store unavailable for '{}': {}", key, message)
            }
            Self::Parse {
                key,
                expected,
                message,
            } => {
                write!(f, "setting '{}' is not a valid {}: {}", key, expected, message)
            }
        }
    }
}

impl std::error::Error for SettingsError {}
