//! Contract models for the dynamic settings service
//!
//! These models describe the boundary with the backing store. They are
//! transport-agnostic: a wire adapter maps its own response types into them.

/// Store-assigned revision, monotonically increasing across the store
pub type Revision = u64;

/// A single value as read from the backing store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// Raw setting value
    pub value: String,
    /// Revision at which the value was last modified
    pub revision: Revision,
}

impl KeyValue {
    pub fn new(value: impl Into<String>, revision: Revision) -> Self {
        Self {
            value: value.into(),
            revision,
        }
    }
}

/// Change notification delivered on a per-key watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Key was written
    Put {
        /// New raw value
        value: String,
        /// Revision of the write
        revision: Revision,
    },
    /// Key was removed
    Delete {
        /// Revision of the delete
        revision: Revision,
    },
    /// Event type the adapter could not decode
    Unrecognized {
        /// Event type as reported by the transport
        kind: String,
        /// Revision of the event
        revision: Revision,
    },
}

impl WatchEvent {
    /// Revision the event was produced at
    pub fn revision(&self) -> Revision {
        match self {
            Self::Put { revision, .. }
            | Self::Delete { revision }
            | Self::Unrecognized { revision, .. } => *revision,
        }
    }

    /// Short label for logging
    pub fn kind(&self) -> &str {
        match self {
            Self::Put { .. } => "put",
            Self::Delete { .. } => "delete",
            Self::Unrecognized { kind, .. } => kind,
        }
    }
}
