//! Layout persistence error types.
//!
//! Entity-level failures are caught at the container boundary and turned into
//! "drop this entity, keep loading". Only `StorageUnavailable` is meant to
//! reach the caller of the façade.

use std::path::PathBuf;
use thiserror::Error;

/// Layout persistence error.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Neither layer holds the entity file.
    #[error("{kind} '{name}' not found in either layer")]
    NotFound { kind: &'static str, name: String },

    /// Declared name disagrees with the storage-derived name.
    #[error("{kind} '{expected}' declares name '{found}'")]
    InvalidReference {
        kind: &'static str,
        expected: String,
        found: String,
    },

    /// Entity loaded but violates a model invariant.
    #[error("{kind} '{name}' is invalid: {reason}")]
    InvalidEntity {
        kind: &'static str,
        name: String,
        reason: String,
    },

    /// Document is not well-formed XML.
    #[error("malformed {kind} document '{name}'")]
    MalformedDocument {
        kind: &'static str,
        name: String,
        #[source]
        source: quick_xml::Error,
    },

    /// A single attribute could not be parsed and was repaired.
    #[error("{kind} '{name}': attribute '{attribute}' has invalid value '{value}'")]
    MalformedAttribute {
        kind: &'static str,
        name: String,
        attribute: String,
        value: String,
    },

    /// A component instance could not be written.
    #[error("component '{key}' could not be serialized")]
    SerializationFailure {
        key: String,
        #[source]
        source: ComponentError,
    },

    /// Owning extension is missing or disabled.
    #[error("{kind} '{name}' requires unavailable module '{module}'")]
    ExtensionUnavailable {
        kind: &'static str,
        name: String,
        module: String,
    },

    /// A layer root cannot be created or accessed.
    #[error("storage root unavailable: {path}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File I/O error.
    #[error("failed to {operation} {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PersistenceError {
    /// Shorthand for the most common variant.
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// True for failures that mean "the file simply isn't there".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Failures reported by the component capability collaborator.
#[derive(Debug, Error)]
pub enum ComponentError {
    /// Stored data exists but cannot be decoded.
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    /// Stored data decodes but yields nothing that can be shown.
    #[error("stored data has no activation capability")]
    NotActivatable,

    /// The component refuses to be written.
    #[error("component cannot be serialized: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ComponentError {
    /// Short reason class used to de-duplicate log lines.
    pub fn reason_class(&self) -> &'static str {
        match self {
            Self::Corrupt(_) => "corrupt",
            Self::NotActivatable => "not-activatable",
            Self::Unsupported(_) => "unsupported",
            Self::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
