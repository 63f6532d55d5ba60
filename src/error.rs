//! Error types for the project store and storage housekeeping.

use thiserror::Error;

/// Result type alias for idealab operations.
pub type LabResult<T> = Result<T, LabError>;

/// Errors that can occur while managing projects and stored media.
#[derive(Error, Debug)]
pub enum LabError {
    /// Automerge error during document operations.
    #[error("Automerge error: {0}")]
    Automerge(#[from] automerge::AutomergeError),

    /// Autosurgeon hydration error.
    #[error("Hydration error: {0}")]
    Hydrate(#[from] autosurgeon::HydrateError),

    /// Autosurgeon reconcile error.
    #[error("Reconcile error: {0}")]
    Reconcile(#[from] autosurgeon::ReconcileError),

    /// Read, write or delete against a storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem error from a directory-backed store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored or imported payload could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Image decode or encode failure during optimization.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Backup document written by a newer schema.
    #[error("Unsupported backup version {found} (newest supported is {supported})")]
    UnsupportedBackupVersion { found: u32, supported: u32 },

    /// No project snapshot stored under the given id.
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// No stored item under the given key.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// No project is open in the session.
    #[error("No project is open")]
    NoOpenProject,

    /// Entity, cut or asset definition not found in the project.
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Document path did not lead to a map object.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Invalid configuration value or file.
    #[error("Config error: {0}")]
    Config(String),
}

impl LabError {
    /// Creates a Storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates a Parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Creates a ProjectNotFound error.
    pub fn project_not_found(id: impl Into<String>) -> Self {
        Self::ProjectNotFound(id.into())
    }

    /// Creates an ItemNotFound error.
    pub fn item_not_found(key: impl Into<String>) -> Self {
        Self::ItemNotFound(key.into())
    }

    /// Creates an EntityNotFound error.
    pub fn entity_not_found(id: impl Into<String>) -> Self {
        Self::EntityNotFound(id.into())
    }

    /// Creates a SchemaViolation error.
    pub fn schema_violation(msg: impl Into<String>) -> Self {
        Self::SchemaViolation(msg.into())
    }

    /// Creates a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<serde_json::Error> for LabError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<base64::DecodeError> for LabError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Parse(format!("base64: {}", err))
    }
}
