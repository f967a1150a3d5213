//! Error types for DataShield.
//!
//! Every rejected operation comes back as a `ShieldError`. Nothing here is
//! fatal: the caller decides whether to show the message or drop it.

use thiserror::Error;

/// Unified error type for all table store, identity and export operations
#[derive(Error, Debug)]
pub enum ShieldError {
    // ─── Silent no-ops ───

    #[error("No user is signed in")]
    Unauthenticated,

    #[error("No table is selected")]
    NoTableSelected,

    #[error("Table not found: {0}")]
    TableNotFound(String),

    // ─── User-visible rejections ───

    #[error("Permission denied: {role} may not {action}")]
    Forbidden { action: String, role: String },

    #[error("Cell {cell} is confirmed and cannot be edited")]
    Locked { cell: String },

    #[error("Cell {cell} is already confirmed")]
    AlreadyConfirmed { cell: String },

    #[error("Cell {cell} does not exist")]
    CellNotFound { cell: String },

    #[error("Column {col} is out of range (table has {columns} columns)")]
    ColumnOutOfRange { col: usize, columns: usize },

    #[error("Row {row} is past the growth limit of {limit} rows")]
    RowOutOfRange { row: usize, limit: usize },

    #[error("Invalid cell reference: {0}")]
    InvalidCellReference(String),

    // ─── Identity ───

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Session expired or unknown")]
    SessionExpired,

    // ─── Infrastructure ───

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Export failed: {0}")]
    Export(String),
}

impl ShieldError {
    /// Errors that the presentation layer swallows without telling the user.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated | Self::NoTableSelected | Self::TableNotFound(_)
        )
    }

    pub(crate) fn forbidden(action: &str, role: impl ToString) -> Self {
        Self::Forbidden {
            action: action.to_string(),
            role: role.to_string(),
        }
    }
}

impl From<serde_json::Error> for ShieldError {
    fn from(err: serde_json::Error) -> Self {
        ShieldError::Serialization(err.to_string())
    }
}

/// Result type alias for DataShield operations
pub type Result<T> = std::result::Result<T, ShieldError>;
