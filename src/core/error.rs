//! Error types for the query builder
//!
//! This module defines every error the builder, the connection resolver and the
//! drivers can surface. Contract violations (mode, join, limit) are raised at the
//! call site that broke the contract; driver failures pass through untouched.

/// Result type alias for builder and driver operations
pub type Result<T> = std::result::Result<T, PormError>;

/// Error types for query building and execution
#[derive(Debug, thiserror::Error)]
pub enum PormError {
    /// Named connection section missing from the settings
    #[error("Configuration error: connection `{0}` is not defined in settings")]
    Configuration(String),

    /// Settings could not be parsed or are inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Driver construction failed for a connection
    #[error("Could not resolve connection `{connection}` - {message}")]
    ConnectionResolution {
        connection: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Call is illegal in the builder's current mode
    #[error("`{method}()` cannot be called on `{table}`: {reason}")]
    ModeViolation {
        method: &'static str,
        table: String,
        reason: &'static str,
    },

    /// Bad join type or self-join without alias
    #[error("Invalid join: {0}")]
    InvalidJoin(String),

    /// `limit()` called twice in one chain
    #[error("`limit()` was already called on `{table}`; it may only be set once per query")]
    LimitAlreadySet { table: String },

    /// Assignment cannot be used where it was given
    #[error("Invalid assignment: {0}")]
    InvalidAssignment(String),

    /// Query execution error
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Transaction error
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Unsupported operation
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A row expected to exist was not returned
    #[error("Row not found in `{table}` for {column} = {value}")]
    RowNotFound {
        table: String,
        column: String,
        value: String,
    },

    /// Type conversion error
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings file parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PormError {
    /// Create a connection resolution error
    pub fn resolution(connection: impl Into<String>, message: impl Into<String>) -> Self {
        PormError::ConnectionResolution {
            connection: connection.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection resolution error with source error
    pub fn resolution_with_source(
        connection: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        PormError::ConnectionResolution {
            connection: connection.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a mode violation error
    pub fn mode_violation(
        method: &'static str,
        table: impl Into<String>,
        reason: &'static str,
    ) -> Self {
        PormError::ModeViolation {
            method,
            table: table.into(),
            reason,
        }
    }

    /// Create an invalid join error
    pub fn invalid_join<S: Into<String>>(msg: S) -> Self {
        PormError::InvalidJoin(msg.into())
    }

    /// Create a new query error
    pub fn query<S: Into<String>>(msg: S) -> Self {
        PormError::QueryError(msg.into())
    }

    /// Create a new type mismatch error
    pub fn type_mismatch(expected: &str, actual: &str) -> Self {
        PormError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a new transaction error
    pub fn transaction<S: Into<String>>(msg: S) -> Self {
        PormError::TransactionError(msg.into())
    }

    /// Create a new unsupported operation error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        PormError::UnsupportedOperation(msg.into())
    }

    /// Whether this error reports a broken builder contract rather than a driver failure
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            PormError::ModeViolation { .. }
                | PormError::InvalidJoin(_)
                | PormError::LimitAlreadySet { .. }
        )
    }
}
