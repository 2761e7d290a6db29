//! Error types for the depgraph core library.
//!
//! Unresolved type references are deliberately absent from this taxonomy:
//! classification degrades them to provisional placeholder entities instead
//! of failing.

/// Top-level error enum for the depgraph core library.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A natural key was empty or malformed; raised before any store access.
    #[error("Invalid identity for {kind}: {reason}")]
    InvalidIdentity { kind: &'static str, reason: String },

    /// Stored and incoming values of one attribute have different types.
    #[error("Attribute conflict on {entity_id}.{attribute}: stored {stored}, incoming {incoming}")]
    AttributeConflict {
        entity_id: String,
        attribute: String,
        stored: &'static str,
        incoming: &'static str,
    },

    #[error("Transaction failure: {0}")]
    Transaction(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    pub fn invalid_identity(kind: &'static str, reason: impl Into<String>) -> Self {
        GraphError::InvalidIdentity {
            kind,
            reason: reason.into(),
        }
    }

    /// True for errors raised by the persisted store, which abort a batch.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            GraphError::Transaction(_)
                | GraphError::ConstraintViolation(_)
                | GraphError::Database(_)
                | GraphError::Sqlite(_)
                | GraphError::Io(_)
        )
    }
}

impl From<rusqlite::Error> for GraphError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                GraphError::ConstraintViolation(
                    message.clone().unwrap_or_else(|| code.to_string()),
                )
            }
            _ => GraphError::Sqlite(err),
        }
    }
}

#[cfg(feature = "python")]
impl From<GraphError> for pyo3::PyErr {
    fn from(err: GraphError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
        match &err {
            GraphError::InvalidIdentity { .. }
            | GraphError::AttributeConflict { .. }
            | GraphError::Parse(_)
            | GraphError::Json(_) => PyValueError::new_err(err.to_string()),
            GraphError::Io(_) => PyIOError::new_err(err.to_string()),
            GraphError::Transaction(_)
            | GraphError::ConstraintViolation(_)
            | GraphError::Database(_)
            | GraphError::Sqlite(_) => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_failures_are_mapped() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: GraphError = conn
            .execute("INSERT INTO t VALUES ('a');", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, GraphError::ConstraintViolation(_)));
        assert!(err.is_store_failure());
    }

    #[test]
    fn identity_errors_are_not_store_failures() {
        let err = GraphError::invalid_identity("Class", "empty simple name");
        assert!(!err.is_store_failure());
        assert_eq!(
            err.to_string(),
            "Invalid identity for Class: empty simple name"
        );
    }
}
