//! Uniform result shape returned by the dispatcher
//!
//! Every statement, whatever path it takes, comes back as a `ResultEnvelope`:
//! string-encoded rows plus column names for query-shaped statements, an
//! affected-row count for DML, a status row for DDL and session commands,
//! and `success = false` with `error` text when anything goes wrong.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ResultEnvelope {
    pub success: bool,

    /// Column names, in result order.
    pub columns: Vec<String>,

    /// Row data; each cell is a string-encoded scalar, `None` for SQL NULL.
    pub data: Vec<Vec<Option<String>>>,

    pub rowcount: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResultEnvelope {
    /// Build a row-set result.
    pub fn rows(columns: Vec<String>, data: Vec<Vec<Option<String>>>) -> Self {
        let rowcount = data.len() as i64;
        Self {
            success: true,
            columns,
            data,
            rowcount,
            error: None,
            message: None,
        }
    }

    /// Build a DML result carrying only an affected-row count.
    pub fn count(affected: i64) -> Self {
        Self {
            success: true,
            columns: vec!["count".to_string()],
            data: vec![vec![Some(affected.to_string())]],
            rowcount: affected,
            error: None,
            message: None,
        }
    }

    /// Build a single status-row result, the shape DDL and session
    /// commands return.
    pub fn status(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: true,
            columns: vec!["status".to_string()],
            data: vec![vec![Some(message.clone())]],
            rowcount: 1,
            error: None,
            message: Some(message),
        }
    }

    /// Build a failed result from any error.
    pub fn error(err: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            columns: Vec::new(),
            data: Vec::new(),
            rowcount: 0,
            error: Some(err.to_string()),
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_sets_rowcount() {
        let env = ResultEnvelope::rows(
            vec!["a".into()],
            vec![vec![Some("1".into())], vec![None]],
        );
        assert!(env.success);
        assert_eq!(env.rowcount, 2);
    }

    #[test]
    fn status_has_single_row() {
        let env = ResultEnvelope::status("Table T successfully created.");
        assert_eq!(env.columns, vec!["status"]);
        assert_eq!(env.data.len(), 1);
        assert_eq!(env.message.as_deref(), Some("Table T successfully created."));
    }

    #[test]
    fn error_is_unsuccessful() {
        let env = ResultEnvelope::error("boom");
        assert!(!env.success);
        assert_eq!(env.error.as_deref(), Some("boom"));
        assert_eq!(env.rowcount, 0);
    }
}
