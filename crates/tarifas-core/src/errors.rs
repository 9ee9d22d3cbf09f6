use thiserror::Error;

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Header shape did not match any known layout. Raised before persistence.
    #[error("unexpected table format: {0}")]
    UnexpectedFormat(String),

    /// Distinct route count below the sanity threshold. Raised before persistence.
    #[error("too few routes: found {found}, expected at least {expected}")]
    TooFewRoutes { found: usize, expected: usize },

    /// A single record's numeric field failed to parse. Never fatal for a run.
    #[error("unparseable {field}: {raw:?}")]
    UnparseableValue { field: &'static str, raw: String },

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl IngestError {
    pub fn unexpected_format(message: impl Into<String>) -> Self {
        Self::UnexpectedFormat(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Structural errors abort a run before anything is written.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            IngestError::UnexpectedFormat(_) | IngestError::TooFewRoutes { .. }
        )
    }
}

impl From<rusqlite::Error> for IngestError {
    fn from(e: rusqlite::Error) -> Self {
        IngestError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        IngestError::Persistence(format!("failed to serialize run parameters: {}", e))
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ConfigError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_errors_are_flagged() {
        assert!(IngestError::unexpected_format("no route column").is_structural());
        assert!(IngestError::TooFewRoutes {
            found: 3,
            expected: 120
        }
        .is_structural());
        assert!(!IngestError::persistence("disk full").is_structural());
    }

    #[test]
    fn too_few_routes_message_names_both_counts() {
        let e = IngestError::TooFewRoutes {
            found: 7,
            expected: 120,
        };
        assert_eq!(
            e.to_string(),
            "too few routes: found 7, expected at least 120"
        );
    }
}
