use super::repository::RepositoryError;

pub type TimetableResult<T> = Result<T, TimetableError>;

#[derive(Debug, thiserror::Error)]
pub enum TimetableError {
    /// No grade group yields template rows for this grade.
    #[error("no period timing configured for grade {grade} (tried {})", candidates.join(", "))]
    ConfigMissing {
        grade: String,
        candidates: Vec<String>,
    },

    #[error("cannot copy a timetable onto the same section ({0})")]
    SameSection(String),

    #[error("{0}")]
    Validation(String),

    /// A write did not commit. In-memory state is untouched.
    #[error("save failed, changes preserved, retry: {0}")]
    TransactionFailure(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl TimetableError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigMissing { .. } => "config_missing",
            Self::SameSection(_) => "same_section",
            Self::Validation(_) => "validation_failed",
            Self::TransactionFailure(_) => "transaction_failed",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::ConfigMissing { grade, candidates } => Some(serde_json::json!({
                "grade": grade,
                "candidates": candidates,
                "action": "timingSetup"
            })),
            Self::SameSection(id) => Some(serde_json::json!({ "sectionId": id })),
            _ => None,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
