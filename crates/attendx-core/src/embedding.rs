use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Length every enrolled and probe vector is expected to carry. The
/// extractor contract produces vectors of exactly this length; anything
/// else in the store indicates corrupted persisted state.
pub const EMBEDDING_LEN: usize = 128;

/// Fixed-length face feature vector. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f64>);

impl Embedding {
    /// Wraps a raw vector without length enforcement. Persisted data may
    /// be corrupt; the matcher checks shape and reports which side failed.
    pub fn from_raw(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }
}

pub fn validate_student_id(student: &str) -> AppResult<()> {
    if student.is_empty() {
        return Err(AppError::InvalidStudentId {
            student: student.to_string(),
            message: "identity cannot be empty".into(),
        });
    }

    if !student
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(AppError::InvalidStudentId {
            student: student.to_string(),
            message: "use ASCII letters, numbers, '-' or '_' only".into(),
        });
    }

    Ok(())
}
