use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

use crate::crypto::CryptoError;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("password_key must be exactly 16 bytes, got {0}")]
    BadKeyLength(usize),
}

#[derive(Debug, Error)]
pub enum EduError {
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("a user with email {0} already exists")]
    UserExists(String),
    #[error("{0}")]
    RoleMismatch(String),
    #[error("{0}")]
    Invalid(String),
    #[error("deadline passed on {0}")]
    DeadlinePassed(NaiveDate),
    #[error("no submission from student {0}")]
    NoSubmission(String),
}

impl EduError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EduError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable code reported to the GUI.
    pub fn code(&self) -> &'static str {
        match self {
            EduError::Write { .. } | EduError::Json(_) => "storage_failed",
            EduError::Crypto(_) => "crypto_failed",
            EduError::NotFound { .. } => "not_found",
            EduError::UserExists(_) => "user_exists",
            EduError::RoleMismatch(_) => "role_mismatch",
            EduError::Invalid(_) => "invalid",
            EduError::DeadlinePassed(_) => "deadline_passed",
            EduError::NoSubmission(_) => "no_submission",
        }
    }
}

pub type EduResult<T> = Result<T, EduError>;
