use core::fmt::{self, Display};

use crate::models::StudyId;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store backend failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("stored row is invalid: {0}")]
    InvalidRow(String),
}

impl StoreError {
    pub fn backend(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(error))
    }
}

/// The uniqueness constraint a rejected insert ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintViolation {
    /// `(study_id, user_id)` is taken.
    UserUnique,
    /// `(study_id, slot_number)` is taken.
    SlotUnique,
}

impl Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UserUnique => "user_unique",
            Self::SlotUnique => "slot_unique",
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InsertError {
    #[error("constraint {0} violated")]
    Violation(ConstraintViolation),
    #[error("study {0} does not exist")]
    StudyMissing(StudyId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(thiserror::Error, Debug)]
pub enum InsertStudyError {
    #[error("a study named {0:?} already exists")]
    DuplicateName(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(thiserror::Error, Debug)]
pub enum SubmissionError {
    #[error("{0:?} is an invalid value for the parameter user")]
    InvalidUser(String),
    #[error("study {0} not found")]
    NotFound(StudyId),
    #[error("user {user_id:?} already has a submission for study {study_id}")]
    DuplicateSubmission { study_id: StudyId, user_id: String },
    #[error("study {study_id} has no places left out of {available_places}")]
    CapacityExceeded {
        study_id: StudyId,
        available_places: u32,
    },
    #[error("gave up on study {study_id} after {attempts} contended attempts")]
    Exhausted { study_id: StudyId, attempts: u32 },
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

#[derive(thiserror::Error, Debug)]
pub enum StudyError {
    #[error("{value:?} is an invalid value for the parameter {param}")]
    InvalidParameter { param: &'static str, value: String },
    #[error("a study named {0:?} already exists")]
    DuplicateName(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl From<InsertStudyError> for StudyError {
    fn from(value: InsertStudyError) -> Self {
        match value {
            InsertStudyError::DuplicateName(name) => Self::DuplicateName(name),
            InsertStudyError::Store(error) => Self::StoreUnavailable(error),
        }
    }
}
