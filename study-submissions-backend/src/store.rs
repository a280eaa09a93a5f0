use async_trait::async_trait;

use crate::error::{InsertError, InsertStudyError, StoreError};
use crate::models::{NewStudy, Study, StudyId, Submission, SubmissionCandidate};

/// Durable record store behind the allocator.
///
/// Implementations must enforce uniqueness of `(study_id, user_id)` and of
/// `(study_id, slot_number)` atomically inside
/// [`insert_submission`](Store::insert_submission) and report which one was
/// violated. Everything else may be served from an eventually consistent read.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_study(&self, id: StudyId) -> Result<Option<Study>, StoreError>;

    async fn insert_study(&self, study: NewStudy) -> Result<Study, InsertStudyError>;

    /// Studies ordered by id, optionally only those of `owner`.
    async fn list_studies(&self, owner: Option<&str>) -> Result<Vec<Study>, StoreError>;

    async fn count_submissions(&self, study_id: StudyId) -> Result<u32, StoreError>;

    async fn find_submission(
        &self,
        study_id: StudyId,
        user_id: &str,
    ) -> Result<Option<Submission>, StoreError>;

    async fn insert_submission(
        &self,
        candidate: SubmissionCandidate,
    ) -> Result<Submission, InsertError>;

    /// Submissions of `user_id` across all studies, oldest first.
    async fn list_submissions(&self, user_id: &str) -> Result<Vec<Submission>, StoreError>;
}
