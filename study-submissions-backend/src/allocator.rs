use core::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::{ConstraintViolation, InsertError, StudyError, SubmissionError};
use crate::models::{NewStudy, Study, StudyId, Submission, SubmissionCandidate};
use crate::store::Store;

/// Bounds the optimistic retry loop of [`Allocator::create_submission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    deadline: Option<Duration>,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, deadline: Option<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            deadline,
        }
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(32, None)
    }
}

/// `None` when the timeout reaches past what `Instant` can represent.
fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Hands out study places without any in-process lock.
///
/// The slot number of a new submission is the occupancy observed just before
/// the insert. Two requests that observe the same occupancy collide on the
/// store's `(study_id, slot_number)` constraint, exactly one of them commits
/// and the other one retries with a fresh count. Capacity holds because every
/// candidate slot is below `available_places` and slots are unique.
#[derive(Debug, Clone)]
pub struct Allocator<S> {
    store: S,
    policy: RetryPolicy,
}

impl<S: Store> Allocator<S> {
    pub const fn new(store: S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    #[instrument(skip(self))]
    pub async fn create_submission(
        &self,
        study_id: StudyId,
        user_id: &str,
    ) -> Result<Submission, SubmissionError> {
        let deadline = self.policy.deadline.and_then(deadline_after);
        self.allocate(study_id, user_id, deadline).await
    }

    /// Like [`create_submission`](Self::create_submission) but stops retrying
    /// at `deadline`, or earlier if the policy's own deadline is shorter.
    #[instrument(skip(self))]
    pub async fn create_submission_before(
        &self,
        study_id: StudyId,
        user_id: &str,
        deadline: Instant,
    ) -> Result<Submission, SubmissionError> {
        let deadline = match self.policy.deadline.and_then(deadline_after) {
            Some(policy_deadline) => deadline.min(policy_deadline),
            None => deadline,
        };
        self.allocate(study_id, user_id, Some(deadline)).await
    }

    async fn allocate(
        &self,
        study_id: StudyId,
        user_id: &str,
        deadline: Option<Instant>,
    ) -> Result<Submission, SubmissionError> {
        if user_id.trim().is_empty() {
            return Err(SubmissionError::InvalidUser(user_id.to_owned()));
        }
        let study = self
            .store
            .get_study(study_id)
            .await?
            .ok_or(SubmissionError::NotFound(study_id))?;

        let mut attempts = 0;
        while attempts < self.policy.max_attempts {
            if attempts > 0 && deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                break;
            }
            attempts += 1;

            let occupied = self.store.count_submissions(study_id).await?;
            let Some(candidate) = SubmissionCandidate::for_slot(&study, user_id, occupied) else {
                return Err(self.reject_full(&study, user_id).await);
            };

            match self.store.insert_submission(candidate).await {
                Ok(submission) => {
                    info!(
                        slot_number = submission.slot_number,
                        attempts, "submission created"
                    );
                    return Ok(submission);
                }
                Err(InsertError::Violation(ConstraintViolation::SlotUnique)) => {
                    debug!(slot_number = occupied, attempts, "slot taken, retrying");
                    tokio::task::yield_now().await;
                }
                Err(InsertError::Violation(ConstraintViolation::UserUnique)) => {
                    return Err(SubmissionError::DuplicateSubmission {
                        study_id,
                        user_id: user_id.to_owned(),
                    });
                }
                Err(InsertError::StudyMissing(study_id)) => {
                    return Err(SubmissionError::NotFound(study_id));
                }
                Err(InsertError::Store(error)) => return Err(error.into()),
            }
        }

        warn!(attempts, "retry budget exhausted");
        Err(SubmissionError::Exhausted { study_id, attempts })
    }

    /// A full study still reports a repeated submission as a duplicate.
    async fn reject_full(&self, study: &Study, user_id: &str) -> SubmissionError {
        match self.store.find_submission(study.id, user_id).await {
            Ok(Some(_)) => SubmissionError::DuplicateSubmission {
                study_id: study.id,
                user_id: user_id.to_owned(),
            },
            Ok(None) => SubmissionError::CapacityExceeded {
                study_id: study.id,
                available_places: study.available_places,
            },
            Err(error) => error.into(),
        }
    }

    #[instrument(skip(self))]
    pub async fn create_study(&self, study: NewStudy) -> Result<Study, StudyError> {
        let study = NewStudy {
            name: study.name.trim().to_owned(),
            ..study
        };
        if study.name.is_empty() {
            return Err(StudyError::InvalidParameter {
                param: "name",
                value: study.name,
            });
        }
        if study.available_places == 0 {
            return Err(StudyError::InvalidParameter {
                param: "available_places",
                value: study.available_places.to_string(),
            });
        }
        if study.owner.trim().is_empty() {
            return Err(StudyError::InvalidParameter {
                param: "owner",
                value: study.owner,
            });
        }
        let study = self.store.insert_study(study).await?;
        info!(study_id = %study.id, "study created");
        Ok(study)
    }

    pub async fn get_study(&self, study_id: StudyId) -> Result<Study, SubmissionError> {
        self.store
            .get_study(study_id)
            .await?
            .ok_or(SubmissionError::NotFound(study_id))
    }

    pub async fn list_studies(&self, owner: Option<&str>) -> Result<Vec<Study>, StudyError> {
        Ok(self.store.list_studies(owner).await?)
    }

    pub async fn list_submissions(&self, user_id: &str) -> Result<Vec<Submission>, SubmissionError> {
        Ok(self.store.list_submissions(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_needs_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, None).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(5, None).max_attempts(), 5);
    }

    #[test]
    fn unrepresentable_deadline_means_no_deadline() {
        assert!(deadline_after(Duration::MAX).is_none());
        assert!(deadline_after(Duration::from_millis(5)).is_some());
    }

    #[test]
    fn default_retry_policy_has_no_deadline() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 32);
        assert_eq!(policy.deadline(), None);
    }
}
