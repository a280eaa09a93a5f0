use std::collections::BTreeSet;
use std::time::Duration;

use futures_util::future::join_all;
use study_submissions_backend::{Allocator, RetryPolicy, Store, StudyId, SubmissionError};
use study_submissions_config::AllocatorConfig;

#[must_use]
pub fn retry_policy(config: &AllocatorConfig) -> RetryPolicy {
    RetryPolicy::new(
        config.max_attempts,
        config.deadline_ms.map(Duration::from_millis),
    )
}

/// Outcome of a burst of concurrent submissions against one study.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContentionReport {
    pub slots: BTreeSet<u32>,
    pub duplicates: u32,
    pub capacity_exceeded: u32,
    pub exhausted: u32,
    pub failed: Vec<String>,
}

impl ContentionReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.slots.len()
    }

    /// Slots are exactly `0..succeeded`.
    #[must_use]
    pub fn is_dense(&self) -> bool {
        self.slots
            .iter()
            .copied()
            .eq(0..u32::try_from(self.slots.len()).unwrap_or(u32::MAX))
    }
}

/// Fires `requests` concurrent submissions from distinct users.
pub async fn run_contention<S>(
    allocator: &Allocator<S>,
    study_id: StudyId,
    requests: u32,
) -> ContentionReport
where
    S: Store + Clone + 'static,
{
    let tasks = (0..requests).map(|request| {
        let allocator = allocator.clone();
        tokio::spawn(async move {
            allocator
                .create_submission(study_id, &format!("user_{request}"))
                .await
        })
    });

    let mut report = ContentionReport::default();
    for result in join_all(tasks).await {
        match result {
            Ok(Ok(submission)) => {
                if !report.slots.insert(submission.slot_number) {
                    report
                        .failed
                        .push(format!("slot {} handed out twice", submission.slot_number));
                }
            }
            Ok(Err(SubmissionError::DuplicateSubmission { .. })) => report.duplicates += 1,
            Ok(Err(SubmissionError::CapacityExceeded { .. })) => report.capacity_exceeded += 1,
            Ok(Err(SubmissionError::Exhausted { .. })) => report.exhausted += 1,
            Ok(Err(error)) => report.failed.push(error.to_string()),
            Err(error) => report.failed.push(error.to_string()),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use study_submissions_backend::{MemoryStore, NewStudy};

    use super::*;

    #[test]
    fn allocator_config_maps_to_retry_policy() {
        let policy = retry_policy(&AllocatorConfig {
            max_attempts: 0,
            deadline_ms: Some(250),
        });
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.deadline(), Some(Duration::from_millis(250)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn memory_store_burst_is_dense() {
        let allocator = Allocator::new(MemoryStore::new(), RetryPolicy::default());
        let study = allocator
            .create_study(NewStudy {
                name: "Study 1".to_owned(),
                available_places: 10,
                owner: "user_1".to_owned(),
            })
            .await
            .unwrap();

        let report = run_contention(&allocator, study.id, 50).await;
        assert_eq!(report.succeeded(), 10);
        assert!(report.is_dense());
        assert_eq!(report.capacity_exceeded, 40);
        assert_eq!(report.exhausted, 0);
        assert!(report.failed.is_empty(), "{:?}", report.failed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn repeated_burst_counts_duplicates() {
        let allocator = Allocator::new(MemoryStore::new(), RetryPolicy::default());
        let study = allocator
            .create_study(NewStudy {
                name: "Study 1".to_owned(),
                available_places: 10,
                owner: "user_1".to_owned(),
            })
            .await
            .unwrap();
        assert_eq!(run_contention(&allocator, study.id, 5).await.succeeded(), 5);

        let report = run_contention(&allocator, study.id, 8).await;
        assert_eq!(report.duplicates, 5);
        assert_eq!(report.slots, (5..8).collect());
        assert_eq!(report.capacity_exceeded, 0);
        assert!(report.failed.is_empty(), "{:?}", report.failed);
    }
}
