use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{ConstraintViolation, InsertError, InsertStudyError, StoreError};
use crate::models::{NewStudy, Study, StudyId, Submission, SubmissionCandidate, SubmissionId};
use crate::store::Store;

#[derive(Debug, Default)]
struct Tables {
    studies: BTreeMap<StudyId, Study>,
    study_names: HashSet<String>,
    submissions: Vec<Submission>,
    user_index: HashMap<(StudyId, String), usize>,
    slot_index: HashSet<(StudyId, u32)>,
    next_study_id: i64,
    next_submission_id: i64,
}

/// In-process [`Store`]. Clones share the same tables.
///
/// Both uniqueness constraints are checked and the row is written under one
/// lock, which gives the same atomicity a database unique index does.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_study(&self, id: StudyId) -> Result<Option<Study>, StoreError> {
        Ok(self.lock()?.studies.get(&id).cloned())
    }

    async fn insert_study(&self, study: NewStudy) -> Result<Study, InsertStudyError> {
        let mut tables = self.lock()?;
        if !tables.study_names.insert(study.name.clone()) {
            return Err(InsertStudyError::DuplicateName(study.name));
        }
        tables.next_study_id += 1;
        let study = Study {
            id: StudyId(tables.next_study_id),
            name: study.name,
            available_places: study.available_places,
            owner: study.owner,
        };
        tables.studies.insert(study.id, study.clone());
        Ok(study)
    }

    async fn list_studies(&self, owner: Option<&str>) -> Result<Vec<Study>, StoreError> {
        Ok(self
            .lock()?
            .studies
            .values()
            .filter(|study| owner.map_or(true, |owner| study.owner == owner))
            .cloned()
            .collect())
    }

    async fn count_submissions(&self, study_id: StudyId) -> Result<u32, StoreError> {
        let count = self
            .lock()?
            .submissions
            .iter()
            .filter(|submission| submission.study_id == study_id)
            .count();
        u32::try_from(count).map_err(|_| StoreError::InvalidRow(format!("{count} submissions")))
    }

    async fn find_submission(
        &self,
        study_id: StudyId,
        user_id: &str,
    ) -> Result<Option<Submission>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .user_index
            .get(&(study_id, user_id.to_owned()))
            .map(|&index| tables.submissions[index].clone()))
    }

    async fn insert_submission(
        &self,
        candidate: SubmissionCandidate,
    ) -> Result<Submission, InsertError> {
        let mut tables = self.lock()?;
        let study_id = candidate.study_id();
        if !tables.studies.contains_key(&study_id) {
            return Err(InsertError::StudyMissing(study_id));
        }
        let user_key = (study_id, candidate.user_id().to_owned());
        if tables.user_index.contains_key(&user_key) {
            return Err(InsertError::Violation(ConstraintViolation::UserUnique));
        }
        if !tables.slot_index.insert((study_id, candidate.slot_number())) {
            return Err(InsertError::Violation(ConstraintViolation::SlotUnique));
        }

        tables.next_submission_id += 1;
        let submission = Submission {
            id: SubmissionId(tables.next_submission_id),
            study_id,
            user_id: user_key.1.clone(),
            created_at: Utc::now(),
            slot_number: candidate.slot_number(),
        };
        let index = tables.submissions.len();
        tables.submissions.push(submission.clone());
        tables.user_index.insert(user_key, index);
        Ok(submission)
    }

    async fn list_submissions(&self, user_id: &str) -> Result<Vec<Submission>, StoreError> {
        // insertion order is creation order
        Ok(self
            .lock()?
            .submissions
            .iter()
            .filter(|submission| submission.user_id == user_id)
            .cloned()
            .collect())
    }
}
