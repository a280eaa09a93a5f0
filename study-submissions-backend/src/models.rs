use core::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudyId(pub i64);

impl Display for StudyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub i64);

impl Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Study {
    pub id: StudyId,
    pub name: String,
    pub available_places: u32,
    pub owner: String,
}

impl Study {
    #[must_use]
    pub const fn has_room_for(&self, slot_number: u32) -> bool {
        slot_number < self.available_places
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStudy {
    pub name: String,
    pub available_places: u32,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub study_id: StudyId,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    /// Zero based position in commit order within the study.
    pub slot_number: u32,
}

/// A submission waiting for the conditional insert.
///
/// Only the allocator can build one, and only with a slot number below the
/// study's capacity, so stores never see an out of range slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionCandidate {
    study_id: StudyId,
    user_id: String,
    slot_number: u32,
}

impl SubmissionCandidate {
    pub(crate) fn for_slot(study: &Study, user_id: &str, slot_number: u32) -> Option<Self> {
        study.has_room_for(slot_number).then(|| Self {
            study_id: study.id,
            user_id: user_id.to_owned(),
            slot_number,
        })
    }

    #[must_use]
    pub const fn study_id(&self) -> StudyId {
        self.study_id
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub const fn slot_number(&self) -> u32 {
        self.slot_number
    }
}
