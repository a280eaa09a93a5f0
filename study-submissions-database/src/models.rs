use chrono::{DateTime, Utc};
use diesel::prelude::*;
use study_submissions_backend::{StoreError, Study, StudyId, Submission, SubmissionId};

use crate::schema::{studies, submissions};

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = studies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StudyRow {
    pub id: i64,
    pub name: String,
    pub available_places: i32,
    pub owner: String,
}

#[derive(Insertable)]
#[diesel(table_name = studies)]
pub struct NewStudyRow<'a> {
    pub name: &'a str,
    pub available_places: i32,
    pub owner: &'a str,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = submissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SubmissionRow {
    pub id: i64,
    pub study_id: i64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub slot_number: i32,
}

#[derive(Insertable)]
#[diesel(table_name = submissions)]
pub struct NewSubmissionRow<'a> {
    pub study_id: i64,
    pub user_id: &'a str,
    pub slot_number: i32,
}

impl TryFrom<StudyRow> for Study {
    type Error = StoreError;

    fn try_from(row: StudyRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: StudyId(row.id),
            available_places: u32::try_from(row.available_places).map_err(|_| {
                StoreError::InvalidRow(format!(
                    "study {} has {} available places",
                    row.id, row.available_places
                ))
            })?,
            name: row.name,
            owner: row.owner,
        })
    }
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = StoreError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SubmissionId(row.id),
            study_id: StudyId(row.study_id),
            slot_number: u32::try_from(row.slot_number).map_err(|_| {
                StoreError::InvalidRow(format!(
                    "submission {} has slot number {}",
                    row.id, row.slot_number
                ))
            })?,
            user_id: row.user_id,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_columns_are_invalid_rows() {
        let study = StudyRow {
            id: 1,
            name: "Study 1".to_owned(),
            available_places: -2,
            owner: "user_1".to_owned(),
        };
        assert!(matches!(
            Study::try_from(study),
            Err(StoreError::InvalidRow(_))
        ));

        let submission = SubmissionRow {
            id: 1,
            study_id: 1,
            user_id: "user_2".to_owned(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            slot_number: -1,
        };
        assert!(matches!(
            Submission::try_from(submission),
            Err(StoreError::InvalidRow(_))
        ));
    }

    #[test]
    fn rows_convert_to_models() {
        let submission = Submission::try_from(SubmissionRow {
            id: 3,
            study_id: 1,
            user_id: "user_2".to_owned(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            slot_number: 4,
        })
        .unwrap();
        assert_eq!(submission.id, SubmissionId(3));
        assert_eq!(submission.study_id, StudyId(1));
        assert_eq!(submission.slot_number, 4);
    }
}
