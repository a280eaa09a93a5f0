pub mod error;
pub mod models;
pub mod schema;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::pooled_connection::deadpool::{Object, Pool as DeadPool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
pub use error::DatabaseError;
use schema::{studies, submissions};
use study_submissions_backend::{
    ConstraintViolation, InsertError, InsertStudyError, NewStudy, Store, StoreError, Study,
    StudyId, Submission, SubmissionCandidate,
};
use tracing::{debug, info};

use crate::models::{NewStudyRow, NewSubmissionRow, StudyRow, SubmissionRow};

pub type Pool = DeadPool<AsyncPgConnection>;

pub const STUDY_NAME_CONSTRAINT: &str = "studies_name_unique";
pub const SUBMISSION_USER_CONSTRAINT: &str = "submissions_study_user_unique";
pub const SUBMISSION_SLOT_CONSTRAINT: &str = "submissions_study_slot_unique";

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

// https://github.com/tokio-rs/axum/tree/main/examples/diesel-async-postgres

pub fn get_database_connection(database_url: &str) -> Result<Pool, DatabaseError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    Ok(Pool::builder(config).build()?)
}

/// Applies the pending embedded migrations.
///
/// The migration harness is synchronous, so it runs on a blocking thread over
/// its own connection instead of a pooled one.
pub async fn migrate(database_url: &str) -> Result<(), DatabaseError> {
    let database_url = database_url.to_owned();
    tokio::task::spawn_blocking(move || {
        let mut connection =
            AsyncConnectionWrapper::<AsyncPgConnection>::establish(&database_url)?;
        let applied = connection
            .run_pending_migrations(MIGRATIONS)
            .map_err(DatabaseError::Migration)?;
        for version in applied {
            info!(%version, "migration applied");
        }
        Ok::<_, DatabaseError>(())
    })
    .await?
}

fn unique_violation(error: &diesel::result::Error) -> Option<&str> {
    match error {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            Some(info.constraint_name().unwrap_or_default())
        }
        _ => None,
    }
}

fn out_of_range(column: &str, value: u32) -> StoreError {
    StoreError::InvalidRow(format!("{column} {value} does not fit into the database"))
}

/// PostgreSQL [`Store`] on top of a deadpool of diesel-async connections.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn connect(database_url: &str) -> Result<Self, DatabaseError> {
        Ok(Self::new(get_database_connection(database_url)?))
    }

    async fn connection(&self) -> Result<Object<AsyncPgConnection>, StoreError> {
        Ok(self.pool.get().await.map_err(DatabaseError::from)?)
    }
}

fn query_failed(error: diesel::result::Error) -> StoreError {
    DatabaseError::from(error).into()
}

#[async_trait]
impl Store for PgStore {
    async fn get_study(&self, id: StudyId) -> Result<Option<Study>, StoreError> {
        let mut connection = self.connection().await?;
        studies::table
            .find(id.0)
            .select(StudyRow::as_select())
            .first::<StudyRow>(&mut connection)
            .await
            .optional()
            .map_err(query_failed)?
            .map(Study::try_from)
            .transpose()
    }

    async fn insert_study(&self, study: NewStudy) -> Result<Study, InsertStudyError> {
        let available_places = i32::try_from(study.available_places)
            .map_err(|_| out_of_range("available_places", study.available_places))?;
        let mut connection = self.connection().await?;
        let result = diesel::insert_into(studies::table)
            .values(NewStudyRow {
                name: &study.name,
                available_places,
                owner: &study.owner,
            })
            .returning(StudyRow::as_returning())
            .get_result::<StudyRow>(&mut connection)
            .await;
        match result {
            Ok(row) => Ok(Study::try_from(row)?),
            Err(error) if unique_violation(&error) == Some(STUDY_NAME_CONSTRAINT) => {
                Err(InsertStudyError::DuplicateName(study.name))
            }
            Err(error) => Err(query_failed(error).into()),
        }
    }

    async fn list_studies(&self, owner: Option<&str>) -> Result<Vec<Study>, StoreError> {
        let mut connection = self.connection().await?;
        let mut query = studies::table
            .select(StudyRow::as_select())
            .order(studies::id)
            .into_boxed();
        if let Some(owner) = owner {
            query = query.filter(studies::owner.eq(owner));
        }
        query
            .load::<StudyRow>(&mut connection)
            .await
            .map_err(query_failed)?
            .into_iter()
            .map(Study::try_from)
            .collect()
    }

    async fn count_submissions(&self, study_id: StudyId) -> Result<u32, StoreError> {
        let mut connection = self.connection().await?;
        let count: i64 = submissions::table
            .filter(submissions::study_id.eq(study_id.0))
            .count()
            .get_result(&mut connection)
            .await
            .map_err(query_failed)?;
        u32::try_from(count).map_err(|_| {
            StoreError::InvalidRow(format!("study {study_id} has {count} submissions"))
        })
    }

    async fn find_submission(
        &self,
        study_id: StudyId,
        user_id: &str,
    ) -> Result<Option<Submission>, StoreError> {
        let mut connection = self.connection().await?;
        submissions::table
            .filter(submissions::study_id.eq(study_id.0))
            .filter(submissions::user_id.eq(user_id))
            .select(SubmissionRow::as_select())
            .first::<SubmissionRow>(&mut connection)
            .await
            .optional()
            .map_err(query_failed)?
            .map(Submission::try_from)
            .transpose()
    }

    async fn insert_submission(
        &self,
        candidate: SubmissionCandidate,
    ) -> Result<Submission, InsertError> {
        let slot_number = i32::try_from(candidate.slot_number())
            .map_err(|_| out_of_range("slot_number", candidate.slot_number()))?;
        let mut connection = self.connection().await?;
        let result = diesel::insert_into(submissions::table)
            .values(NewSubmissionRow {
                study_id: candidate.study_id().0,
                user_id: candidate.user_id(),
                slot_number,
            })
            .returning(SubmissionRow::as_returning())
            .get_result::<SubmissionRow>(&mut connection)
            .await;
        match result {
            Ok(row) => Ok(Submission::try_from(row)?),
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)) => {
                Err(InsertError::StudyMissing(candidate.study_id()))
            }
            Err(error) => {
                let violation = match unique_violation(&error) {
                    Some(SUBMISSION_USER_CONSTRAINT) => Some(ConstraintViolation::UserUnique),
                    Some(SUBMISSION_SLOT_CONSTRAINT) => Some(ConstraintViolation::SlotUnique),
                    _ => None,
                };
                if let Some(violation) = violation {
                    return Err(InsertError::Violation(violation));
                }
                debug!(%error, "submission insert failed");
                Err(query_failed(error).into())
            }
        }
    }

    async fn list_submissions(&self, user_id: &str) -> Result<Vec<Submission>, StoreError> {
        let mut connection = self.connection().await?;
        submissions::table
            .filter(submissions::user_id.eq(user_id))
            .order((submissions::created_at, submissions::id))
            .select(SubmissionRow::as_select())
            .load::<SubmissionRow>(&mut connection)
            .await
            .map_err(query_failed)?
            .into_iter()
            .map(Submission::try_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use diesel::result::{DatabaseErrorInformation, Error};

    use super::*;

    struct Violated(&'static str);

    impl DatabaseErrorInformation for Violated {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn details(&self) -> Option<&str> {
            None
        }

        fn hint(&self) -> Option<&str> {
            None
        }

        fn table_name(&self) -> Option<&str> {
            Some("submissions")
        }

        fn column_name(&self) -> Option<&str> {
            None
        }

        fn constraint_name(&self) -> Option<&str> {
            Some(self.0)
        }

        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    #[test]
    fn schema_migration_is_embedded() {
        use diesel::migration::MigrationSource;
        use diesel::pg::Pg;

        let migrations = MigrationSource::<Pg>::migrations(&MIGRATIONS).unwrap();
        assert_eq!(migrations.len(), 1);
    }

    #[test]
    fn unique_violations_are_classified_by_constraint_name() {
        let error = Error::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new(Violated(SUBMISSION_SLOT_CONSTRAINT)),
        );
        assert_eq!(unique_violation(&error), Some(SUBMISSION_SLOT_CONSTRAINT));

        let error = Error::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation,
            Box::new(Violated("submissions_study_id_fkey")),
        );
        assert_eq!(unique_violation(&error), None);
        assert_eq!(unique_violation(&Error::NotFound), None);
    }
}
