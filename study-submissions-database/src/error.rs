use diesel_async::pooled_connection::deadpool;
use study_submissions_backend::StoreError;
use thiserror::Error;

#[allow(clippy::module_name_repetitions)]
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to create database pool {0}")]
    PoolBuild(#[from] deadpool::BuildError),
    #[error("Database pool failed {0}")]
    Pool(#[from] deadpool::PoolError),
    #[error("Database query failed {0}")]
    Database(#[from] diesel::result::Error),
    #[error("Database connection failed {0}")]
    Connection(#[from] diesel::ConnectionError),
    #[error("Database migration failed {0}")]
    Migration(Box<dyn std::error::Error + Send + Sync>),
    #[error("Database migration task failed {0}")]
    MigrationTask(#[from] tokio::task::JoinError),
}

impl From<DatabaseError> for StoreError {
    fn from(value: DatabaseError) -> Self {
        Self::backend(value)
    }
}
