use std::time::{SystemTime, UNIX_EPOCH};

use study_submissions_backend::{Allocator, NewStudy};
use study_submissions_config::get_config;
use study_submissions_database::{migrate, PgStore};
use study_submissions_e2e::{retry_policy, run_contention};
use study_submissions_telemetry::setup_telemetry;
use tracing::{error, info};

// podman run --rm --detach --name postgres-testing --env POSTGRES_HOST_AUTH_METHOD=trust --publish 5432:5432 docker.io/postgres
// STUDY_DATABASE_URL=postgres://postgres@localhost/postgres cargo run -p study-submissions-e2e

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> Result<()> {
    setup_telemetry();
    let config = get_config()?;

    migrate(&config.database_url).await?;
    let store = PgStore::connect(&config.database_url)?;
    let allocator = Allocator::new(store, retry_policy(&config.allocator));

    let suffix = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
    let study = allocator
        .create_study(NewStudy {
            name: format!("contention-{suffix}"),
            available_places: config.contention.available_places,
            owner: "e2e".to_owned(),
        })
        .await?;
    info!(study_id = %study.id, requests = config.contention.requests, "starting burst");

    let report = run_contention(&allocator, study.id, config.contention.requests).await;
    info!(
        succeeded = report.succeeded(),
        duplicates = report.duplicates,
        capacity_exceeded = report.capacity_exceeded,
        exhausted = report.exhausted,
        dense = report.is_dense(),
        "burst finished"
    );
    for failure in &report.failed {
        error!(%failure, "request failed");
    }

    let over_allocated = report.succeeded() > study.available_places as usize;
    if over_allocated || !report.is_dense() || !report.failed.is_empty() {
        return Err(format!("inconsistent allocation: {report:?}").into());
    }
    Ok(())
}
