//! Background jobs run on a periodic interval
use async_trait::async_trait;
use std::time::Duration;
use tokio_rusqlite::Connection;

use crate::core::AppConfig;

mod send_due_tasks;
pub use send_due_tasks::{SendDueTasks, run_due_tasks};

#[async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    /// How often the job runs
    fn interval(&self) -> Duration;

    /// One iteration of the job. Errors are handled inside so a failed run
    /// never kills the loop.
    async fn run_job(&self, config: &AppConfig, db: &Connection);
}

/// Spawn a job in its own tokio task, running forever at its interval
pub fn spawn_periodic_job<J: PeriodicJob>(config: AppConfig, db: Connection, job: J) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(job.interval());
        loop {
            interval.tick().await;
            job.run_job(&config, &db).await;
        }
    });
}
