//! Cronjob module for scheduled tasks.
//!
//! This module runs the scheduled-tweet publisher: tweets created with a
//! `scheduledDate` stay hidden until this job clears the date once it has
//! passed.

use chrono::Utc;
use log::{error, info};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::error::TweetResult;
use crate::tweets::TweetService;

/// Runs one publishing pass and logs its outcome.
///
/// Failures are logged and swallowed so the next tick gets a fresh attempt.
pub async fn run_publish_job(service: &TweetService) {
    info!("Starting scheduled tweet publishing");
    match service.publish_due(Utc::now()).await {
        Ok(published) if published.is_empty() => {
            info!("No scheduled tweets are due");
        }
        Ok(published) => {
            info!(
                "Scheduled tweet publishing completed: {} tweets published ({:?})",
                published.len(),
                published
            );
        }
        Err(e) => {
            error!("Scheduled tweet publishing failed: {}", e);
        }
    }
}

/// Creates the scheduler running [`run_publish_job`] on `cron`.
///
/// The scheduler is returned unstarted.
///
/// # Job Schedule
///
/// The default expression `"0 * * * * *"` fires at second 0 of every minute
/// (fields: seconds, minutes, hours, day of month, month, day of week).
///
/// # Errors
///
/// This function can fail if:
/// - The job scheduler cannot be created
/// - The cron expression is invalid
/// - There's an error adding the job to the scheduler
pub async fn start_publish_cronjob(service: TweetService, cron: &str) -> TweetResult<JobScheduler> {
    let sched = JobScheduler::new().await?;

    sched
        .add(Job::new_async(cron, move |_uuid, _l| {
            let service = service.clone();
            Box::pin(async move {
                run_publish_job(&service).await;
            })
        })?)
        .await?;

    info!("Scheduled tweet publisher registered with schedule '{}'", cron);
    Ok(sched)
}
