//! Cron-driven organize loop.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::config::OrganizerConfig;
use crate::error::PipelineError;
use crate::pipeline::MailOrganizer;

/// Upper bound on a single sleep, so shutdown is noticed promptly.
const SHUTDOWN_POLL: Duration = Duration::from_secs(1);

/// Accept classic 5-field cron by prefixing a seconds field.
pub fn normalize_cron(expr: &str) -> String {
    let expr = expr.trim();
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

/// Next fire time after now, in UTC.
pub fn next_fire(schedule: &str) -> Result<Option<DateTime<Utc>>, PipelineError> {
    let cron_schedule = cron::Schedule::from_str(&normalize_cron(schedule)).map_err(|e| {
        PipelineError::Schedule {
            schedule: schedule.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(cron_schedule.upcoming(Utc).next())
}

/// Spawn the organize loop.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop the loop;
/// a run already in progress finishes first.
pub fn spawn_organizer(
    organizer: Arc<MailOrganizer>,
    config: OrganizerConfig,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!(
            schedule = %config.schedule,
            mailbox = %config.mailbox,
            "Organizer started"
        );

        if config.run_on_start {
            run_once(&organizer, &config.mailbox).await;
        }

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Organizer shutting down");
                return;
            }

            let next = match next_fire(&config.schedule) {
                Ok(Some(next)) => next,
                Ok(None) => {
                    info!(schedule = %config.schedule, "Schedule has no further fire times");
                    return;
                }
                Err(e) => {
                    error!("{e}");
                    return;
                }
            };

            if !sleep_until(next, &shutdown).await {
                info!("Organizer shutting down");
                return;
            }

            run_once(&organizer, &config.mailbox).await;
        }
    });

    (handle, shutdown_flag)
}

/// One run under its own `run_id` span. Errors are logged, not returned.
async fn run_once(organizer: &MailOrganizer, mailbox: &str) {
    let run_id = Uuid::new_v4();
    let span = info_span!("organize", %run_id);
    async {
        if let Err(e) = organizer.organize(mailbox).await {
            error!(error = %e, "Organize run failed");
        }
    }
    .instrument(span)
    .await;
}

/// Sleep until `at`. Returns false if the shutdown flag was set first.
async fn sleep_until(at: DateTime<Utc>, shutdown: &AtomicBool) -> bool {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return false;
        }
        let remaining = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        if remaining.is_zero() {
            return true;
        }
        tokio::time::sleep(remaining.min(SHUTDOWN_POLL)).await;
    }
}
