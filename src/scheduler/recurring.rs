//! Daily renewal: every COMPLETED recurring job gets its next occurrence
//! once, so a series keeps rolling past the initial batch.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use super::SweepReport;
use crate::database::models::{new_id, ChecklistItem, Job};
use crate::database::Store;
use crate::error::ServiceError;
use crate::types::{JobStatus, JobType};

/// How far back completed jobs are considered.
const LOOKBACK_DAYS: i64 = 7;
/// An existing occurrence this close to the next date counts as the renewal.
const DUPLICATE_WINDOW_DAYS: i64 = 2;

/// Fresh SCHEDULED copy of `job`, one cadence step later.
pub fn next_occurrence(job: &Job) -> Option<Job> {
    let frequency = job.frequency?;
    if job.job_type != JobType::Recurring {
        return None;
    }
    let now = Utc::now();
    Some(Job {
        id: new_id(),
        scheduled_date: job.scheduled_date + Duration::days(frequency.interval_days()),
        status: JobStatus::Scheduled,
        reminder_sent: false,
        created_at: now,
        updated_at: now,
        ..job.clone()
    })
}

async fn renew(store: &dyn Store, job: &Job) -> Result<bool, ServiceError> {
    let (Some(next), Some(frequency)) = (next_occurrence(job), job.frequency) else {
        return Ok(false);
    };

    let window = Duration::days(DUPLICATE_WINDOW_DAYS);
    let exists = store
        .recurring_exists_between(
            &job.business_id,
            &job.client_id,
            frequency,
            next.scheduled_date - window,
            next.scheduled_date + window,
        )
        .await?;
    if exists {
        return Ok(false);
    }

    let checklist: Vec<ChecklistItem> = store
        .checklist(&job.id)
        .await?
        .iter()
        .map(|item| ChecklistItem::new(&next.id, item.item_text.clone()))
        .collect();
    store.insert_jobs(std::slice::from_ref(&next), &checklist).await?;

    tracing::info!(job_id = %job.id, next_job_id = %next.id, "Recurring job renewed");
    Ok(true)
}

pub(super) async fn sweep(store: &Arc<dyn Store>, now: DateTime<Utc>) -> Result<SweepReport, ServiceError> {
    let completed = store.completed_recurring_since(now - Duration::days(LOOKBACK_DAYS)).await?;
    let mut report = SweepReport::examined(completed.len());

    for job in &completed {
        match renew(store.as_ref(), job).await {
            Ok(true) => report.processed += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::error!(job_id = %job.id, "Failed to renew recurring job: {}", e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
