//! Hourly reminder sweep. A job's reminder fires once, during the sweep whose
//! run time falls in the hour before `scheduled_date - reminder_time`.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use super::SweepReport;
use crate::database::models::Job;
use crate::database::Store;
use crate::error::ServiceError;
use crate::notifications::templates::{self, ReminderAudience};
use crate::notifications::{EmailMessage, EmailSender};
use crate::types::JobStatus;

/// Offsets a job may choose for its reminder.
pub const REMINDER_TIMES: [&str; 5] = ["30 minutes", "1 hour", "2 hours", "1 day", "2 days"];

pub const DEFAULT_REMINDER_TIME: &str = "1 day";

pub fn is_valid_reminder_time(value: &str) -> bool {
    REMINDER_TIMES.contains(&value)
}

/// Parses `"<n> <unit>"`. Anything unreadable falls back to one day.
pub fn parse_reminder_offset(value: &str) -> Duration {
    let fallback = Duration::days(1);
    let mut parts = value.split_whitespace();
    let (Some(amount), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
        return fallback;
    };
    let Ok(amount) = amount.parse::<i64>() else {
        return fallback;
    };
    match unit.to_ascii_lowercase().as_str() {
        "day" | "days" => Duration::days(amount),
        "hour" | "hours" => Duration::hours(amount),
        "minute" | "minutes" => Duration::minutes(amount),
        _ => fallback,
    }
}

/// True when `now` is within the hour leading up to the reminder moment.
pub fn is_due(job: &Job, now: DateTime<Utc>) -> bool {
    let until_reminder = job.scheduled_date - now - parse_reminder_offset(&job.reminder_time);
    until_reminder >= Duration::zero() && until_reminder <= Duration::hours(1)
}

async fn deliver(email: &dyn EmailSender, job: &Job, message: EmailMessage) {
    if let Err(e) = email.send(&message).await {
        tracing::error!(job_id = %job.id, to = %message.to, "Failed to send reminder: {}", e);
    }
}

/// Emails the owner, the assigned cleaner and the client (when the notes
/// carry an address). Per-recipient failures are logged, not returned.
async fn dispatch(store: &dyn Store, email: &dyn EmailSender, job: &Job) -> Result<(), ServiceError> {
    let business = store
        .find_business(&job.business_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Business not found"))?;
    let client = store
        .find_client(&job.business_id, &job.client_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Client not found"))?;

    if let Some(owner) = store.find_user(&business.user_id).await? {
        let message = templates::job_reminder(ReminderAudience::Owner, &owner.email, job, &client, &business);
        deliver(email, job, message).await;
    }

    if let Some(cleaner_id) = &job.cleaner_id {
        if let Some(cleaner) = store.find_user(cleaner_id).await? {
            let message = templates::job_reminder(ReminderAudience::Cleaner, &cleaner.email, job, &client, &business);
            deliver(email, job, message).await;
        }
    }

    if let Some(address) = client.email() {
        let message = templates::job_reminder(ReminderAudience::Client, address, job, &client, &business);
        deliver(email, job, message).await;
    }

    Ok(())
}

pub(super) async fn sweep(
    store: &Arc<dyn Store>,
    email: &Arc<dyn EmailSender>,
    now: DateTime<Utc>,
) -> Result<SweepReport, ServiceError> {
    let candidates = store.reminder_candidates(now).await?;
    let mut report = SweepReport::examined(candidates.len());

    for mut job in candidates.into_iter().filter(|job| is_due(job, now)) {
        let outcome = async {
            dispatch(store.as_ref(), email.as_ref(), &job).await?;
            job.reminder_sent = true;
            job.updated_at = Utc::now();
            store.save_job(&job, JobStatus::Scheduled).await?;
            Ok::<_, ServiceError>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                tracing::info!(job_id = %job.id, "Reminder sent");
                report.processed += 1;
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, "Failed to process reminder: {}", e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
