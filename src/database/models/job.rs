use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{JobFrequency, JobStatus, JobType, PhotoType};

/// One scheduled visit. Recurring jobs are materialized as independent
/// sibling rows; there is no series entity tying them together.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub business_id: String,
    pub client_id: String,
    pub cleaner_id: Option<String>,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub frequency: Option<JobFrequency>,
    pub scheduled_date: DateTime<Utc>,
    pub scheduled_time: Option<String>,
    pub status: JobStatus,
    pub reminder_enabled: bool,
    pub reminder_time: String,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: String,
    pub job_id: String,
    pub item_text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChecklistItem {
    pub fn new(job_id: &str, text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            job_id: job_id.to_string(),
            item_text: text.into(),
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobPhoto {
    pub id: String,
    pub job_id: String,
    pub image_url: String,
    pub photo_type: PhotoType,
    pub uploaded_at: DateTime<Utc>,
}

/// Query over one tenant's jobs. `cleaner_id` narrows to a cleaner's assignments.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub business_id: String,
    pub cleaner_id: Option<String>,
    pub client_id: Option<String>,
    pub status: Option<JobStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl JobFilter {
    pub fn tenant(business_id: impl Into<String>) -> Self {
        Self {
            business_id: business_id.into(),
            ..Default::default()
        }
    }

    pub fn matches(&self, job: &Job) -> bool {
        job.business_id == self.business_id
            && self.cleaner_id.as_ref().map_or(true, |c| job.cleaner_id.as_ref() == Some(c))
            && self.client_id.as_ref().map_or(true, |c| &job.client_id == c)
            && self.status.map_or(true, |s| job.status == s)
            && self.from.map_or(true, |from| job.scheduled_date >= from)
            && self.to.map_or(true, |to| job.scheduled_date < to)
    }
}
