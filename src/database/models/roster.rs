use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::CleanerStatus;

/// Staff-roster link: this cleaner works for this business.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BusinessCleaner {
    pub id: String,
    pub business_id: String,
    pub cleaner_id: String,
    pub status: CleanerStatus,
    pub invited_by: Option<String>,
    pub activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BusinessCleaner {
    pub fn active(business_id: &str, cleaner_id: &str, invited_by: &str) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            business_id: business_id.to_string(),
            cleaner_id: cleaner_id.to_string(),
            status: CleanerStatus::Active,
            invited_by: Some(invited_by.to_string()),
            activated_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Roster row joined with the cleaner's email and job counts for one tenant.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: String,
    pub business_id: String,
    pub cleaner_id: String,
    pub email: String,
    pub status: CleanerStatus,
    pub activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub total_jobs: i64,
    pub today_jobs: i64,
}

/// Pending invitation. Only the SHA-256 hash of the token is stored.
#[derive(Debug, Clone, FromRow)]
pub struct CleanerInvitation {
    pub id: String,
    pub business_id: String,
    pub cleaner_id: String,
    pub email: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CleanerInvitation {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.accepted_at.is_none() && self.expires_at > now
    }
}
