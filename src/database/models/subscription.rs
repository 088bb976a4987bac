use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{PlanType, SubscriptionStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub business_id: String,
    pub plan_type: PlanType,
    pub status: SubscriptionStatus,
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn free(business_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            business_id: business_id.to_string(),
            plan_type: PlanType::Free,
            status: SubscriptionStatus::Active,
            stripe_subscription_id: None,
            stripe_customer_id: None,
            current_period_end: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Jobs created by a tenant in one calendar month.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobUsage {
    pub business_id: String,
    pub month: i32,
    pub year: i32,
    pub job_count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PlanCount {
    pub plan_type: PlanType,
    pub count: i64,
}
