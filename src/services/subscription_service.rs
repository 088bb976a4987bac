use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ServiceResult, TenantResolver};
use crate::auth::{Action, AuthUser};
use crate::database::models::{JobUsage, Subscription};
use crate::database::{DatabaseError, Store};
use crate::types::{PlanType, SubscriptionStatus};

/// Months of usage returned alongside a subscription.
const USAGE_HISTORY_MONTHS: i64 = 12;

/// Length of a billing period granted by a manual plan change.
const PERIOD_DAYS: i64 = 30;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub monthly_limit: i64,
    pub usage: Vec<JobUsage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub current_plan: PlanType,
    pub status: SubscriptionStatus,
    pub current_month_usage: i64,
    pub monthly_limit: i64,
    pub usage: Vec<JobUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlan {
    pub plan_type: PlanType,
    #[serde(default)]
    pub stripe_subscription_id: Option<String>,
}

/// Plan tier and monthly job counters per tenant. Usage is tracked and
/// reported against the plan limit; it does not block job creation.
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn Store>,
    tenants: TenantResolver,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn Store>, tenants: TenantResolver) -> Self {
        Self { store, tenants }
    }

    /// The tenant's subscription, creating the FREE one on first read.
    pub async fn ensure(&self, business_id: &str) -> ServiceResult<Subscription> {
        if let Some(existing) = self.store.find_subscription(business_id).await? {
            return Ok(existing);
        }

        let mut subscription = Subscription::free(business_id);
        subscription.current_period_end = Some(Utc::now() + Duration::days(PERIOD_DAYS));
        match self.store.insert_subscription(&subscription).await {
            Ok(()) => {
                tracing::info!(business_id, "Created default FREE subscription");
                Ok(subscription)
            }
            // Lost a race with a concurrent first read
            Err(DatabaseError::Conflict(_)) => self
                .store
                .find_subscription(business_id)
                .await?
                .ok_or_else(|| DatabaseError::NotFound("Subscription not found".into()).into()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, user: &AuthUser) -> ServiceResult<SubscriptionView> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::ManageSubscription)?;

        let subscription = self.ensure(&scope.business_id).await?;
        let usage = self.store.usage_history(&scope.business_id, USAGE_HISTORY_MONTHS).await?;
        Ok(SubscriptionView {
            monthly_limit: subscription.plan_type.monthly_job_limit(),
            subscription,
            usage,
        })
    }

    pub async fn usage(&self, user: &AuthUser, now: DateTime<Utc>) -> ServiceResult<UsageReport> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::ManageSubscription)?;

        let subscription = self.ensure(&scope.business_id).await?;
        let usage = self.store.usage_history(&scope.business_id, USAGE_HISTORY_MONTHS).await?;
        let current_month_usage = usage
            .iter()
            .find(|u| u.month == now.month() as i32 && u.year == now.year())
            .map_or(0, |u| u.job_count);

        Ok(UsageReport {
            current_plan: subscription.plan_type,
            status: subscription.status,
            current_month_usage,
            monthly_limit: subscription.plan_type.monthly_job_limit(),
            usage,
        })
    }

    pub async fn update_plan(&self, user: &AuthUser, request: UpdatePlan) -> ServiceResult<Subscription> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::ManageSubscription)?;

        let mut subscription = self.ensure(&scope.business_id).await?;
        subscription.plan_type = request.plan_type;
        subscription.status = SubscriptionStatus::Active;
        if request.stripe_subscription_id.is_some() {
            subscription.stripe_subscription_id = request.stripe_subscription_id;
        }
        subscription.current_period_end = Some(Utc::now() + Duration::days(PERIOD_DAYS));
        subscription.updated_at = Utc::now();
        self.store.save_subscription(&subscription).await?;

        tracing::info!(business_id = %scope.business_id, plan = subscription.plan_type.as_str(), "Subscription plan changed");
        Ok(subscription)
    }

    pub async fn cancel(&self, user: &AuthUser) -> ServiceResult<Subscription> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::ManageSubscription)?;

        let mut subscription = self.ensure(&scope.business_id).await?;
        subscription.status = SubscriptionStatus::Cancelled;
        subscription.updated_at = Utc::now();
        self.store.save_subscription(&subscription).await?;

        tracing::info!(business_id = %scope.business_id, "Subscription cancelled");
        Ok(subscription)
    }

    /// One job-create request counts as one unit of the month's usage.
    pub async fn record_job_created(&self, business_id: &str, now: DateTime<Utc>) -> ServiceResult<i64> {
        self.ensure(business_id).await?;
        let count = self
            .store
            .increment_usage(business_id, now.month() as i32, now.year())
            .await?;
        tracing::debug!(business_id, count, "Recorded job usage");
        Ok(count)
    }
}
