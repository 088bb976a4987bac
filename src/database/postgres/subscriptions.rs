use async_trait::async_trait;
use sqlx::PgExecutor;

use super::PgStore;
use crate::database::models::{JobUsage, PlanCount, Subscription};
use crate::database::repository::{DbResult, SubscriptionRepository};

const SUBSCRIPTION_COLUMNS: &str = "id, business_id, plan_type, status, stripe_subscription_id, \
     stripe_customer_id, current_period_end, created_at, updated_at";

pub(super) async fn insert<'e, E: PgExecutor<'e>>(executor: E, subscription: &Subscription) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO subscriptions (id, business_id, plan_type, status, stripe_subscription_id,
                                    stripe_customer_id, current_period_end, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(&subscription.id)
    .bind(&subscription.business_id)
    .bind(subscription.plan_type)
    .bind(subscription.status)
    .bind(&subscription.stripe_subscription_id)
    .bind(&subscription.stripe_customer_id)
    .bind(subscription.current_period_end)
    .bind(subscription.created_at)
    .bind(subscription.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl SubscriptionRepository for PgStore {
    async fn find_subscription(&self, business_id: &str) -> DbResult<Option<Subscription>> {
        let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE business_id = $1");
        Ok(sqlx::query_as::<_, Subscription>(&sql)
            .bind(business_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_subscription_by_provider_id(&self, provider_id: &str) -> DbResult<Option<Subscription>> {
        let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE stripe_subscription_id = $1");
        Ok(sqlx::query_as::<_, Subscription>(&sql)
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> DbResult<()> {
        insert(&self.pool, subscription).await
    }

    async fn save_subscription(&self, subscription: &Subscription) -> DbResult<()> {
        sqlx::query(
            "UPDATE subscriptions
                SET plan_type = $2, status = $3, stripe_subscription_id = $4, stripe_customer_id = $5,
                    current_period_end = $6, updated_at = now()
              WHERE business_id = $1",
        )
        .bind(&subscription.business_id)
        .bind(subscription.plan_type)
        .bind(subscription.status)
        .bind(&subscription.stripe_subscription_id)
        .bind(&subscription.stripe_customer_id)
        .bind(subscription.current_period_end)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_usage(&self, business_id: &str, month: i32, year: i32) -> DbResult<i64> {
        Ok(sqlx::query_scalar(
            "INSERT INTO job_usage (business_id, month, year, job_count) VALUES ($1, $2, $3, 1)
             ON CONFLICT (business_id, month, year) DO UPDATE SET job_count = job_usage.job_count + 1
             RETURNING job_count",
        )
        .bind(business_id)
        .bind(month)
        .bind(year)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn usage_history(&self, business_id: &str, limit: i64) -> DbResult<Vec<JobUsage>> {
        Ok(sqlx::query_as::<_, JobUsage>(
            "SELECT business_id, month, year, job_count FROM job_usage
              WHERE business_id = $1
              ORDER BY year DESC, month DESC
              LIMIT $2",
        )
        .bind(business_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_active_subscriptions(&self) -> DbResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE status = 'ACTIVE'")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn plan_breakdown(&self) -> DbResult<Vec<PlanCount>> {
        Ok(sqlx::query_as::<_, PlanCount>(
            "SELECT plan_type, COUNT(*) AS count FROM subscriptions GROUP BY plan_type ORDER BY plan_type",
        )
        .fetch_all(&self.pool)
        .await?)
    }
}
