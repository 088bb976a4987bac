use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::PgStore;
use crate::database::models::{Business, Subscription};
use crate::database::repository::{BusinessRepository, DbResult, Page};

pub(super) const BUSINESS_COLUMNS: &str = "id, user_id, name, phone, address, vat_enabled, vat_number, \
     invoice_template, created_at, updated_at";

#[async_trait]
impl BusinessRepository for PgStore {
    async fn find_business(&self, id: &str) -> DbResult<Option<Business>> {
        let sql = format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = $1");
        Ok(sqlx::query_as::<_, Business>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn find_business_by_owner(&self, user_id: &str) -> DbResult<Option<Business>> {
        let sql = format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE user_id = $1");
        Ok(sqlx::query_as::<_, Business>(&sql).bind(user_id).fetch_optional(&self.pool).await?)
    }

    async fn insert_business(&self, business: &Business, subscription: &Subscription) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO businesses (id, user_id, name, phone, address, vat_enabled, vat_number,
                                     invoice_template, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&business.id)
        .bind(&business.user_id)
        .bind(&business.name)
        .bind(&business.phone)
        .bind(&business.address)
        .bind(business.vat_enabled)
        .bind(&business.vat_number)
        .bind(&business.invoice_template)
        .bind(business.created_at)
        .bind(business.updated_at)
        .execute(&mut *tx)
        .await?;

        super::subscriptions::insert(&mut *tx, subscription).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn save_business(&self, business: &Business) -> DbResult<()> {
        sqlx::query(
            "UPDATE businesses
                SET name = $2, phone = $3, address = $4, vat_enabled = $5, vat_number = $6,
                    invoice_template = $7, updated_at = now()
              WHERE id = $1",
        )
        .bind(&business.id)
        .bind(&business.name)
        .bind(&business.phone)
        .bind(&business.address)
        .bind(business.vat_enabled)
        .bind(&business.vat_number)
        .bind(&business.invoice_template)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_businesses(&self, page: Page) -> DbResult<Vec<Business>> {
        let sql = format!(
            "SELECT {BUSINESS_COLUMNS} FROM businesses ORDER BY created_at DESC OFFSET $1 LIMIT $2"
        );
        Ok(sqlx::query_as::<_, Business>(&sql)
            .bind(page.offset)
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_businesses(&self) -> DbResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM businesses").fetch_one(&self.pool).await?)
    }

    async fn count_businesses_since(&self, since: DateTime<Utc>) -> DbResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM businesses WHERE created_at >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await?)
    }
}
