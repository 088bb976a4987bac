use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::businesses::BUSINESS_COLUMNS;
use super::PgStore;
use crate::database::models::{Business, BusinessCleaner, CleanerInvitation, RosterEntry};
use crate::database::repository::{DbResult, RosterRepository};

const LINK_COLUMNS: &str =
    "id, business_id, cleaner_id, status, invited_by, activated_at, created_at, updated_at";

#[async_trait]
impl RosterRepository for PgStore {
    async fn find_active_link(&self, cleaner_id: &str) -> DbResult<Option<BusinessCleaner>> {
        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM business_cleaners
              WHERE cleaner_id = $1 AND status = 'ACTIVE'
              ORDER BY created_at ASC
              LIMIT 1"
        );
        Ok(sqlx::query_as::<_, BusinessCleaner>(&sql)
            .bind(cleaner_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_link(&self, business_id: &str, cleaner_id: &str) -> DbResult<Option<BusinessCleaner>> {
        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM business_cleaners WHERE business_id = $1 AND cleaner_id = $2"
        );
        Ok(sqlx::query_as::<_, BusinessCleaner>(&sql)
            .bind(business_id)
            .bind(cleaner_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn linked_businesses(&self, cleaner_id: &str) -> DbResult<Vec<Business>> {
        let columns = BUSINESS_COLUMNS
            .split(", ")
            .map(|c| format!("b.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {columns} FROM businesses b
               JOIN business_cleaners bc ON bc.business_id = b.id
              WHERE bc.cleaner_id = $1 AND bc.status = 'ACTIVE'
              ORDER BY bc.created_at ASC"
        );
        Ok(sqlx::query_as::<_, Business>(&sql)
            .bind(cleaner_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_link(&self, link: &BusinessCleaner) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO business_cleaners (id, business_id, cleaner_id, status, invited_by,
                                            activated_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&link.id)
        .bind(&link.business_id)
        .bind(&link.cleaner_id)
        .bind(link.status)
        .bind(&link.invited_by)
        .bind(link.activated_at)
        .bind(link.created_at)
        .bind(link.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_link(&self, link: &BusinessCleaner) -> DbResult<()> {
        sqlx::query(
            "UPDATE business_cleaners SET status = $2, activated_at = $3, updated_at = now() WHERE id = $1",
        )
        .bind(&link.id)
        .bind(link.status)
        .bind(link.activated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_link(&self, business_id: &str, cleaner_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM business_cleaners WHERE business_id = $1 AND cleaner_id = $2")
            .bind(business_id)
            .bind(cleaner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_roster(
        &self,
        business_id: &str,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> DbResult<Vec<RosterEntry>> {
        Ok(sqlx::query_as::<_, RosterEntry>(
            "SELECT bc.id, bc.business_id, bc.cleaner_id, u.email, bc.status, bc.activated_at,
                    bc.created_at,
                    COALESCE(counts.total_jobs, 0) AS total_jobs,
                    COALESCE(counts.today_jobs, 0) AS today_jobs
               FROM business_cleaners bc
               JOIN users u ON u.id = bc.cleaner_id
               LEFT JOIN (
                    SELECT cleaner_id,
                           COUNT(*) AS total_jobs,
                           COUNT(*) FILTER (WHERE scheduled_date >= $2 AND scheduled_date < $3) AS today_jobs
                      FROM jobs
                     WHERE business_id = $1 AND cleaner_id IS NOT NULL
                     GROUP BY cleaner_id
               ) counts ON counts.cleaner_id = bc.cleaner_id
              WHERE bc.business_id = $1
              ORDER BY bc.created_at ASC",
        )
        .bind(business_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_invitation(&self, invitation: &CleanerInvitation) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO cleaner_invitations (id, business_id, cleaner_id, email, token_hash,
                                              expires_at, accepted_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&invitation.id)
        .bind(&invitation.business_id)
        .bind(&invitation.cleaner_id)
        .bind(&invitation.email)
        .bind(&invitation.token_hash)
        .bind(invitation.expires_at)
        .bind(invitation.accepted_at)
        .bind(invitation.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_invitation_by_hash(&self, token_hash: &str) -> DbResult<Option<CleanerInvitation>> {
        Ok(sqlx::query_as::<_, CleanerInvitation>(
            "SELECT id, business_id, cleaner_id, email, token_hash, expires_at, accepted_at, created_at
               FROM cleaner_invitations WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn mark_invitation_accepted(&self, id: &str, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE cleaner_invitations SET accepted_at = $2 WHERE id = $1 AND accepted_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
