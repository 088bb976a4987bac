use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::PgStore;
use crate::database::models::{ChecklistItem, Job, JobFilter, JobPhoto};
use crate::database::repository::{DbResult, JobRepository};
use crate::database::DatabaseError;
use crate::types::{JobFrequency, JobStatus};

const JOB_COLUMNS: &str = "id, business_id, client_id, cleaner_id, job_type, frequency, scheduled_date, \
     scheduled_time, status, reminder_enabled, reminder_time, reminder_sent, created_at, updated_at";

const CHECKLIST_COLUMNS: &str = "id, job_id, item_text, completed, created_at, updated_at";

#[async_trait]
impl JobRepository for PgStore {
    async fn insert_jobs(&self, jobs: &[Job], checklist: &[ChecklistItem]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        for job in jobs {
            sqlx::query(
                "INSERT INTO jobs (id, business_id, client_id, cleaner_id, job_type, frequency,
                                   scheduled_date, scheduled_time, status, reminder_enabled,
                                   reminder_time, reminder_sent, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            )
            .bind(&job.id)
            .bind(&job.business_id)
            .bind(&job.client_id)
            .bind(&job.cleaner_id)
            .bind(job.job_type)
            .bind(job.frequency)
            .bind(job.scheduled_date)
            .bind(&job.scheduled_time)
            .bind(job.status)
            .bind(job.reminder_enabled)
            .bind(&job.reminder_time)
            .bind(job.reminder_sent)
            .bind(job.created_at)
            .bind(job.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        for item in checklist {
            sqlx::query(
                "INSERT INTO job_checklist_items (id, job_id, item_text, completed, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&item.id)
            .bind(&item.job_id)
            .bind(&item.item_text)
            .bind(item.completed)
            .bind(item.created_at)
            .bind(item.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_job(&self, business_id: &str, id: &str) -> DbResult<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE business_id = $1 AND id = $2");
        Ok(sqlx::query_as::<_, Job>(&sql)
            .bind(business_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_jobs(&self, filter: &JobFilter) -> DbResult<Vec<Job>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs
              WHERE business_id = $1
                AND ($2::text IS NULL OR cleaner_id = $2)
                AND ($3::text IS NULL OR client_id = $3)
                AND ($4::job_status IS NULL OR status = $4)
                AND ($5::timestamptz IS NULL OR scheduled_date >= $5)
                AND ($6::timestamptz IS NULL OR scheduled_date < $6)
              ORDER BY scheduled_date ASC, scheduled_time ASC NULLS LAST"
        );
        Ok(sqlx::query_as::<_, Job>(&sql)
            .bind(&filter.business_id)
            .bind(&filter.cleaner_id)
            .bind(&filter.client_id)
            .bind(filter.status)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn save_job(&self, job: &Job, expected: JobStatus) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE jobs
                SET cleaner_id = $3, scheduled_date = $4, scheduled_time = $5, status = $6,
                    reminder_enabled = $7, reminder_time = $8, reminder_sent = $9, updated_at = $10
              WHERE business_id = $1 AND id = $2 AND status = $11",
        )
        .bind(&job.business_id)
        .bind(&job.id)
        .bind(&job.cleaner_id)
        .bind(job.scheduled_date)
        .bind(&job.scheduled_time)
        .bind(job.status)
        .bind(job.reminder_enabled)
        .bind(&job.reminder_time)
        .bind(job.reminder_sent)
        .bind(job.updated_at)
        .bind(expected)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::Conflict(format!("job {} is no longer {:?}", job.id, expected)));
        }
        Ok(())
    }

    async fn delete_scheduled_job(&self, business_id: &str, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE business_id = $1 AND id = $2 AND status = 'SCHEDULED'")
            .bind(business_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_jobs(&self, business_id: Option<&str>) -> DbResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE ($1::text IS NULL OR business_id = $1)")
            .bind(business_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn checklist(&self, job_id: &str) -> DbResult<Vec<ChecklistItem>> {
        let sql = format!(
            "SELECT {CHECKLIST_COLUMNS} FROM job_checklist_items WHERE job_id = $1 ORDER BY created_at ASC"
        );
        Ok(sqlx::query_as::<_, ChecklistItem>(&sql)
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_checklist_item(&self, job_id: &str, item_id: &str) -> DbResult<Option<ChecklistItem>> {
        let sql = format!("SELECT {CHECKLIST_COLUMNS} FROM job_checklist_items WHERE job_id = $1 AND id = $2");
        Ok(sqlx::query_as::<_, ChecklistItem>(&sql)
            .bind(job_id)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn save_checklist_item(&self, item: &ChecklistItem) -> DbResult<()> {
        sqlx::query("UPDATE job_checklist_items SET completed = $2, updated_at = now() WHERE id = $1")
            .bind(&item.id)
            .bind(item.completed)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn photos(&self, job_id: &str) -> DbResult<Vec<JobPhoto>> {
        Ok(sqlx::query_as::<_, JobPhoto>(
            "SELECT id, job_id, image_url, photo_type, uploaded_at
               FROM job_photos WHERE job_id = $1 ORDER BY uploaded_at ASC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_photo(&self, photo: &JobPhoto) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO job_photos (id, job_id, image_url, photo_type, uploaded_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&photo.id)
        .bind(&photo.job_id)
        .bind(&photo.image_url)
        .bind(photo.photo_type)
        .bind(photo.uploaded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reminder_candidates(&self, now: DateTime<Utc>) -> DbResult<Vec<Job>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs
              WHERE status = 'SCHEDULED' AND reminder_enabled AND NOT reminder_sent
                AND scheduled_date >= $1
              ORDER BY scheduled_date ASC"
        );
        Ok(sqlx::query_as::<_, Job>(&sql).bind(now).fetch_all(&self.pool).await?)
    }

    async fn completed_recurring_since(&self, since: DateTime<Utc>) -> DbResult<Vec<Job>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs
              WHERE job_type = 'RECURRING' AND status = 'COMPLETED' AND frequency IS NOT NULL
                AND updated_at > $1
              ORDER BY scheduled_date ASC"
        );
        Ok(sqlx::query_as::<_, Job>(&sql).bind(since).fetch_all(&self.pool).await?)
    }

    async fn recurring_exists_between(
        &self,
        business_id: &str,
        client_id: &str,
        frequency: JobFrequency,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<bool> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM jobs
                 WHERE business_id = $1 AND client_id = $2 AND job_type = 'RECURRING'
                   AND frequency = $3 AND scheduled_date BETWEEN $4 AND $5
             )",
        )
        .bind(business_id)
        .bind(client_id)
        .bind(frequency)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?)
    }
}
