use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::PgStore;
use crate::database::models::{format_invoice_number, Invoice};
use crate::database::repository::{DbResult, InvoiceRepository, Page};
use crate::types::InvoiceStatus;

const INVOICE_COLUMNS: &str = "id, business_id, job_id, client_id, invoice_number, amount, vat_amount, \
     total_amount, status, due_date, payment_method, paid_at, created_at, updated_at";

#[async_trait]
impl InvoiceRepository for PgStore {
    async fn insert_numbered_invoice(&self, invoice: &Invoice) -> DbResult<Invoice> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the counter serializes concurrent issuers for one tenant.
        let sequence: i64 = sqlx::query_scalar(
            "INSERT INTO invoice_counters (business_id, last_number) VALUES ($1, 1)
             ON CONFLICT (business_id) DO UPDATE SET last_number = invoice_counters.last_number + 1
             RETURNING last_number",
        )
        .bind(&invoice.business_id)
        .fetch_one(&mut *tx)
        .await?;

        let sql = format!(
            "INSERT INTO invoices (id, business_id, job_id, client_id, invoice_number, amount,
                                   vat_amount, total_amount, status, due_date, payment_method,
                                   paid_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             RETURNING {INVOICE_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Invoice>(&sql)
            .bind(&invoice.id)
            .bind(&invoice.business_id)
            .bind(&invoice.job_id)
            .bind(&invoice.client_id)
            .bind(format_invoice_number(sequence))
            .bind(invoice.amount)
            .bind(invoice.vat_amount)
            .bind(invoice.total_amount)
            .bind(invoice.status)
            .bind(invoice.due_date)
            .bind(invoice.payment_method)
            .bind(invoice.paid_at)
            .bind(invoice.created_at)
            .bind(invoice.updated_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_invoice(&self, business_id: &str, id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE business_id = $1 AND id = $2");
        Ok(sqlx::query_as::<_, Invoice>(&sql)
            .bind(business_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_invoice_for_job(&self, job_id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE job_id = $1");
        Ok(sqlx::query_as::<_, Invoice>(&sql).bind(job_id).fetch_optional(&self.pool).await?)
    }

    async fn list_invoices(
        &self,
        business_id: &str,
        status: Option<InvoiceStatus>,
        page: Page,
    ) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices
              WHERE business_id = $1 AND ($2::invoice_status IS NULL OR status = $2)
              ORDER BY created_at DESC
              OFFSET $3 LIMIT $4"
        );
        Ok(sqlx::query_as::<_, Invoice>(&sql)
            .bind(business_id)
            .bind(status)
            .bind(page.offset)
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_invoices(&self, business_id: Option<&str>, status: Option<InvoiceStatus>) -> DbResult<i64> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM invoices
              WHERE ($1::text IS NULL OR business_id = $1)
                AND ($2::invoice_status IS NULL OR status = $2)",
        )
        .bind(business_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn save_invoice(&self, invoice: &Invoice) -> DbResult<()> {
        sqlx::query(
            "UPDATE invoices SET status = $3, payment_method = $4, paid_at = $5, updated_at = now()
              WHERE business_id = $1 AND id = $2",
        )
        .bind(&invoice.business_id)
        .bind(&invoice.id)
        .bind(invoice.status)
        .bind(invoice.payment_method)
        .bind(invoice.paid_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn paid_total(
        &self,
        business_id: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DbResult<Decimal> {
        Ok(sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_amount), 0) FROM invoices
              WHERE status = 'PAID'
                AND ($1::text IS NULL OR business_id = $1)
                AND ($2::timestamptz IS NULL OR paid_at >= $2)
                AND ($3::timestamptz IS NULL OR paid_at < $3)",
        )
        .bind(business_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn invoices_created_between(
        &self,
        business_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices
              WHERE business_id = $1 AND created_at >= $2 AND created_at < $3
              ORDER BY created_at DESC"
        );
        Ok(sqlx::query_as::<_, Invoice>(&sql)
            .bind(business_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn unpaid_due_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices
              WHERE status = 'UNPAID' AND due_date >= $1 AND due_date < $2
              ORDER BY due_date ASC"
        );
        Ok(sqlx::query_as::<_, Invoice>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?)
    }
}
