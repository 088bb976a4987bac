use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{InvoiceStatus, PaymentMethod};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub business_id: String,
    pub job_id: Option<String>,
    pub client_id: String,
    /// Assigned by the store from the per-tenant counter on insert.
    pub invoice_number: String,
    pub amount: Decimal,
    pub vat_amount: Decimal,
    pub total_amount: Decimal,
    pub status: InvoiceStatus,
    pub due_date: DateTime<Utc>,
    pub payment_method: Option<PaymentMethod>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == InvoiceStatus::Unpaid && self.due_date.date_naive() < now.date_naive()
    }
}

/// `INV-000001` style numbering, sequential per tenant.
pub fn format_invoice_number(sequence: i64) -> String {
    format!("INV-{:06}", sequence)
}
