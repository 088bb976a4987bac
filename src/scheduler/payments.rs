//! Daily nudge for UNPAID invoices falling due in the next few days.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use super::SweepReport;
use crate::database::models::Invoice;
use crate::database::Store;
use crate::error::ServiceError;
use crate::notifications::{templates, EmailSender};

const DUE_WITHIN_DAYS: i64 = 3;

/// Returns whether an email went out. Clients without an address are skipped.
async fn remind(store: &dyn Store, email: &dyn EmailSender, invoice: &Invoice) -> Result<bool, ServiceError> {
    let Some(client) = store.find_client(&invoice.business_id, &invoice.client_id).await? else {
        return Ok(false);
    };
    let Some(address) = client.email() else {
        return Ok(false);
    };
    let business = store
        .find_business(&invoice.business_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Business not found"))?;

    email
        .send(&templates::payment_reminder(address, invoice, &client, &business))
        .await
}

pub(super) async fn sweep(
    store: &Arc<dyn Store>,
    email: &Arc<dyn EmailSender>,
    now: DateTime<Utc>,
) -> Result<SweepReport, ServiceError> {
    let due = store.unpaid_due_between(now, now + Duration::days(DUE_WITHIN_DAYS)).await?;
    let mut report = SweepReport::examined(due.len());

    for invoice in &due {
        match remind(store.as_ref(), email.as_ref(), invoice).await {
            Ok(true) => {
                tracing::info!(invoice_id = %invoice.id, "Payment reminder sent");
                report.processed += 1;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(invoice_id = %invoice.id, "Failed to send payment reminder: {}", e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
