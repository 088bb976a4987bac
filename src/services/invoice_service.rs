use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::{month_bounds, PageInfo, PageQuery, ServiceResult, TenantResolver, TenantScope};
use crate::auth::{Action, AuthUser};
use crate::database::models::{new_id, Client, Invoice, Job};
use crate::database::{DatabaseError, Store};
use crate::error::ServiceError;
use crate::notifications::whatsapp;
use crate::notifications::WhatsAppLink;
use crate::types::{InvoiceStatus, PaymentMethod};

/// Days between issue and due date.
pub const PAYMENT_TERMS_DAYS: i64 = 30;

/// UK standard VAT rate, 20%.
pub fn vat_rate() -> Decimal {
    Decimal::new(20, 2)
}

pub fn max_amount() -> Decimal {
    Decimal::from(100_000)
}

/// `(vat, total)` for a net amount. VAT is rounded half away from zero to pence.
pub fn totals(amount: Decimal, vat_enabled: bool) -> (Decimal, Decimal) {
    let vat = if vat_enabled {
        (amount * vat_rate()).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    } else {
        Decimal::ZERO
    };
    (vat, amount + vat)
}

fn validate_amount(amount: Decimal) -> ServiceResult<()> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::invalid("amount", "Amount must be greater than zero"));
    }
    if amount > max_amount() {
        return Err(ServiceError::invalid("amount", "Amount cannot exceed 100000"));
    }
    if amount.normalize().scale() > 2 {
        return Err(ServiceError::invalid("amount", "Amount can have at most two decimal places"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoice {
    pub amount: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
}

/// `PUT /invoices/:id`. PAID is the only status a caller may set.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoice {
    pub status: InvoiceStatus,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceListItem {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub is_overdue: bool,
    pub client_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvoicePage {
    pub invoices: Vec<InvoiceListItem>,
    pub pagination: PageInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub is_overdue: bool,
    pub client: Option<Client>,
    pub job: Option<Job>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    pub monthly_earnings: Decimal,
    pub unpaid_count: i64,
}

pub struct InvoiceService {
    store: Arc<dyn Store>,
    tenants: TenantResolver,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn Store>, tenants: TenantResolver) -> Self {
        Self { store, tenants }
    }

    async fn scope(&self, user: &AuthUser, action: Action) -> ServiceResult<TenantScope> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(action)?;
        Ok(scope)
    }

    async fn find(&self, scope: &TenantScope, invoice_id: &str) -> ServiceResult<Invoice> {
        self.store
            .find_invoice(&scope.business_id, invoice_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invoice not found"))
    }

    /// Issues the invoice for a job. VAT follows the business setting at
    /// the time of issue; the number comes from the tenant's counter.
    pub async fn create_from_job(&self, user: &AuthUser, job_id: &str, request: CreateInvoice) -> ServiceResult<Invoice> {
        let scope = self.scope(user, Action::ManageInvoices).await?;
        validate_amount(request.amount)?;

        let job = self
            .store
            .find_job(&scope.business_id, job_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Job not found"))?;
        if self.store.find_invoice_for_job(&job.id).await?.is_some() {
            return Err(ServiceError::conflict("An invoice already exists for this job"));
        }
        let business = self
            .store
            .find_business(&scope.business_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Business not found"))?;

        let now = Utc::now();
        let (vat_amount, total_amount) = totals(request.amount, business.vat_enabled);
        let draft = Invoice {
            id: new_id(),
            business_id: scope.business_id.clone(),
            job_id: Some(job.id.clone()),
            client_id: job.client_id.clone(),
            invoice_number: String::new(),
            amount: request.amount,
            vat_amount,
            total_amount,
            status: InvoiceStatus::Unpaid,
            due_date: now + Duration::days(PAYMENT_TERMS_DAYS),
            payment_method: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };

        let invoice = match self.store.insert_numbered_invoice(&draft).await {
            Ok(invoice) => invoice,
            Err(DatabaseError::Conflict(_)) => {
                return Err(ServiceError::conflict("An invoice already exists for this job"))
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            business_id = %scope.business_id,
            invoice_number = %invoice.invoice_number,
            total = %invoice.total_amount,
            "Invoice issued"
        );
        Ok(invoice)
    }

    pub async fn list(&self, user: &AuthUser, query: InvoiceQuery, now: DateTime<Utc>) -> ServiceResult<InvoicePage> {
        let scope = self.scope(user, Action::ViewInvoices).await?;
        let (page, window) = PageQuery { page: query.page, limit: query.limit }.resolve()?;

        let invoices = self.store.list_invoices(&scope.business_id, query.status, window).await?;
        let total = self.store.count_invoices(Some(&scope.business_id), query.status).await?;
        let names: HashMap<String, String> = self
            .store
            .list_clients(&scope.business_id)
            .await?
            .into_iter()
            .map(|client| (client.id, client.name))
            .collect();

        Ok(InvoicePage {
            invoices: invoices
                .into_iter()
                .map(|invoice| InvoiceListItem {
                    is_overdue: invoice.is_overdue(now),
                    client_name: names.get(&invoice.client_id).cloned(),
                    invoice,
                })
                .collect(),
            pagination: PageInfo::new(page, window.limit, total),
        })
    }

    pub async fn get(&self, user: &AuthUser, invoice_id: &str, now: DateTime<Utc>) -> ServiceResult<InvoiceDetail> {
        let scope = self.scope(user, Action::ViewInvoices).await?;
        let invoice = self.find(&scope, invoice_id).await?;

        let client = self.store.find_client(&scope.business_id, &invoice.client_id).await?;
        let job = match &invoice.job_id {
            Some(job_id) => self.store.find_job(&scope.business_id, job_id).await?,
            None => None,
        };
        Ok(InvoiceDetail { is_overdue: invoice.is_overdue(now), invoice, client, job })
    }

    pub async fn mark_paid(&self, user: &AuthUser, invoice_id: &str, request: UpdateInvoice) -> ServiceResult<Invoice> {
        let scope = self.scope(user, Action::ManageInvoices).await?;
        if request.status != InvoiceStatus::Paid {
            return Err(ServiceError::invalid("status", "Invoices can only be marked as PAID"));
        }
        let method = request
            .payment_method
            .ok_or_else(|| ServiceError::invalid("paymentMethod", "Payment method is required"))?;

        let mut invoice = self.find(&scope, invoice_id).await?;
        if invoice.status == InvoiceStatus::Paid {
            return Err(ServiceError::conflict("Invoice is already paid"));
        }

        let now = Utc::now();
        invoice.status = InvoiceStatus::Paid;
        invoice.payment_method = Some(method);
        invoice.paid_at = Some(now);
        invoice.updated_at = now;
        self.store.save_invoice(&invoice).await?;

        tracing::info!(business_id = %scope.business_id, invoice_number = %invoice.invoice_number, ?method, "Invoice paid");
        Ok(invoice)
    }

    /// PAID totals with `paid_at` in the current calendar month.
    pub async fn monthly_earnings(&self, user: &AuthUser, now: DateTime<Utc>) -> ServiceResult<Decimal> {
        let scope = self.scope(user, Action::ViewFinancials).await?;
        let (from, to) = month_bounds(now);
        Ok(self.store.paid_total(Some(&scope.business_id), Some(from), Some(to)).await?)
    }

    pub async fn unpaid_count(&self, user: &AuthUser) -> ServiceResult<i64> {
        let scope = self.scope(user, Action::ViewFinancials).await?;
        Ok(self
            .store
            .count_invoices(Some(&scope.business_id), Some(InvoiceStatus::Unpaid))
            .await?)
    }

    pub async fn summary(&self, user: &AuthUser, now: DateTime<Utc>) -> ServiceResult<InvoiceSummary> {
        Ok(InvoiceSummary {
            monthly_earnings: self.monthly_earnings(user, now).await?,
            unpaid_count: self.unpaid_count(user).await?,
        })
    }

    pub async fn whatsapp_link(&self, user: &AuthUser, invoice_id: &str) -> ServiceResult<WhatsAppLink> {
        let scope = self.scope(user, Action::ViewInvoices).await?;
        let invoice = self.find(&scope, invoice_id).await?;
        let business = self
            .store
            .find_business(&scope.business_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Business not found"))?;
        let client = self
            .store
            .find_client(&scope.business_id, &invoice.client_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Client not found"))?;
        let job = match &invoice.job_id {
            Some(job_id) => self.store.find_job(&scope.business_id, job_id).await?,
            None => None,
        };

        let message = whatsapp::invoice_message(&invoice, &business, &client, job.as_ref());
        Ok(WhatsAppLink::build(client.phone.as_deref(), message))
    }
}
