//! Owner reports: period totals for the business and lifetime totals per client.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::client_service::ClientJob;
use super::job_service::{parse_date, ClientSummary};
use super::{ServiceResult, TenantResolver, TenantScope};
use crate::auth::{Action, AuthUser};
use crate::database::models::{Client, Invoice, Job, JobFilter};
use crate::database::Store;
use crate::error::{ServiceError, Validator};
use crate::types::{InvoiceStatus, JobStatus};

/// Window used when `startDate` is omitted.
const DEFAULT_PERIOD_DAYS: i64 = 30;

/// `?startDate=&endDate=`. A date-only `endDate` covers that whole day.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl ReportQuery {
    /// Half-open `[start, end)` period.
    pub fn period(&self, now: DateTime<Utc>) -> ServiceResult<ReportPeriod> {
        let mut v = Validator::new();

        let end = match self.end_date.as_deref().filter(|s| !s.trim().is_empty()) {
            None => Some(now),
            Some(raw) => match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                Ok(day) => Some(day.and_time(NaiveTime::MIN).and_utc() + Duration::days(1)),
                Err(_) => parse_date(raw),
            },
        };
        if end.is_none() {
            v.add("endDate", "End date must be a date (YYYY-MM-DD) or timestamp");
        }

        let start = match self.start_date.as_deref().filter(|s| !s.trim().is_empty()) {
            None => end.map(|end| end - Duration::days(DEFAULT_PERIOD_DAYS)),
            Some(raw) => parse_date(raw),
        };
        if start.is_none() {
            v.add("startDate", "Start date must be a date (YYYY-MM-DD) or timestamp");
        }

        if let (Some(start), Some(end)) = (start, end) {
            v.check(start < end, "endDate", "End date must be after the start date");
            v.finish()?;
            return Ok(ReportPeriod { start, end });
        }
        v.finish()?;
        Err(ServiceError::bad_request("Invalid report period"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessSummary {
    pub total_jobs: usize,
    pub completed_jobs: usize,
    pub total_clients: usize,
    /// PAID invoices raised in the period.
    pub total_revenue: Decimal,
    pub unpaid_invoices: usize,
    pub unpaid_amount: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportJob {
    #[serde(flatten)]
    pub job: Job,
    pub client: Option<ClientSummary>,
    pub invoice: Option<Invoice>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessReport {
    pub period: ReportPeriod,
    pub summary: BusinessSummary,
    pub jobs: Vec<ReportJob>,
    pub invoices: Vec<Invoice>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientReport {
    pub client: Client,
    pub total_jobs: usize,
    pub completed_jobs: usize,
    /// Sum of PAID invoices attached to the client's jobs.
    pub total_spent: Decimal,
    pub jobs: Vec<ClientJob>,
}

fn summarize(jobs: &[Job], invoices: &[Invoice]) -> BusinessSummary {
    let total_for = |status: InvoiceStatus| -> (usize, Decimal) {
        invoices
            .iter()
            .filter(|invoice| invoice.status == status)
            .fold((0, Decimal::ZERO), |(count, sum), invoice| (count + 1, sum + invoice.total_amount))
    };
    let (_, total_revenue) = total_for(InvoiceStatus::Paid);
    let (unpaid_invoices, unpaid_amount) = total_for(InvoiceStatus::Unpaid);

    BusinessSummary {
        total_jobs: jobs.len(),
        completed_jobs: jobs.iter().filter(|job| job.status == JobStatus::Completed).count(),
        total_clients: jobs.iter().map(|job| job.client_id.as_str()).collect::<HashSet<_>>().len(),
        total_revenue,
        unpaid_invoices,
        unpaid_amount,
    }
}

pub struct ReportService {
    store: Arc<dyn Store>,
    tenants: TenantResolver,
}

impl ReportService {
    pub fn new(store: Arc<dyn Store>, tenants: TenantResolver) -> Self {
        Self { store, tenants }
    }

    async fn scope(&self, user: &AuthUser) -> ServiceResult<TenantScope> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::ViewFinancials)?;
        Ok(scope)
    }

    /// Jobs scheduled in the period and invoices raised in it, newest first.
    pub async fn business_report(
        &self,
        user: &AuthUser,
        query: ReportQuery,
        now: DateTime<Utc>,
    ) -> ServiceResult<BusinessReport> {
        let scope = self.scope(user).await?;
        let period = query.period(now)?;

        let filter = JobFilter {
            from: Some(period.start),
            to: Some(period.end),
            ..JobFilter::tenant(&scope.business_id)
        };
        let (mut jobs, invoices, clients) = futures::try_join!(
            self.store.list_jobs(&filter),
            self.store.invoices_created_between(&scope.business_id, period.start, period.end),
            self.store.list_clients(&scope.business_id),
        )?;
        jobs.reverse();

        let summary = summarize(&jobs, &invoices);
        let clients: HashMap<&str, ClientSummary> =
            clients.iter().map(|client| (client.id.as_str(), ClientSummary::from(client))).collect();

        let mut rows = Vec::with_capacity(jobs.len());
        for job in jobs {
            let invoice = match invoices.iter().find(|i| i.job_id.as_deref() == Some(job.id.as_str())) {
                Some(invoice) => Some(invoice.clone()),
                None => self.store.find_invoice_for_job(&job.id).await?,
            };
            rows.push(ReportJob { client: clients.get(job.client_id.as_str()).cloned(), invoice, job });
        }

        tracing::debug!(business_id = %scope.business_id, jobs = rows.len(), "Business report built");
        Ok(BusinessReport { period, summary, jobs: rows, invoices })
    }

    pub async fn client_report(&self, user: &AuthUser, client_id: &str) -> ServiceResult<ClientReport> {
        let scope = self.scope(user).await?;
        let client = self
            .store
            .find_client(&scope.business_id, client_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Client not found"))?;

        let filter = JobFilter {
            client_id: Some(client.id.clone()),
            ..JobFilter::tenant(&scope.business_id)
        };
        let mut jobs = self.store.list_jobs(&filter).await?;
        jobs.reverse();

        let mut history = Vec::with_capacity(jobs.len());
        for job in jobs {
            let invoice = self.store.find_invoice_for_job(&job.id).await?;
            history.push(ClientJob { job, invoice });
        }

        let total_spent = history
            .iter()
            .filter_map(|entry| entry.invoice.as_ref())
            .filter(|invoice| invoice.status == InvoiceStatus::Paid)
            .map(|invoice| invoice.total_amount)
            .sum();

        Ok(ClientReport {
            total_jobs: history.len(),
            completed_jobs: history.iter().filter(|entry| entry.job.status == JobStatus::Completed).count(),
            total_spent,
            jobs: history,
            client,
        })
    }
}
