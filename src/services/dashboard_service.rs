use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::job_service::{ClientSummary, JobListItem};
use super::{month_bounds, start_of_day, ServiceResult, TenantResolver, TenantScope};
use crate::auth::{Action, AuthUser};
use crate::database::models::{Business, Job, JobFilter};
use crate::database::Store;
use crate::types::{InvoiceStatus, JobStatus, UserRole};

const UPCOMING_DAYS: i64 = 7;
const UPCOMING_LIMIT: usize = 5;

/// Home screen numbers. Cleaners get the extra lists and zeroed financials.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub today_jobs: usize,
    pub todays_jobs: Vec<JobListItem>,
    pub monthly_earnings: Decimal,
    pub unpaid_invoices: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub businesses: Option<Vec<Business>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upcoming_jobs: Option<Vec<JobListItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_progress_jobs: Option<Vec<JobListItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_this_week: Option<usize>,
}

pub struct DashboardService {
    store: Arc<dyn Store>,
    tenants: TenantResolver,
}

impl DashboardService {
    pub fn new(store: Arc<dyn Store>, tenants: TenantResolver) -> Self {
        Self { store, tenants }
    }

    pub async fn stats(&self, user: &AuthUser, now: DateTime<Utc>) -> ServiceResult<DashboardStats> {
        let scope = self.tenants.resolve_optional(user).await?;
        match (user.role, scope) {
            (UserRole::Cleaner, scope) => self.cleaner_stats(user, scope, now).await,
            (_, Some(scope)) => self.owner_stats(&scope, now).await,
            (_, None) => Ok(DashboardStats::default()),
        }
    }

    async fn with_clients(&self, business_id: &str, jobs: Vec<Job>) -> ServiceResult<Vec<JobListItem>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        let clients: HashMap<String, ClientSummary> = self
            .store
            .list_clients(business_id)
            .await?
            .iter()
            .map(|client| (client.id.clone(), ClientSummary::from(client)))
            .collect();
        Ok(jobs
            .into_iter()
            .map(|job| JobListItem { client: clients.get(&job.client_id).cloned(), job })
            .collect())
    }

    async fn todays(&self, scope: &TenantScope, now: DateTime<Utc>) -> ServiceResult<Vec<Job>> {
        let day = start_of_day(now);
        let filter = JobFilter {
            cleaner_id: scope.assignee().map(str::to_string),
            from: Some(day),
            to: Some(day + Duration::days(1)),
            ..JobFilter::tenant(&scope.business_id)
        };
        Ok(self.store.list_jobs(&filter).await?)
    }

    async fn owner_stats(&self, scope: &TenantScope, now: DateTime<Utc>) -> ServiceResult<DashboardStats> {
        scope.require(Action::ViewFinancials)?;
        let todays = self.todays(scope, now).await?;
        let (from, to) = month_bounds(now);

        let (monthly_earnings, unpaid_invoices) = futures::try_join!(
            self.store.paid_total(Some(&scope.business_id), Some(from), Some(to)),
            self.store.count_invoices(Some(&scope.business_id), Some(InvoiceStatus::Unpaid)),
        )?;

        Ok(DashboardStats {
            today_jobs: todays.len(),
            todays_jobs: self.with_clients(&scope.business_id, todays).await?,
            monthly_earnings,
            unpaid_invoices,
            ..Default::default()
        })
    }

    async fn cleaner_stats(
        &self,
        user: &AuthUser,
        scope: Option<TenantScope>,
        now: DateTime<Utc>,
    ) -> ServiceResult<DashboardStats> {
        let businesses = self.store.linked_businesses(&user.id).await?;
        let Some(scope) = scope else {
            return Ok(DashboardStats {
                businesses: Some(businesses),
                upcoming_jobs: Some(Vec::new()),
                in_progress_jobs: Some(Vec::new()),
                completed_this_week: Some(0),
                ..Default::default()
            });
        };
        scope.require(Action::ViewJobs)?;

        let todays = self.todays(&scope, now).await?;
        let tomorrow = start_of_day(now) + Duration::days(1);
        let mine = JobFilter {
            cleaner_id: Some(user.id.clone()),
            ..JobFilter::tenant(&scope.business_id)
        };

        let mut upcoming = self
            .store
            .list_jobs(&JobFilter {
                status: Some(JobStatus::Scheduled),
                from: Some(tomorrow),
                to: Some(tomorrow + Duration::days(UPCOMING_DAYS)),
                ..mine.clone()
            })
            .await?;
        upcoming.truncate(UPCOMING_LIMIT);

        let in_progress = self
            .store
            .list_jobs(&JobFilter { status: Some(JobStatus::InProgress), ..mine.clone() })
            .await?;

        let week_start = start_of_day(now) - Duration::days(now.weekday().num_days_from_monday() as i64);
        let completed_this_week = self
            .store
            .list_jobs(&JobFilter {
                status: Some(JobStatus::Completed),
                from: Some(week_start),
                to: Some(week_start + Duration::days(7)),
                ..mine
            })
            .await?
            .len();

        Ok(DashboardStats {
            today_jobs: todays.len(),
            todays_jobs: self.with_clients(&scope.business_id, todays).await?,
            monthly_earnings: Decimal::ZERO,
            unpaid_invoices: 0,
            businesses: Some(businesses),
            upcoming_jobs: Some(self.with_clients(&scope.business_id, upcoming).await?),
            in_progress_jobs: Some(self.with_clients(&scope.business_id, in_progress).await?),
            completed_this_week: Some(completed_this_week),
        })
    }
}
