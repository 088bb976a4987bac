//! Storage seams. Services only talk to these traits; `PgStore` implements
//! them against Postgres and the test suite swaps in an in-memory store.
//!
//! Every tenant-scoped lookup takes the tenant id as its first argument so a
//! row from another tenant is indistinguishable from a missing row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::manager::DatabaseError;
use super::models::{
    Business, BusinessCleaner, ChecklistItem, CleanerInvitation, Client, Invoice, Job, JobFilter,
    JobPhoto, JobUsage, PlanCount, RosterEntry, Subscription, User,
};
use crate::types::{InvoiceStatus, JobFrequency, JobStatus};

pub type DbResult<T> = Result<T, DatabaseError>;

/// Offset/limit window for paginated listings.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: &str) -> DbResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> DbResult<Option<User>>;
    /// Insert or update by id.
    async fn save_user(&self, user: &User) -> DbResult<User>;
    async fn list_users(&self, page: Page) -> DbResult<Vec<User>>;
    async fn count_users(&self) -> DbResult<i64>;
}

#[async_trait]
pub trait BusinessRepository: Send + Sync {
    async fn find_business(&self, id: &str) -> DbResult<Option<Business>>;
    async fn find_business_by_owner(&self, user_id: &str) -> DbResult<Option<Business>>;
    /// Creates the tenant and its starting subscription atomically.
    /// Fails with `Conflict` when the owner already has a business.
    async fn insert_business(&self, business: &Business, subscription: &Subscription) -> DbResult<()>;
    async fn save_business(&self, business: &Business) -> DbResult<()>;
    async fn list_businesses(&self, page: Page) -> DbResult<Vec<Business>>;
    async fn count_businesses(&self) -> DbResult<i64>;
    async fn count_businesses_since(&self, since: DateTime<Utc>) -> DbResult<i64>;
}

#[async_trait]
pub trait RosterRepository: Send + Sync {
    /// Oldest ACTIVE link for the cleaner.
    async fn find_active_link(&self, cleaner_id: &str) -> DbResult<Option<BusinessCleaner>>;
    async fn find_link(&self, business_id: &str, cleaner_id: &str) -> DbResult<Option<BusinessCleaner>>;
    /// Businesses the cleaner is ACTIVE in, oldest link first.
    async fn linked_businesses(&self, cleaner_id: &str) -> DbResult<Vec<Business>>;
    async fn insert_link(&self, link: &BusinessCleaner) -> DbResult<()>;
    async fn save_link(&self, link: &BusinessCleaner) -> DbResult<()>;
    async fn delete_link(&self, business_id: &str, cleaner_id: &str) -> DbResult<bool>;
    /// Every link for the tenant with per-cleaner job totals, computed in one
    /// grouped pass. `today_jobs` counts jobs scheduled in `[day_start, day_end)`.
    async fn list_roster(
        &self,
        business_id: &str,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> DbResult<Vec<RosterEntry>>;
    async fn insert_invitation(&self, invitation: &CleanerInvitation) -> DbResult<()>;
    async fn find_invitation_by_hash(&self, token_hash: &str) -> DbResult<Option<CleanerInvitation>>;
    async fn mark_invitation_accepted(&self, id: &str, at: DateTime<Utc>) -> DbResult<()>;
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn insert_client(&self, client: &Client) -> DbResult<()>;
    async fn save_client(&self, client: &Client) -> DbResult<()>;
    async fn find_client(&self, business_id: &str, id: &str) -> DbResult<Option<Client>>;
    async fn list_clients(&self, business_id: &str) -> DbResult<Vec<Client>>;
    /// True once any job has left SCHEDULED or any invoice names the client.
    async fn client_has_history(&self, business_id: &str, id: &str) -> DbResult<bool>;
    /// Removes the client and its still-scheduled jobs. Refuses (returns
    /// `false`) when the client has history.
    async fn delete_client(&self, business_id: &str, id: &str) -> DbResult<bool>;
    async fn count_clients(&self, business_id: &str) -> DbResult<i64>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Inserts a batch of jobs plus checklist items in one transaction.
    async fn insert_jobs(&self, jobs: &[Job], checklist: &[ChecklistItem]) -> DbResult<()>;
    async fn find_job(&self, business_id: &str, id: &str) -> DbResult<Option<Job>>;
    /// Ordered by scheduled date, then time.
    async fn list_jobs(&self, filter: &JobFilter) -> DbResult<Vec<Job>>;
    /// Compare-and-set on status: writes only while the stored status still
    /// equals `expected`, otherwise fails with `Conflict`.
    async fn save_job(&self, job: &Job, expected: JobStatus) -> DbResult<()>;
    /// Deletes only while the job is still SCHEDULED; returns whether a row went.
    async fn delete_scheduled_job(&self, business_id: &str, id: &str) -> DbResult<bool>;
    async fn count_jobs(&self, business_id: Option<&str>) -> DbResult<i64>;

    async fn checklist(&self, job_id: &str) -> DbResult<Vec<ChecklistItem>>;
    async fn find_checklist_item(&self, job_id: &str, item_id: &str) -> DbResult<Option<ChecklistItem>>;
    async fn save_checklist_item(&self, item: &ChecklistItem) -> DbResult<()>;
    async fn photos(&self, job_id: &str) -> DbResult<Vec<JobPhoto>>;
    async fn insert_photo(&self, photo: &JobPhoto) -> DbResult<()>;

    /// SCHEDULED jobs with reminders enabled, not yet sent, dated at or after `now`.
    async fn reminder_candidates(&self, now: DateTime<Utc>) -> DbResult<Vec<Job>>;
    /// COMPLETED recurring jobs touched since `since`, across all tenants.
    async fn completed_recurring_since(&self, since: DateTime<Utc>) -> DbResult<Vec<Job>>;
    async fn recurring_exists_between(
        &self,
        business_id: &str,
        client_id: &str,
        frequency: JobFrequency,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<bool>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Takes the next number from the tenant's counter and inserts the invoice
    /// in the same transaction. The number on `invoice` is ignored.
    async fn insert_numbered_invoice(&self, invoice: &Invoice) -> DbResult<Invoice>;
    async fn find_invoice(&self, business_id: &str, id: &str) -> DbResult<Option<Invoice>>;
    async fn find_invoice_for_job(&self, job_id: &str) -> DbResult<Option<Invoice>>;
    async fn list_invoices(
        &self,
        business_id: &str,
        status: Option<InvoiceStatus>,
        page: Page,
    ) -> DbResult<Vec<Invoice>>;
    async fn count_invoices(&self, business_id: Option<&str>, status: Option<InvoiceStatus>) -> DbResult<i64>;
    /// Tenant invoices with `created_at` in `[from, to)`, newest first.
    async fn invoices_created_between(
        &self,
        business_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Invoice>>;
    async fn save_invoice(&self, invoice: &Invoice) -> DbResult<()>;
    /// Sum of `total_amount` for PAID invoices with `paid_at` in `[from, to)`.
    /// `None` sums across every tenant.
    async fn paid_total(
        &self,
        business_id: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DbResult<Decimal>;
    /// UNPAID invoices across all tenants due in `[from, to)`.
    async fn unpaid_due_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<Vec<Invoice>>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_subscription(&self, business_id: &str) -> DbResult<Option<Subscription>>;
    async fn find_subscription_by_provider_id(&self, provider_id: &str) -> DbResult<Option<Subscription>>;
    async fn insert_subscription(&self, subscription: &Subscription) -> DbResult<()>;
    async fn save_subscription(&self, subscription: &Subscription) -> DbResult<()>;
    /// Adds one to the month's counter, creating it if needed. Returns the new count.
    async fn increment_usage(&self, business_id: &str, month: i32, year: i32) -> DbResult<i64>;
    async fn usage_history(&self, business_id: &str, limit: i64) -> DbResult<Vec<JobUsage>>;
    async fn count_active_subscriptions(&self) -> DbResult<i64>;
    async fn plan_breakdown(&self) -> DbResult<Vec<PlanCount>>;
}

/// Everything the services need from storage.
pub trait Store:
    UserRepository
    + BusinessRepository
    + RosterRepository
    + ClientRepository
    + JobRepository
    + InvoiceRepository
    + SubscriptionRepository
{
}

impl<T> Store for T where
    T: UserRepository
        + BusinessRepository
        + RosterRepository
        + ClientRepository
        + JobRepository
        + InvoiceRepository
        + SubscriptionRepository
{
}
