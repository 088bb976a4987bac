//! In-memory doubles for unit tests: a `Store` backed by plain vectors, fake
//! providers that record what they were asked to do, and `TestContext`,
//! which wires them into a full `Services` the same way production does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::auth::{AuthUser, IdentityProvider, NewIdentity, VerifiedIdentity};
use crate::database::models::{
    format_invoice_number, new_id, Business, BusinessCleaner, ChecklistItem, CleanerInvitation, Client,
    ClientNotes, Invoice, Job, JobFilter, JobPhoto, JobUsage, PlanCount, RosterEntry, Subscription, User,
};
use crate::database::repository::*;
use crate::database::DatabaseError;
use crate::error::ServiceError;
use crate::notifications::{EmailMessage, EmailSender};
use crate::scheduler::reminders::DEFAULT_REMINDER_TIME;
use crate::services::document_service::{InvoiceDocument, InvoiceRenderer, PhotoArchiveRequest, PhotoArchiver};
use crate::services::invoice_service::CreateInvoice;
use crate::services::payment_service::{CheckoutOrder, CheckoutSession, PaymentGateway};
use crate::services::upload_service::{ImageStorage, ImageUpload, StoredImage};
use crate::services::{Dependencies, ServiceSettings, Services, TenantResolver};
use crate::types::{
    CleanerStatus, InvoiceStatus, JobFrequency, JobStatus, JobType, SubscriptionStatus, UserRole,
};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const TEST_PASSWORD: &str = "password123";

#[derive(Default)]
struct State {
    users: Vec<User>,
    businesses: Vec<Business>,
    links: Vec<BusinessCleaner>,
    invitations: Vec<CleanerInvitation>,
    clients: Vec<Client>,
    jobs: Vec<Job>,
    checklist: Vec<ChecklistItem>,
    photos: Vec<JobPhoto>,
    invoices: Vec<Invoice>,
    invoice_counters: HashMap<String, i64>,
    subscriptions: Vec<Subscription>,
    usage: Vec<JobUsage>,
}

fn conflict(what: &str) -> DatabaseError {
    DatabaseError::Conflict(what.to_string())
}

fn window<T: Clone>(rows: Vec<T>, page: Page) -> Vec<T> {
    rows.into_iter()
        .skip(page.offset.max(0) as usize)
        .take(page.limit.max(0) as usize)
        .collect()
}

/// Enforces the same uniqueness rules the schema does.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory store lock poisoned")
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, id: &str) -> DbResult<Option<User>> {
        Ok(self.state().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let email = email.to_lowercase();
        Ok(self.state().users.iter().find(|u| u.email.to_lowercase() == email).cloned())
    }

    async fn save_user(&self, user: &User) -> DbResult<User> {
        let mut state = self.state();
        if state.users.iter().any(|u| u.id != user.id && u.email == user.email) {
            return Err(conflict("users_email_key"));
        }
        let saved = User { updated_at: Utc::now(), ..user.clone() };
        match state.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => {
                *existing = User { created_at: existing.created_at, ..saved.clone() };
                Ok(existing.clone())
            }
            None => {
                state.users.push(saved.clone());
                Ok(saved)
            }
        }
    }

    async fn list_users(&self, page: Page) -> DbResult<Vec<User>> {
        let mut users: Vec<User> = self.state().users.iter().rev().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(window(users, page))
    }

    async fn count_users(&self) -> DbResult<i64> {
        Ok(self.state().users.len() as i64)
    }
}

#[async_trait]
impl BusinessRepository for MemoryStore {
    async fn find_business(&self, id: &str) -> DbResult<Option<Business>> {
        Ok(self.state().businesses.iter().find(|b| b.id == id).cloned())
    }

    async fn find_business_by_owner(&self, user_id: &str) -> DbResult<Option<Business>> {
        Ok(self.state().businesses.iter().find(|b| b.user_id == user_id).cloned())
    }

    async fn insert_business(&self, business: &Business, subscription: &Subscription) -> DbResult<()> {
        let mut state = self.state();
        if state.businesses.iter().any(|b| b.user_id == business.user_id) {
            return Err(conflict("businesses_user_id_key"));
        }
        state.businesses.push(business.clone());
        state.subscriptions.push(subscription.clone());
        Ok(())
    }

    async fn save_business(&self, business: &Business) -> DbResult<()> {
        let mut state = self.state();
        if let Some(existing) = state.businesses.iter_mut().find(|b| b.id == business.id) {
            *existing = business.clone();
        }
        Ok(())
    }

    async fn list_businesses(&self, page: Page) -> DbResult<Vec<Business>> {
        let mut businesses: Vec<Business> = self.state().businesses.iter().rev().cloned().collect();
        businesses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(window(businesses, page))
    }

    async fn count_businesses(&self) -> DbResult<i64> {
        Ok(self.state().businesses.len() as i64)
    }

    async fn count_businesses_since(&self, since: DateTime<Utc>) -> DbResult<i64> {
        Ok(self.state().businesses.iter().filter(|b| b.created_at >= since).count() as i64)
    }
}

#[async_trait]
impl RosterRepository for MemoryStore {
    async fn find_active_link(&self, cleaner_id: &str) -> DbResult<Option<BusinessCleaner>> {
        let state = self.state();
        let mut active: Vec<&BusinessCleaner> = state
            .links
            .iter()
            .filter(|l| l.cleaner_id == cleaner_id && l.status == CleanerStatus::Active)
            .collect();
        active.sort_by_key(|l| l.created_at);
        Ok(active.first().map(|l| (*l).clone()))
    }

    async fn find_link(&self, business_id: &str, cleaner_id: &str) -> DbResult<Option<BusinessCleaner>> {
        Ok(self
            .state()
            .links
            .iter()
            .find(|l| l.business_id == business_id && l.cleaner_id == cleaner_id)
            .cloned())
    }

    async fn linked_businesses(&self, cleaner_id: &str) -> DbResult<Vec<Business>> {
        let state = self.state();
        Ok(state
            .links
            .iter()
            .filter(|l| l.cleaner_id == cleaner_id && l.status == CleanerStatus::Active)
            .filter_map(|l| state.businesses.iter().find(|b| b.id == l.business_id).cloned())
            .collect())
    }

    async fn insert_link(&self, link: &BusinessCleaner) -> DbResult<()> {
        let mut state = self.state();
        if state
            .links
            .iter()
            .any(|l| l.business_id == link.business_id && l.cleaner_id == link.cleaner_id)
        {
            return Err(conflict("business_cleaners_business_id_cleaner_id_key"));
        }
        if link.status == CleanerStatus::Active
            && state
                .links
                .iter()
                .any(|l| l.cleaner_id == link.cleaner_id && l.status == CleanerStatus::Active)
        {
            return Err(conflict("business_cleaners_one_active"));
        }
        state.links.push(link.clone());
        Ok(())
    }

    async fn save_link(&self, link: &BusinessCleaner) -> DbResult<()> {
        let mut state = self.state();
        if link.status == CleanerStatus::Active
            && state
                .links
                .iter()
                .any(|l| l.id != link.id && l.cleaner_id == link.cleaner_id && l.status == CleanerStatus::Active)
        {
            return Err(conflict("business_cleaners_one_active"));
        }
        if let Some(existing) = state.links.iter_mut().find(|l| l.id == link.id) {
            *existing = link.clone();
        }
        Ok(())
    }

    async fn delete_link(&self, business_id: &str, cleaner_id: &str) -> DbResult<bool> {
        let mut state = self.state();
        let before = state.links.len();
        state
            .links
            .retain(|l| !(l.business_id == business_id && l.cleaner_id == cleaner_id));
        Ok(state.links.len() != before)
    }

    async fn list_roster(
        &self,
        business_id: &str,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> DbResult<Vec<RosterEntry>> {
        let state = self.state();
        let mut links: Vec<&BusinessCleaner> = state.links.iter().filter(|l| l.business_id == business_id).collect();
        links.sort_by_key(|l| l.created_at);

        Ok(links
            .into_iter()
            .map(|link| {
                let assigned: Vec<&Job> = state
                    .jobs
                    .iter()
                    .filter(|j| j.business_id == business_id && j.cleaner_id.as_ref() == Some(&link.cleaner_id))
                    .collect();
                RosterEntry {
                    id: link.id.clone(),
                    business_id: link.business_id.clone(),
                    cleaner_id: link.cleaner_id.clone(),
                    email: state
                        .users
                        .iter()
                        .find(|u| u.id == link.cleaner_id)
                        .map(|u| u.email.clone())
                        .unwrap_or_default(),
                    status: link.status,
                    activated_at: link.activated_at,
                    created_at: link.created_at,
                    total_jobs: assigned.len() as i64,
                    today_jobs: assigned
                        .iter()
                        .filter(|j| j.scheduled_date >= day_start && j.scheduled_date < day_end)
                        .count() as i64,
                }
            })
            .collect())
    }

    async fn insert_invitation(&self, invitation: &CleanerInvitation) -> DbResult<()> {
        self.state().invitations.push(invitation.clone());
        Ok(())
    }

    async fn find_invitation_by_hash(&self, token_hash: &str) -> DbResult<Option<CleanerInvitation>> {
        Ok(self.state().invitations.iter().find(|i| i.token_hash == token_hash).cloned())
    }

    async fn mark_invitation_accepted(&self, id: &str, at: DateTime<Utc>) -> DbResult<()> {
        let mut state = self.state();
        if let Some(invitation) = state.invitations.iter_mut().find(|i| i.id == id && i.accepted_at.is_none()) {
            invitation.accepted_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl ClientRepository for MemoryStore {
    async fn insert_client(&self, client: &Client) -> DbResult<()> {
        self.state().clients.push(client.clone());
        Ok(())
    }

    async fn save_client(&self, client: &Client) -> DbResult<()> {
        let mut state = self.state();
        if let Some(existing) = state
            .clients
            .iter_mut()
            .find(|c| c.id == client.id && c.business_id == client.business_id)
        {
            *existing = client.clone();
        }
        Ok(())
    }

    async fn find_client(&self, business_id: &str, id: &str) -> DbResult<Option<Client>> {
        Ok(self
            .state()
            .clients
            .iter()
            .find(|c| c.business_id == business_id && c.id == id)
            .cloned())
    }

    async fn list_clients(&self, business_id: &str) -> DbResult<Vec<Client>> {
        let mut clients: Vec<Client> = self
            .state()
            .clients
            .iter()
            .filter(|c| c.business_id == business_id)
            .cloned()
            .collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clients)
    }

    async fn client_has_history(&self, business_id: &str, id: &str) -> DbResult<bool> {
        let state = self.state();
        Ok(state
            .jobs
            .iter()
            .any(|j| j.business_id == business_id && j.client_id == id && j.status != JobStatus::Scheduled)
            || state.invoices.iter().any(|i| i.business_id == business_id && i.client_id == id))
    }

    async fn delete_client(&self, business_id: &str, id: &str) -> DbResult<bool> {
        if self.client_has_history(business_id, id).await? {
            return Ok(false);
        }
        let mut state = self.state();
        let before = state.clients.len();
        state.clients.retain(|c| !(c.business_id == business_id && c.id == id));
        let deleted = state.clients.len() != before;
        if deleted {
            let gone: Vec<String> = state
                .jobs
                .iter()
                .filter(|j| j.business_id == business_id && j.client_id == id)
                .map(|j| j.id.clone())
                .collect();
            state.jobs.retain(|j| !gone.contains(&j.id));
            state.checklist.retain(|i| !gone.contains(&i.job_id));
            state.photos.retain(|p| !gone.contains(&p.job_id));
        }
        Ok(deleted)
    }

    async fn count_clients(&self, business_id: &str) -> DbResult<i64> {
        Ok(self.state().clients.iter().filter(|c| c.business_id == business_id).count() as i64)
    }
}

#[async_trait]
impl JobRepository for MemoryStore {
    async fn insert_jobs(&self, jobs: &[Job], checklist: &[ChecklistItem]) -> DbResult<()> {
        let mut state = self.state();
        state.jobs.extend_from_slice(jobs);
        state.checklist.extend_from_slice(checklist);
        Ok(())
    }

    async fn find_job(&self, business_id: &str, id: &str) -> DbResult<Option<Job>> {
        Ok(self
            .state()
            .jobs
            .iter()
            .find(|j| j.business_id == business_id && j.id == id)
            .cloned())
    }

    async fn list_jobs(&self, filter: &JobFilter) -> DbResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self.state().jobs.iter().filter(|j| filter.matches(j)).cloned().collect();
        jobs.sort_by(|a, b| {
            a.scheduled_date.cmp(&b.scheduled_date).then_with(|| match (&a.scheduled_time, &b.scheduled_time) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
        });
        Ok(jobs)
    }

    async fn save_job(&self, job: &Job, expected: JobStatus) -> DbResult<()> {
        let mut state = self.state();
        match state
            .jobs
            .iter_mut()
            .find(|j| j.id == job.id && j.business_id == job.business_id && j.status == expected)
        {
            Some(existing) => {
                *existing = job.clone();
                Ok(())
            }
            None => Err(DatabaseError::Conflict(format!("job {} is no longer {:?}", job.id, expected))),
        }
    }

    async fn delete_scheduled_job(&self, business_id: &str, id: &str) -> DbResult<bool> {
        let mut state = self.state();
        let before = state.jobs.len();
        state
            .jobs
            .retain(|j| !(j.business_id == business_id && j.id == id && j.status == JobStatus::Scheduled));
        let deleted = state.jobs.len() != before;
        if deleted {
            state.checklist.retain(|i| i.job_id != id);
            state.photos.retain(|p| p.job_id != id);
        }
        Ok(deleted)
    }

    async fn count_jobs(&self, business_id: Option<&str>) -> DbResult<i64> {
        Ok(self
            .state()
            .jobs
            .iter()
            .filter(|j| business_id.map_or(true, |b| j.business_id == b))
            .count() as i64)
    }

    async fn checklist(&self, job_id: &str) -> DbResult<Vec<ChecklistItem>> {
        Ok(self.state().checklist.iter().filter(|i| i.job_id == job_id).cloned().collect())
    }

    async fn find_checklist_item(&self, job_id: &str, item_id: &str) -> DbResult<Option<ChecklistItem>> {
        Ok(self
            .state()
            .checklist
            .iter()
            .find(|i| i.job_id == job_id && i.id == item_id)
            .cloned())
    }

    async fn save_checklist_item(&self, item: &ChecklistItem) -> DbResult<()> {
        let mut state = self.state();
        if let Some(existing) = state.checklist.iter_mut().find(|i| i.id == item.id) {
            existing.completed = item.completed;
            existing.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn photos(&self, job_id: &str) -> DbResult<Vec<JobPhoto>> {
        Ok(self.state().photos.iter().filter(|p| p.job_id == job_id).cloned().collect())
    }

    async fn insert_photo(&self, photo: &JobPhoto) -> DbResult<()> {
        self.state().photos.push(photo.clone());
        Ok(())
    }

    async fn reminder_candidates(&self, now: DateTime<Utc>) -> DbResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .state()
            .jobs
            .iter()
            .filter(|j| {
                j.status == JobStatus::Scheduled && j.reminder_enabled && !j.reminder_sent && j.scheduled_date >= now
            })
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.scheduled_date);
        Ok(jobs)
    }

    async fn completed_recurring_since(&self, since: DateTime<Utc>) -> DbResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .state()
            .jobs
            .iter()
            .filter(|j| {
                j.job_type == JobType::Recurring
                    && j.status == JobStatus::Completed
                    && j.frequency.is_some()
                    && j.updated_at > since
            })
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.scheduled_date);
        Ok(jobs)
    }

    async fn recurring_exists_between(
        &self,
        business_id: &str,
        client_id: &str,
        frequency: JobFrequency,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<bool> {
        Ok(self.state().jobs.iter().any(|j| {
            j.business_id == business_id
                && j.client_id == client_id
                && j.job_type == JobType::Recurring
                && j.frequency == Some(frequency)
                && j.scheduled_date >= from
                && j.scheduled_date <= to
        }))
    }
}

#[async_trait]
impl InvoiceRepository for MemoryStore {
    async fn insert_numbered_invoice(&self, invoice: &Invoice) -> DbResult<Invoice> {
        let mut state = self.state();
        if let Some(job_id) = &invoice.job_id {
            if state.invoices.iter().any(|i| i.job_id.as_ref() == Some(job_id)) {
                return Err(conflict("invoices_job_id_key"));
            }
        }
        let counter = state.invoice_counters.entry(invoice.business_id.clone()).or_insert(0);
        *counter += 1;
        let numbered = Invoice { invoice_number: format_invoice_number(*counter), ..invoice.clone() };
        state.invoices.push(numbered.clone());
        Ok(numbered)
    }

    async fn find_invoice(&self, business_id: &str, id: &str) -> DbResult<Option<Invoice>> {
        Ok(self
            .state()
            .invoices
            .iter()
            .find(|i| i.business_id == business_id && i.id == id)
            .cloned())
    }

    async fn find_invoice_for_job(&self, job_id: &str) -> DbResult<Option<Invoice>> {
        Ok(self.state().invoices.iter().find(|i| i.job_id.as_deref() == Some(job_id)).cloned())
    }

    async fn list_invoices(
        &self,
        business_id: &str,
        status: Option<InvoiceStatus>,
        page: Page,
    ) -> DbResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .state()
            .invoices
            .iter()
            .rev()
            .filter(|i| i.business_id == business_id && status.map_or(true, |s| i.status == s))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(window(invoices, page))
    }

    async fn invoices_created_between(
        &self,
        business_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .state()
            .invoices
            .iter()
            .filter(|i| i.business_id == business_id && i.created_at >= from && i.created_at < to)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invoices)
    }

    async fn count_invoices(&self, business_id: Option<&str>, status: Option<InvoiceStatus>) -> DbResult<i64> {
        Ok(self
            .state()
            .invoices
            .iter()
            .filter(|i| business_id.map_or(true, |b| i.business_id == b) && status.map_or(true, |s| i.status == s))
            .count() as i64)
    }

    async fn save_invoice(&self, invoice: &Invoice) -> DbResult<()> {
        let mut state = self.state();
        if let Some(existing) = state
            .invoices
            .iter_mut()
            .find(|i| i.id == invoice.id && i.business_id == invoice.business_id)
        {
            *existing = invoice.clone();
        }
        Ok(())
    }

    async fn paid_total(
        &self,
        business_id: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DbResult<Decimal> {
        Ok(self
            .state()
            .invoices
            .iter()
            .filter(|i| i.status == InvoiceStatus::Paid)
            .filter(|i| business_id.map_or(true, |b| i.business_id == b))
            .filter(|i| from.map_or(true, |from| i.paid_at.map_or(false, |at| at >= from)))
            .filter(|i| to.map_or(true, |to| i.paid_at.map_or(false, |at| at < to)))
            .map(|i| i.total_amount)
            .sum())
    }

    async fn unpaid_due_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .state()
            .invoices
            .iter()
            .filter(|i| i.status == InvoiceStatus::Unpaid && i.due_date >= from && i.due_date < to)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| i.due_date);
        Ok(invoices)
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn find_subscription(&self, business_id: &str) -> DbResult<Option<Subscription>> {
        Ok(self.state().subscriptions.iter().find(|s| s.business_id == business_id).cloned())
    }

    async fn find_subscription_by_provider_id(&self, provider_id: &str) -> DbResult<Option<Subscription>> {
        Ok(self
            .state()
            .subscriptions
            .iter()
            .find(|s| s.stripe_subscription_id.as_deref() == Some(provider_id))
            .cloned())
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> DbResult<()> {
        let mut state = self.state();
        if state.subscriptions.iter().any(|s| s.business_id == subscription.business_id) {
            return Err(conflict("subscriptions_business_id_key"));
        }
        state.subscriptions.push(subscription.clone());
        Ok(())
    }

    async fn save_subscription(&self, subscription: &Subscription) -> DbResult<()> {
        let mut state = self.state();
        if let Some(existing) = state
            .subscriptions
            .iter_mut()
            .find(|s| s.business_id == subscription.business_id)
        {
            *existing = subscription.clone();
        }
        Ok(())
    }

    async fn increment_usage(&self, business_id: &str, month: i32, year: i32) -> DbResult<i64> {
        let mut state = self.state();
        match state
            .usage
            .iter_mut()
            .find(|u| u.business_id == business_id && u.month == month && u.year == year)
        {
            Some(usage) => {
                usage.job_count += 1;
                Ok(usage.job_count)
            }
            None => {
                state.usage.push(JobUsage { business_id: business_id.to_string(), month, year, job_count: 1 });
                Ok(1)
            }
        }
    }

    async fn usage_history(&self, business_id: &str, limit: i64) -> DbResult<Vec<JobUsage>> {
        let mut usage: Vec<JobUsage> = self
            .state()
            .usage
            .iter()
            .filter(|u| u.business_id == business_id)
            .cloned()
            .collect();
        usage.sort_by(|a, b| (b.year, b.month).cmp(&(a.year, a.month)));
        usage.truncate(limit.max(0) as usize);
        Ok(usage)
    }

    async fn count_active_subscriptions(&self) -> DbResult<i64> {
        Ok(self
            .state()
            .subscriptions
            .iter()
            .filter(|s| s.status == SubscriptionStatus::Active)
            .count() as i64)
    }

    async fn plan_breakdown(&self) -> DbResult<Vec<PlanCount>> {
        let state = self.state();
        let mut counts: Vec<PlanCount> = Vec::new();
        for subscription in &state.subscriptions {
            match counts.iter_mut().find(|c| c.plan_type == subscription.plan_type) {
                Some(count) => count.count += 1,
                None => counts.push(PlanCount { plan_type: subscription.plan_type, count: 1 }),
            }
        }
        counts.sort_by_key(|c| c.plan_type.as_str());
        Ok(counts)
    }
}

/// Accounts keyed by subject id. Tokens are `test-token:<id>`.
#[derive(Default)]
pub struct FakeIdentity {
    accounts: Mutex<HashMap<String, (String, String)>>,
}

impl FakeIdentity {
    const TOKEN_PREFIX: &'static str = "test-token:";

    pub fn register(&self, email: &str, password: &str) -> String {
        let id = new_id();
        self.accounts
            .lock()
            .unwrap()
            .insert(id.clone(), (email.to_lowercase(), password.to_string()));
        id
    }

    pub fn token_for(&self, id: &str) -> String {
        format!("{}{}", Self::TOKEN_PREFIX, id)
    }

    pub fn password_for(&self, id: &str) -> Option<String> {
        self.accounts.lock().unwrap().get(id).map(|(_, password)| password.clone())
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, ServiceError> {
        let id = token
            .strip_prefix(Self::TOKEN_PREFIX)
            .ok_or_else(|| ServiceError::unauthorized("Invalid or expired token"))?;
        let accounts = self.accounts.lock().unwrap();
        let (email, _) = accounts
            .get(id)
            .ok_or_else(|| ServiceError::unauthorized("Invalid or expired token"))?;
        Ok(VerifiedIdentity { id: id.to_string(), email: email.clone() })
    }

    async fn create_user(&self, identity: &NewIdentity) -> Result<String, ServiceError> {
        let email = identity.email.to_lowercase();
        if self.accounts.lock().unwrap().values().any(|(existing, _)| *existing == email) {
            return Err(ServiceError::conflict("An account with this email already exists"));
        }
        Ok(self.register(&email, &identity.password))
    }

    async fn update_password(&self, user_id: &str, password: &str) -> Result<(), ServiceError> {
        match self.accounts.lock().unwrap().get_mut(user_id) {
            Some(account) => {
                account.1 = password.to_string();
                Ok(())
            }
            None => Err(ServiceError::not_found("User not found")),
        }
    }

    async fn check_password(&self, email: &str, password: &str) -> Result<bool, ServiceError> {
        let email = email.to_lowercase();
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .values()
            .any(|(e, p)| *e == email && p == password))
    }

    async fn recovery_link(&self, email: &str, redirect_to: &str) -> Result<String, ServiceError> {
        Ok(format!("https://auth.test/recover?email={}&redirect_to={}", email, redirect_to))
    }
}

#[derive(Default)]
pub struct RecordingEmail {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmail {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmail {
    async fn send(&self, message: &EmailMessage) -> Result<bool, ServiceError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(true)
    }
}

#[derive(Default)]
pub struct FakeStorage;

#[async_trait]
impl ImageStorage for FakeStorage {
    async fn store(&self, upload: ImageUpload, folder: &str) -> Result<StoredImage, ServiceError> {
        Ok(StoredImage {
            url: format!("https://images.test/{}/{}", folder, upload.file_name),
            file_id: new_id(),
            name: upload.file_name,
        })
    }
}

/// Stands in for the rendering service: a text "PDF" naming the invoice,
/// and a "zip" listing one photo URL per line under a header.
#[derive(Default)]
pub struct FakeDocuments;

#[async_trait]
impl InvoiceRenderer for FakeDocuments {
    async fn render_invoice(&self, document: &InvoiceDocument) -> Result<Vec<u8>, ServiceError> {
        let client = document.client.as_ref().map_or("", |c| c.name.as_str());
        Ok(format!(
            "%PDF-1.4\n{} {} {} {}\n",
            document.invoice.invoice_number, document.business.name, client, document.invoice.total_amount
        )
        .into_bytes())
    }
}

#[async_trait]
impl PhotoArchiver for FakeDocuments {
    async fn archive_photos(&self, request: &PhotoArchiveRequest) -> Result<Vec<u8>, ServiceError> {
        let mut listing = format!("PK {}\n", request.archive_name);
        for photo in &request.photos {
            listing.push_str(&photo.image_url);
            listing.push('\n');
        }
        Ok(listing.into_bytes())
    }
}

#[derive(Default)]
pub struct FakePayments;

#[async_trait]
impl PaymentGateway for FakePayments {
    async fn create_checkout_session(&self, order: &CheckoutOrder) -> Result<CheckoutSession, ServiceError> {
        Ok(CheckoutSession {
            session_id: format!("cs_test_{}", new_id()),
            url: format!("https://checkout.test/{}/{}", order.business_id, order.plan_type.as_str()),
        })
    }
}

/// Full service graph over the in-memory store and fake providers.
pub struct TestContext {
    pub services: Services,
    pub store: Arc<dyn Store>,
    pub email: Arc<RecordingEmail>,
    pub identity: Arc<FakeIdentity>,
    pub resolver: TenantResolver,
    sequence: AtomicUsize,
}

impl TestContext {
    pub fn new() -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let email = Arc::new(RecordingEmail::default());
        let identity = Arc::new(FakeIdentity::default());

        let services = Services::new(Dependencies {
            store: store.clone(),
            identity: identity.clone(),
            email: email.clone(),
            storage: Arc::new(FakeStorage),
            payments: Arc::new(FakePayments),
            renderer: Arc::new(FakeDocuments),
            archiver: Arc::new(FakeDocuments),
            settings: ServiceSettings {
                webhook_secret: Some(WEBHOOK_SECRET.to_string()),
                ..ServiceSettings::default()
            },
        });

        Self {
            resolver: services.tenants.clone(),
            services,
            store,
            email,
            identity,
            sequence: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> usize {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn email_sender(&self) -> Arc<dyn EmailSender> {
        self.email.clone()
    }

    /// Registers the account with the identity provider and stores the local row.
    pub async fn user(&self, email: &str, role: UserRole) -> AuthUser {
        let id = self.identity.register(email, TEST_PASSWORD);
        let user = self.store.save_user(&User::new(id, email, role)).await.unwrap();
        AuthUser::new(user.id, user.email, user.role)
    }

    pub async fn owner(&self, email: &str) -> AuthUser {
        self.user(email, UserRole::Owner).await
    }

    pub async fn admin(&self, email: &str) -> AuthUser {
        self.user(email, UserRole::Admin).await
    }

    pub async fn cleaner(&self, email: &str) -> AuthUser {
        self.user(email, UserRole::Cleaner).await
    }

    /// Fresh owner plus a business on the FREE plan.
    pub async fn owner_with_business(&self, name: &str) -> (AuthUser, Business) {
        let owner = self.owner(&format!("owner{}@example.com", self.next())).await;
        let business = Business::new(&owner.id, name);
        self.store
            .insert_business(&business, &Subscription::free(&business.id))
            .await
            .unwrap();
        (owner, business)
    }

    pub async fn cleaner_linked_to(&self, business: &Business) -> AuthUser {
        let cleaner = self.cleaner(&format!("cleaner{}@example.com", self.next())).await;
        self.store
            .insert_link(&BusinessCleaner::active(&business.id, &cleaner.id, &business.user_id))
            .await
            .unwrap();
        cleaner
    }

    pub async fn deactivate(&self, business: &Business, cleaner: &AuthUser) {
        let mut link = self.store.find_link(&business.id, &cleaner.id).await.unwrap().unwrap();
        link.status = CleanerStatus::Inactive;
        self.store.save_link(&link).await.unwrap();
    }

    async fn insert_client(&self, business: &Business, name: &str, notes: Option<ClientNotes>) -> Client {
        let now = Utc::now();
        let client = Client {
            id: new_id(),
            business_id: business.id.clone(),
            name: name.to_string(),
            phone: Some("07700 900123".to_string()),
            address: Some("1 High Street".to_string()),
            notes: notes.map(Json),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_client(&client).await.unwrap();
        client
    }

    pub async fn client_for(&self, business: &Business, name: &str) -> Client {
        self.insert_client(business, name, None).await
    }

    pub async fn client_with_email(&self, business: &Business, name: &str, email: &str) -> Client {
        let notes = ClientNotes { email: Some(email.to_string()), ..Default::default() };
        self.insert_client(business, name, Some(notes)).await
    }

    /// ONE_OFF, SCHEDULED, reminder on with the default offset.
    pub async fn job_for(
        &self,
        business: &Business,
        client: &Client,
        cleaner: Option<&AuthUser>,
        scheduled_date: DateTime<Utc>,
    ) -> Job {
        let now = Utc::now();
        let job = Job {
            id: new_id(),
            business_id: business.id.clone(),
            client_id: client.id.clone(),
            cleaner_id: cleaner.map(|c| c.id.clone()),
            job_type: JobType::OneOff,
            frequency: None,
            scheduled_date,
            scheduled_time: None,
            status: JobStatus::Scheduled,
            reminder_enabled: true,
            reminder_time: DEFAULT_REMINDER_TIME.to_string(),
            reminder_sent: false,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_jobs(std::slice::from_ref(&job), &[]).await.unwrap();
        job
    }

    /// 100.00 invoice raised through the service, so numbering applies.
    pub async fn invoice_for(&self, owner: &AuthUser, job: &Job) -> Invoice {
        self.services
            .invoices
            .create_from_job(owner, &job.id, CreateInvoice { amount: Decimal::new(10000, 2) })
            .await
            .unwrap()
    }
}
