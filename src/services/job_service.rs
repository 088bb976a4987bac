use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::{start_of_day, ServiceResult, SubscriptionService, TenantResolver, TenantScope};
use crate::auth::{Action, AuthUser};
use crate::database::models::{new_id, ChecklistItem, Client, Invoice, Job, JobFilter, JobPhoto};
use crate::database::{DatabaseError, Store};
use crate::error::{ServiceError, Validator};
use crate::notifications::whatsapp::{self, PhotoSelection};
use crate::notifications::WhatsAppLink;
use crate::scheduler::reminders::{is_valid_reminder_time, DEFAULT_REMINDER_TIME};
use crate::types::{CleanerStatus, JobFrequency, JobStatus, JobType, PhotoType};

/// Future occurrences materialized when a recurring job is created.
pub const RECURRING_OCCURRENCES: usize = 12;

const MAX_CHECKLIST_ITEM_LEN: usize = 200;

/// The `count` dates following `start` at the frequency's cadence.
pub fn recurring_dates(start: DateTime<Utc>, frequency: JobFrequency, count: usize) -> Vec<DateTime<Utc>> {
    (1..=count as i64)
        .map(|n| start + Duration::days(frequency.interval_days() * n))
        .collect()
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

fn valid_time(value: &str) -> bool {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").is_ok()
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJob {
    pub client_id: String,
    #[serde(default)]
    pub cleaner_id: Option<String>,
    #[serde(rename = "type")]
    pub job_type: JobType,
    #[serde(default)]
    pub frequency: Option<JobFrequency>,
    pub scheduled_date: String,
    #[serde(default)]
    pub scheduled_time: Option<String>,
    #[serde(default)]
    pub reminder_enabled: Option<bool>,
    #[serde(default)]
    pub reminder_time: Option<String>,
    #[serde(default)]
    pub checklist: Vec<String>,
}

/// Partial update. An empty `cleanerId` unassigns the job.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJob {
    #[serde(default)]
    pub cleaner_id: Option<String>,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub scheduled_time: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub reminder_enabled: Option<bool>,
    #[serde(default)]
    pub reminder_time: Option<String>,
}

impl UpdateJob {
    fn touches_details(&self) -> bool {
        self.scheduled_date.is_some()
            || self.scheduled_time.is_some()
            || self.reminder_enabled.is_some()
            || self.reminder_time.is_some()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQuery {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPhoto {
    pub image_url: String,
    pub photo_type: PhotoType,
}

#[derive(Debug, Deserialize)]
pub struct UpdateChecklistItem {
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl From<&Client> for ClientSummary {
    fn from(client: &Client) -> Self {
        Self {
            id: client.id.clone(),
            name: client.name.clone(),
            phone: client.phone.clone(),
            address: client.address.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListItem {
    #[serde(flatten)]
    pub job: Job,
    pub client: Option<ClientSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanerSummary {
    pub id: String,
    pub email: String,
}

/// Everything the job screen shows. `invoice` never reaches cleaners.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: Job,
    pub client: Option<Client>,
    pub cleaner: Option<CleanerSummary>,
    pub checklist: Vec<ChecklistItem>,
    pub photos: Vec<JobPhoto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<Invoice>,
}

pub struct JobService {
    store: Arc<dyn Store>,
    tenants: TenantResolver,
    subscriptions: SubscriptionService,
}

impl JobService {
    pub fn new(store: Arc<dyn Store>, tenants: TenantResolver, subscriptions: SubscriptionService) -> Self {
        Self { store, tenants, subscriptions }
    }

    /// Cleaner must hold an ACTIVE roster link in the tenant.
    async fn ensure_assignable(&self, business_id: &str, cleaner_id: &str) -> ServiceResult<()> {
        match self.store.find_link(business_id, cleaner_id).await? {
            Some(link) if link.status == CleanerStatus::Active => Ok(()),
            _ => Err(ServiceError::bad_request("Cleaner is not an active member of this business")),
        }
    }

    /// Loads a job the caller may see; anything else is NotFound.
    async fn visible_job(&self, scope: &TenantScope, job_id: &str) -> ServiceResult<Job> {
        self.store
            .find_job(&scope.business_id, job_id)
            .await?
            .filter(|job| match scope.assignee() {
                Some(me) => job.cleaner_id.as_deref() == Some(me),
                None => true,
            })
            .ok_or_else(|| ServiceError::not_found("Job not found"))
    }

    /// Creates the job and, for recurring jobs, its twelve future siblings in
    /// one write. Returns the first occurrence.
    pub async fn create(&self, user: &AuthUser, request: CreateJob) -> ServiceResult<JobDetail> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::CreateJob)?;
        let now = Utc::now();

        let mut v = Validator::new();
        let scheduled_date = parse_date(&request.scheduled_date);
        match scheduled_date {
            None => v.add("scheduledDate", "Scheduled date must be a date (YYYY-MM-DD) or timestamp"),
            Some(date) => v.check(date >= start_of_day(now), "scheduledDate", "Scheduled date cannot be in the past"),
        }
        if let Some(time) = request.scheduled_time.as_deref().filter(|t| !t.trim().is_empty()) {
            v.check(valid_time(time), "scheduledTime", "Scheduled time must be HH:MM");
        }
        if request.job_type == JobType::Recurring {
            v.check(request.frequency.is_some(), "frequency", "Frequency is required for recurring jobs");
        }
        if let Some(reminder_time) = &request.reminder_time {
            v.check(is_valid_reminder_time(reminder_time), "reminderTime", "Invalid reminder time");
        }
        for text in &request.checklist {
            v.check(
                !text.trim().is_empty() && text.trim().chars().count() <= MAX_CHECKLIST_ITEM_LEN,
                "checklist",
                "Checklist items must be 1 to 200 characters",
            );
        }
        v.finish()?;
        let scheduled_date = scheduled_date.ok_or_else(|| ServiceError::invalid("scheduledDate", "Invalid date"))?;

        let client = self
            .store
            .find_client(&scope.business_id, &request.client_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Client not found"))?;
        let cleaner_id = blank_to_none(request.cleaner_id);
        if let Some(cleaner_id) = &cleaner_id {
            self.ensure_assignable(&scope.business_id, cleaner_id).await?;
        }

        let frequency = match request.job_type {
            JobType::Recurring => request.frequency,
            JobType::OneOff => None,
        };
        let first = Job {
            id: new_id(),
            business_id: scope.business_id.clone(),
            client_id: client.id.clone(),
            cleaner_id,
            job_type: request.job_type,
            frequency,
            scheduled_date,
            scheduled_time: blank_to_none(request.scheduled_time),
            status: JobStatus::Scheduled,
            reminder_enabled: request.reminder_enabled.unwrap_or(true),
            reminder_time: request.reminder_time.unwrap_or_else(|| DEFAULT_REMINDER_TIME.to_string()),
            reminder_sent: false,
            created_at: now,
            updated_at: now,
        };

        let mut jobs = vec![first.clone()];
        if let Some(frequency) = frequency {
            jobs.extend(
                recurring_dates(scheduled_date, frequency, RECURRING_OCCURRENCES)
                    .into_iter()
                    .map(|date| Job { id: new_id(), scheduled_date: date, ..first.clone() }),
            );
        }
        // Every occurrence gets its own unticked copy of the checklist.
        let items: Vec<ChecklistItem> = jobs
            .iter()
            .flat_map(|job| request.checklist.iter().map(|text| ChecklistItem::new(&job.id, text.trim())))
            .collect();

        self.store.insert_jobs(&jobs, &items).await?;
        if let Err(e) = self.subscriptions.record_job_created(&scope.business_id, now).await {
            tracing::warn!(business_id = %scope.business_id, "Failed to record job usage: {}", e);
        }

        tracing::info!(
            business_id = %scope.business_id,
            job_id = %first.id,
            occurrences = jobs.len(),
            "Job created"
        );
        Ok(JobDetail {
            job: first.clone(),
            client: Some(client),
            cleaner: None,
            checklist: items.into_iter().filter(|item| item.job_id == first.id).collect(),
            photos: Vec::new(),
            invoice: None,
        })
    }

    async fn list_with_clients(&self, scope: &TenantScope, filter: JobFilter) -> ServiceResult<Vec<JobListItem>> {
        let jobs = self.store.list_jobs(&filter).await?;
        let clients: HashMap<String, ClientSummary> = self
            .store
            .list_clients(&scope.business_id)
            .await?
            .iter()
            .map(|client| (client.id.clone(), ClientSummary::from(client)))
            .collect();

        Ok(jobs
            .into_iter()
            .map(|job| JobListItem { client: clients.get(&job.client_id).cloned(), job })
            .collect())
    }

    /// Owners see the whole tenant; cleaners only their assignments. No
    /// tenant yet means an empty list.
    pub async fn list(&self, user: &AuthUser, query: JobQuery) -> ServiceResult<Vec<JobListItem>> {
        let Some(scope) = self.tenants.resolve_optional(user).await? else {
            return Ok(Vec::new());
        };
        scope.require(Action::ViewJobs)?;

        let mut v = Validator::new();
        let from = query.from.as_deref().map(parse_date);
        let to = query.to.as_deref().map(parse_date);
        v.check(!matches!(from, Some(None)), "from", "Invalid date");
        v.check(!matches!(to, Some(None)), "to", "Invalid date");
        v.finish()?;

        let filter = JobFilter {
            cleaner_id: scope.assignee().map(str::to_string),
            client_id: blank_to_none(query.client_id),
            status: query.status,
            from: from.flatten(),
            // A bare `to` date includes that whole day
            to: to.flatten().map(|to| {
                if to == start_of_day(to) {
                    to + Duration::days(1)
                } else {
                    to
                }
            }),
            ..JobFilter::tenant(&scope.business_id)
        };
        self.list_with_clients(&scope, filter).await
    }

    pub async fn today(&self, user: &AuthUser, now: DateTime<Utc>) -> ServiceResult<Vec<JobListItem>> {
        let Some(scope) = self.tenants.resolve_optional(user).await? else {
            return Ok(Vec::new());
        };
        scope.require(Action::ViewJobs)?;

        let day = start_of_day(now);
        let filter = JobFilter {
            cleaner_id: scope.assignee().map(str::to_string),
            from: Some(day),
            to: Some(day + Duration::days(1)),
            ..JobFilter::tenant(&scope.business_id)
        };
        self.list_with_clients(&scope, filter).await
    }

    pub async fn get(&self, user: &AuthUser, job_id: &str) -> ServiceResult<JobDetail> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::ViewJobs)?;
        let job = self.visible_job(&scope, job_id).await?;
        self.detail(&scope, job).await
    }

    async fn detail(&self, scope: &TenantScope, job: Job) -> ServiceResult<JobDetail> {
        let client = self.store.find_client(&scope.business_id, &job.client_id).await?;
        let cleaner = match &job.cleaner_id {
            Some(id) => self
                .store
                .find_user(id)
                .await?
                .map(|user| CleanerSummary { id: user.id, email: user.email }),
            None => None,
        };
        let checklist = self.store.checklist(&job.id).await?;
        let photos = self.store.photos(&job.id).await?;
        let invoice = if scope.can(Action::ViewInvoices) {
            self.store.find_invoice_for_job(&job.id).await?
        } else {
            None
        };

        Ok(JobDetail { job, client, cleaner, checklist, photos, invoice })
    }

    /// Cleaners may move status forward; everything else needs owner rights.
    pub async fn update(&self, user: &AuthUser, job_id: &str, request: UpdateJob) -> ServiceResult<Job> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::ViewJobs)?;
        if request.status.is_some() {
            scope.require(Action::UpdateJobStatus)?;
        }
        if request.touches_details() {
            scope.require(Action::EditJob)?;
        }
        if request.cleaner_id.is_some() {
            scope.require(Action::AssignCleaner)?;
        }

        let mut job = self.visible_job(&scope, job_id).await?;
        let previous = job.status;
        let now = Utc::now();

        if job.status == JobStatus::Completed && (request.touches_details() || request.cleaner_id.is_some()) {
            return Err(ServiceError::conflict("Completed jobs cannot be edited"));
        }

        let mut v = Validator::new();
        let new_date = request.scheduled_date.as_deref().map(parse_date);
        match new_date {
            Some(None) => v.add("scheduledDate", "Scheduled date must be a date (YYYY-MM-DD) or timestamp"),
            Some(Some(date)) => v.check(date >= start_of_day(now), "scheduledDate", "Scheduled date cannot be in the past"),
            None => {}
        }
        if let Some(time) = request.scheduled_time.as_deref().filter(|t| !t.trim().is_empty()) {
            v.check(valid_time(time), "scheduledTime", "Scheduled time must be HH:MM");
        }
        if let Some(reminder_time) = &request.reminder_time {
            v.check(is_valid_reminder_time(reminder_time), "reminderTime", "Invalid reminder time");
        }
        v.finish()?;

        if let Some(status) = request.status {
            if !job.status.can_transition_to(status) {
                return Err(ServiceError::conflict(format!(
                    "Job status cannot move back from {:?} to {:?}",
                    job.status, status
                )));
            }
            job.status = status;
        }

        if let Some(cleaner_id) = request.cleaner_id {
            match blank_to_none(Some(cleaner_id)) {
                Some(id) => {
                    self.ensure_assignable(&scope.business_id, &id).await?;
                    job.cleaner_id = Some(id);
                }
                None => job.cleaner_id = None,
            }
        }

        if let Some(Some(date)) = new_date {
            if date != job.scheduled_date {
                job.reminder_sent = false;
            }
            job.scheduled_date = date;
        }
        if request.scheduled_time.is_some() {
            job.scheduled_time = blank_to_none(request.scheduled_time);
        }
        if let Some(enabled) = request.reminder_enabled {
            job.reminder_enabled = enabled;
            if enabled {
                job.reminder_sent = false;
            }
        }
        if let Some(reminder_time) = request.reminder_time {
            job.reminder_time = reminder_time;
            job.reminder_sent = false;
        }

        job.updated_at = now;
        match self.store.save_job(&job, previous).await {
            Ok(()) => {}
            Err(DatabaseError::Conflict(_)) => {
                return Err(ServiceError::conflict("Job was changed by someone else, reload and try again"));
            }
            Err(err) => return Err(err.into()),
        }
        tracing::info!(business_id = %scope.business_id, job_id, status = ?job.status, "Job updated");
        Ok(job)
    }

    /// Only SCHEDULED jobs may be deleted.
    pub async fn delete(&self, user: &AuthUser, job_id: &str) -> ServiceResult<()> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::DeleteJob)?;
        let job = self.visible_job(&scope, job_id).await?;

        if !job.status.is_deletable() || !self.store.delete_scheduled_job(&scope.business_id, job_id).await? {
            return Err(ServiceError::conflict("Only scheduled jobs can be deleted"));
        }
        tracing::info!(business_id = %scope.business_id, job_id, "Job deleted");
        Ok(())
    }

    pub async fn add_photo(&self, user: &AuthUser, job_id: &str, request: AddPhoto) -> ServiceResult<JobPhoto> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::UploadJobPhoto)?;
        let job = self.visible_job(&scope, job_id).await?;

        let image_url = request.image_url.trim();
        if !(image_url.starts_with("https://") || image_url.starts_with("http://")) {
            return Err(ServiceError::invalid("imageUrl", "Image URL must be an http(s) URL"));
        }

        let photo = JobPhoto {
            id: new_id(),
            job_id: job.id,
            image_url: image_url.to_string(),
            photo_type: request.photo_type,
            uploaded_at: Utc::now(),
        };
        self.store.insert_photo(&photo).await?;
        tracing::info!(job_id, photo_type = ?photo.photo_type, "Job photo added");
        Ok(photo)
    }

    pub async fn update_checklist_item(
        &self,
        user: &AuthUser,
        job_id: &str,
        item_id: &str,
        request: UpdateChecklistItem,
    ) -> ServiceResult<ChecklistItem> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::UpdateChecklist)?;
        let job = self.visible_job(&scope, job_id).await?;

        let mut item = self
            .store
            .find_checklist_item(&job.id, item_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Checklist item not found"))?;
        item.completed = request.completed;
        item.updated_at = Utc::now();
        self.store.save_checklist_item(&item).await?;
        Ok(item)
    }

    async fn message_context(&self, user: &AuthUser, job_id: &str) -> ServiceResult<(TenantScope, Job, Client)> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::ViewJobs)?;
        let job = self.visible_job(&scope, job_id).await?;
        let client = self
            .store
            .find_client(&scope.business_id, &job.client_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Client not found"))?;
        Ok((scope, job, client))
    }

    pub async fn whatsapp_photos(&self, user: &AuthUser, job_id: &str, photo_type: Option<&str>) -> ServiceResult<WhatsAppLink> {
        let selection = PhotoSelection::parse(photo_type)
            .ok_or_else(|| ServiceError::invalid("photoType", "photoType must be BEFORE, AFTER or ALL"))?;
        let (scope, job, client) = self.message_context(user, job_id).await?;
        let business = self
            .store
            .find_business(&scope.business_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Business not found"))?;

        let photos = self.store.photos(&job.id).await?;
        let message = whatsapp::photos_message(&job, &business, &client, &photos, selection);
        Ok(WhatsAppLink::build(client.phone.as_deref(), message).with_photos(photos))
    }

    pub async fn whatsapp_completion(&self, user: &AuthUser, job_id: &str) -> ServiceResult<WhatsAppLink> {
        let (scope, job, client) = self.message_context(user, job_id).await?;
        let business = self
            .store
            .find_business(&scope.business_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Business not found"))?;

        let checklist = self.store.checklist(&job.id).await?;
        let photos = self.store.photos(&job.id).await?;
        let message = whatsapp::completion_message(&job, &business, &client, &checklist, &photos);
        Ok(WhatsAppLink::build(client.phone.as_deref(), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use chrono::TimeZone;

    fn tomorrow() -> String {
        (Utc::now() + Duration::days(1)).format("%Y-%m-%d").to_string()
    }

    fn one_off(client_id: &str) -> CreateJob {
        CreateJob {
            client_id: client_id.to_string(),
            cleaner_id: None,
            job_type: JobType::OneOff,
            frequency: None,
            scheduled_date: tomorrow(),
            scheduled_time: Some("09:30".into()),
            reminder_enabled: None,
            reminder_time: None,
            checklist: vec!["Kitchen".into(), "Bathroom".into()],
        }
    }

    #[test]
    fn weekly_recurrence_from_new_year() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let dates = recurring_dates(start, JobFrequency::Weekly, RECURRING_OCCURRENCES);
        assert_eq!(dates.len(), 12);
        assert_eq!(dates[0], Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap());
        assert_eq!(dates[1], Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
        assert_eq!(dates[11], Utc.with_ymd_and_hms(2024, 3, 25, 0, 0, 0).unwrap());

        let biweekly = recurring_dates(start, JobFrequency::BiWeekly, 2);
        assert_eq!(biweekly[1], Utc.with_ymd_and_hms(2024, 1, 29, 0, 0, 0).unwrap());
    }

    #[test]
    fn dates_parse_in_both_shapes() {
        assert_eq!(parse_date("2024-01-08"), Some(Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap()));
        assert_eq!(
            parse_date("2024-01-08T10:00:00+01:00"),
            Some(Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap())
        );
        assert_eq!(parse_date("next tuesday"), None);
    }

    #[tokio::test]
    async fn recurring_create_materializes_twelve_siblings() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;
        let client = ctx.client_for(&business, "Mrs Smith").await;

        let request = CreateJob {
            job_type: JobType::Recurring,
            frequency: Some(JobFrequency::Weekly),
            ..one_off(&client.id)
        };
        let created = ctx.services.jobs.create(&owner, request).await.unwrap();
        assert_eq!(created.checklist.len(), 2);
        assert!(created.job.reminder_enabled);
        assert_eq!(created.job.reminder_time, "1 day");

        let all = ctx.services.jobs.list(&owner, JobQuery::default()).await.unwrap();
        assert_eq!(all.len(), 13);
        assert!(all.iter().all(|item| item.job.status == JobStatus::Scheduled));
        assert!(all.iter().all(|item| item.job.job_type == JobType::Recurring));
        assert_eq!(all[12].job.scheduled_date - all[0].job.scheduled_date, Duration::days(84));
        assert_eq!(all[0].client.as_ref().unwrap().name, "Mrs Smith");

        let mut item_ids = std::collections::HashSet::new();
        for sibling in &all {
            let items = ctx.store.checklist(&sibling.job.id).await.unwrap();
            assert_eq!(items.len(), 2);
            assert!(items.iter().all(|item| !item.completed));
            item_ids.extend(items.into_iter().map(|item| item.id));
        }
        assert_eq!(item_ids.len(), 26);

        let usage = ctx.services.subscriptions.usage(&owner, Utc::now()).await.unwrap();
        assert_eq!(usage.current_month_usage, 1);
    }

    #[tokio::test]
    async fn create_validates_input() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;
        let client = ctx.client_for(&business, "Mrs Smith").await;

        let request = CreateJob {
            job_type: JobType::Recurring,
            scheduled_date: "2001-01-01".into(),
            scheduled_time: Some("25:99".into()),
            reminder_time: Some("3 weeks".into()),
            ..one_off(&client.id)
        };
        match ctx.services.jobs.create(&owner, request).await {
            Err(ServiceError::Validation(fields)) => {
                for field in ["scheduledDate", "scheduledTime", "frequency", "reminderTime"] {
                    assert!(fields.contains_key(field), "missing {}", field);
                }
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn create_checks_client_and_cleaner_belong_to_tenant() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;
        let (_other_owner, other) = ctx.owner_with_business("Other").await;
        let foreign_client = ctx.client_for(&other, "Not yours").await;
        let foreign_cleaner = ctx.cleaner_linked_to(&other).await;
        let client = ctx.client_for(&business, "Mrs Smith").await;

        let err = ctx.services.jobs.create(&owner, one_off(&foreign_client.id)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let request = CreateJob { cleaner_id: Some(foreign_cleaner.id.clone()), ..one_off(&client.id) };
        let err = ctx.services.jobs.create(&owner, request).await.unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn cleaners_see_exactly_their_assignments() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;
        let (_other_owner, other) = ctx.owner_with_business("Other").await;
        let client = ctx.client_for(&business, "Mrs Smith").await;
        let other_client = ctx.client_for(&other, "Elsewhere").await;
        let cleaner = ctx.cleaner_linked_to(&business).await;
        let colleague = ctx.cleaner_linked_to(&business).await;

        let mine = ctx.job_for(&business, &client, Some(&cleaner), Utc::now()).await;
        let theirs = ctx.job_for(&business, &client, Some(&colleague), Utc::now()).await;
        ctx.job_for(&business, &client, None, Utc::now()).await;
        ctx.job_for(&other, &other_client, None, Utc::now()).await;

        let visible = ctx.services.jobs.list(&cleaner, JobQuery::default()).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].job.id, mine.id);
        assert_eq!(ctx.services.jobs.today(&cleaner, Utc::now()).await.unwrap().len(), 1);
        assert_eq!(ctx.services.jobs.list(&owner, JobQuery::default()).await.unwrap().len(), 3);

        let err = ctx.services.jobs.get(&cleaner, &theirs.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn job_detail_hides_invoice_from_cleaner() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;
        let client = ctx.client_for(&business, "Mrs Smith").await;
        let cleaner = ctx.cleaner_linked_to(&business).await;
        let job = ctx.job_for(&business, &client, Some(&cleaner), Utc::now()).await;
        ctx.invoice_for(&owner, &job).await;

        assert!(ctx.services.jobs.get(&owner, &job.id).await.unwrap().invoice.is_some());
        let detail = ctx.services.jobs.get(&cleaner, &job.id).await.unwrap();
        assert!(detail.invoice.is_none());
        assert!(serde_json::to_value(&detail).unwrap().get("invoice").is_none());
        assert_eq!(detail.cleaner.unwrap().id, cleaner.id);
    }

    #[tokio::test]
    async fn status_moves_forward_only() {
        let ctx = TestContext::new();
        let (_owner, business) = ctx.owner_with_business("Sparkle").await;
        let client = ctx.client_for(&business, "Mrs Smith").await;
        let cleaner = ctx.cleaner_linked_to(&business).await;
        let job = ctx.job_for(&business, &client, Some(&cleaner), Utc::now()).await;
        let jobs = &ctx.services.jobs;

        let status = |s| UpdateJob { status: Some(s), ..Default::default() };
        assert_eq!(jobs.update(&cleaner, &job.id, status(JobStatus::InProgress)).await.unwrap().status, JobStatus::InProgress);
        assert!(matches!(
            jobs.update(&cleaner, &job.id, status(JobStatus::Scheduled)).await,
            Err(ServiceError::Conflict(_))
        ));
        assert_eq!(jobs.update(&cleaner, &job.id, status(JobStatus::Completed)).await.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn cleaners_cannot_edit_details() {
        let ctx = TestContext::new();
        let (_owner, business) = ctx.owner_with_business("Sparkle").await;
        let client = ctx.client_for(&business, "Mrs Smith").await;
        let cleaner = ctx.cleaner_linked_to(&business).await;
        let job = ctx.job_for(&business, &client, Some(&cleaner), Utc::now()).await;

        let request = UpdateJob { scheduled_time: Some("07:00".into()), ..Default::default() };
        assert!(matches!(ctx.services.jobs.update(&cleaner, &job.id, request).await, Err(ServiceError::Forbidden)));
        let request = UpdateJob { cleaner_id: Some(String::new()), ..Default::default() };
        assert!(matches!(ctx.services.jobs.update(&cleaner, &job.id, request).await, Err(ServiceError::Forbidden)));
    }

    #[tokio::test]
    async fn owner_updates_reset_reminder_latch_and_unassign() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;
        let client = ctx.client_for(&business, "Mrs Smith").await;
        let cleaner = ctx.cleaner_linked_to(&business).await;
        let mut job = ctx.job_for(&business, &client, Some(&cleaner), Utc::now() + Duration::days(2)).await;
        job.reminder_sent = true;
        ctx.store.save_job(&job, JobStatus::Scheduled).await.unwrap();

        let request = UpdateJob {
            reminder_time: Some("2 hours".into()),
            cleaner_id: Some(String::new()),
            ..Default::default()
        };
        let updated = ctx.services.jobs.update(&owner, &job.id, request).await.unwrap();
        assert!(!updated.reminder_sent);
        assert_eq!(updated.reminder_time, "2 hours");
        assert_eq!(updated.cleaner_id, None);
    }

    #[tokio::test]
    async fn stale_status_write_cannot_reopen_a_completed_job() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;
        let client = ctx.client_for(&business, "Mrs Smith").await;
        let job = ctx.job_for(&business, &client, None, Utc::now()).await;

        // A second writer still holding the SCHEDULED copy.
        let mut stale = job.clone();
        stale.status = JobStatus::InProgress;

        let done = UpdateJob { status: Some(JobStatus::Completed), ..Default::default() };
        ctx.services.jobs.update(&owner, &job.id, done).await.unwrap();

        let err = ctx.store.save_job(&stale, JobStatus::Scheduled).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
        let stored = ctx.store.find_job(&business.id, &job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn only_scheduled_jobs_are_deleted() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;
        let client = ctx.client_for(&business, "Mrs Smith").await;
        let scheduled = ctx.job_for(&business, &client, None, Utc::now()).await;
        let mut started = ctx.job_for(&business, &client, None, Utc::now()).await;
        started.status = JobStatus::InProgress;
        ctx.store.save_job(&started, JobStatus::Scheduled).await.unwrap();

        let err = ctx.services.jobs.delete(&owner, &started.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        let still_there = ctx.store.find_job(&business.id, &started.id).await.unwrap().unwrap();
        assert_eq!(still_there.status, JobStatus::InProgress);

        ctx.services.jobs.delete(&owner, &scheduled.id).await.unwrap();
        assert!(ctx.store.find_job(&business.id, &scheduled.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn photos_checklist_and_whatsapp() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;
        let mut client = ctx.client_for(&business, "Mrs Smith").await;
        let cleaner = ctx.cleaner_linked_to(&business).await;
        let created = ctx
            .services
            .jobs
            .create(&owner, CreateJob { cleaner_id: Some(cleaner.id.clone()), ..one_off(&client.id) })
            .await
            .unwrap();
        let job_id = created.job.id.clone();
        let jobs = &ctx.services.jobs;

        let photo = AddPhoto { image_url: "https://cdn.example.com/a.jpg".into(), photo_type: PhotoType::After };
        jobs.add_photo(&cleaner, &job_id, photo).await.unwrap();
        let item = jobs
            .update_checklist_item(&cleaner, &job_id, &created.checklist[0].id, UpdateChecklistItem { completed: true })
            .await
            .unwrap();
        assert!(item.completed);

        client.phone = None;
        ctx.store.save_client(&client).await.unwrap();
        let missing = jobs.whatsapp_completion(&owner, &job_id).await.unwrap();
        assert!(missing.whatsapp_url.is_none());
        assert!(missing.error.is_some());

        client.phone = Some("07700 900123".into());
        ctx.store.save_client(&client).await.unwrap();
        let link = jobs.whatsapp_completion(&owner, &job_id).await.unwrap();
        assert!(link.whatsapp_url.unwrap().starts_with("https://wa.me/447700900123?text="));
        assert!(link.message.unwrap().contains("1/2 items completed"));

        let photos = jobs.whatsapp_photos(&owner, &job_id, Some("AFTER")).await.unwrap();
        assert_eq!(photos.photos.unwrap().len(), 1);
        assert!(matches!(
            jobs.whatsapp_photos(&owner, &job_id, Some("SIDEWAYS")).await,
            Err(ServiceError::Validation(_))
        ));
    }
}
