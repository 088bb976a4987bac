// Feature services
//
// Every service takes the authenticated caller, resolves the tenant through
// `TenantResolver`, asks the access policy, and only then touches storage.
// Handlers stay thin: extract, call one service method, wrap the result.

pub mod admin_service;
pub mod auth_service;
pub mod business_service;
pub mod client_service;
pub mod dashboard_service;
pub mod document_service;
pub mod invoice_service;
pub mod job_service;
pub mod payment_service;
pub mod report_service;
pub mod roster_service;
pub mod subscription_service;
pub mod tenant;
pub mod upload_service;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{IdentityProvider, SupabaseIdentity};
use crate::config::AppConfig;
use crate::database::{Page, Store};
use crate::error::{ServiceError, Validator};
use crate::http::outbound_client;
use crate::notifications::{EmailSender, HttpEmailSender};

pub use admin_service::AdminService;
pub use auth_service::AuthService;
pub use business_service::BusinessService;
pub use client_service::ClientService;
pub use dashboard_service::DashboardService;
pub use document_service::{DocumentService, InvoiceRenderer, PhotoArchiver, RemoteDocuments};
pub use invoice_service::InvoiceService;
pub use job_service::JobService;
pub use payment_service::{PaymentGateway, PaymentService, StripeGateway};
pub use report_service::ReportService;
pub use roster_service::RosterService;
pub use subscription_service::SubscriptionService;
pub use tenant::{TenantResolver, TenantScope};
pub use upload_service::{ImageKitStorage, ImageStorage, UploadService};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Midnight UTC of the day containing `at`.
pub(crate) fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// `[first of this month, first of next month)`, midnight UTC.
pub(crate) fn month_bounds(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let first = NaiveDate::from_ymd_opt(at.year(), at.month(), 1).unwrap_or(at.date_naive());
    let next = if at.month() == 12 {
        NaiveDate::from_ymd_opt(at.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(at.year(), at.month() + 1, 1)
    }
    .unwrap_or(first);
    (first.and_time(NaiveTime::MIN).and_utc(), next.and_time(NaiveTime::MIN).and_utc())
}

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// `?page=&limit=` on paginated listings. Pages count from 1.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn resolve(&self) -> ServiceResult<(i64, Page)> {
        let page = self.page.unwrap_or(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT);

        let mut v = Validator::new();
        v.check(page >= 1, "page", "Page must be at least 1");
        v.check((1..=MAX_PAGE_LIMIT).contains(&limit), "limit", "Limit must be between 1 and 100");
        v.finish()?;

        Ok((page, Page { offset: (page - 1) * limit, limit }))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PageInfo {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        Self { page, limit, total, total_pages: (total + limit - 1) / limit }
    }
}

/// Loose shape check; the identity provider is the real authority on addresses.
pub(crate) fn is_email(value: &str) -> bool {
    let value = value.trim();
    if value.contains(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Non-secret knobs the services read at runtime.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub frontend_url: String,
    pub invitation_expiry_days: i64,
    pub webhook_secret: Option<String>,
    pub upload_folder: String,
    pub max_upload_bytes: usize,
}

impl ServiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            frontend_url: config.security.frontend_url.trim_end_matches('/').to_string(),
            invitation_expiry_days: config.security.invitation_expiry_days,
            webhook_secret: config.payments.stripe_webhook_secret.clone(),
            upload_folder: config.storage.upload_folder.clone(),
            max_upload_bytes: config.storage.max_upload_bytes,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            invitation_expiry_days: 7,
            webhook_secret: None,
            upload_folder: "job-photos".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Storage plus the external providers, wired once at startup.
#[derive(Clone)]
pub struct Dependencies {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub email: Arc<dyn EmailSender>,
    pub storage: Arc<dyn ImageStorage>,
    pub payments: Arc<dyn PaymentGateway>,
    pub renderer: Arc<dyn InvoiceRenderer>,
    pub archiver: Arc<dyn PhotoArchiver>,
    pub settings: ServiceSettings,
}

impl Dependencies {
    /// Production wiring: Supabase identity, HTTP email, ImageKit, Stripe,
    /// and the remote document renderer.
    pub fn from_config(config: &AppConfig, store: Arc<dyn Store>) -> Self {
        let http = outbound_client();
        let documents = Arc::new(RemoteDocuments::new(&config.storage, http.clone()));
        Self {
            store,
            identity: Arc::new(SupabaseIdentity::new(&config.identity, http.clone())),
            email: Arc::new(HttpEmailSender::new(&config.email, http.clone())),
            storage: Arc::new(ImageKitStorage::new(&config.storage, http.clone())),
            payments: Arc::new(StripeGateway::new(&config.payments, &config.security.frontend_url, http)),
            renderer: documents.clone(),
            archiver: documents,
            settings: ServiceSettings::from_config(config),
        }
    }
}

/// Shared application state handed to every handler.
pub struct Services {
    pub store: Arc<dyn Store>,
    pub email: Arc<dyn EmailSender>,
    pub tenants: TenantResolver,
    pub auth: AuthService,
    pub business: BusinessService,
    pub roster: RosterService,
    pub clients: ClientService,
    pub jobs: JobService,
    pub invoices: InvoiceService,
    pub subscriptions: SubscriptionService,
    pub payments: PaymentService,
    pub dashboard: DashboardService,
    pub reports: ReportService,
    pub documents: DocumentService,
    pub admin: AdminService,
    pub uploads: UploadService,
}

pub type AppState = Arc<Services>;

impl Services {
    pub fn new(deps: Dependencies) -> Self {
        let Dependencies { store, identity, email, storage, payments, renderer, archiver, settings } = deps;
        let tenants = TenantResolver::new(store.clone());
        let subscriptions = SubscriptionService::new(store.clone(), tenants.clone());

        Self {
            auth: AuthService::new(store.clone(), identity.clone(), email.clone(), settings.clone()),
            business: BusinessService::new(store.clone(), tenants.clone()),
            roster: RosterService::new(store.clone(), tenants.clone(), identity, email.clone(), settings.clone()),
            clients: ClientService::new(store.clone(), tenants.clone()),
            jobs: JobService::new(store.clone(), tenants.clone(), subscriptions.clone()),
            invoices: InvoiceService::new(store.clone(), tenants.clone()),
            payments: PaymentService::new(store.clone(), tenants.clone(), payments, subscriptions.clone(), settings.clone()),
            dashboard: DashboardService::new(store.clone(), tenants.clone()),
            reports: ReportService::new(store.clone(), tenants.clone()),
            documents: DocumentService::new(store.clone(), tenants.clone(), renderer, archiver),
            admin: AdminService::new(store.clone()),
            uploads: UploadService::new(storage, settings),
            subscriptions,
            tenants,
            email,
            store,
        }
    }
}
