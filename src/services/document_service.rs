//! Downloadable files: invoice PDFs and zipped job photos. Rendering and
//! archiving are delegated to providers behind `InvoiceRenderer` and
//! `PhotoArchiver`; this service only decides who may fetch what.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use super::{ServiceResult, TenantResolver, TenantScope};
use crate::auth::{Action, AuthUser};
use crate::config::StorageConfig;
use crate::database::models::{Business, Client, Invoice, Job, JobPhoto};
use crate::database::Store;
use crate::error::ServiceError;

const SERVICE: &str = "document renderer";

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Everything printed on an invoice.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDocument {
    pub invoice: Invoice,
    pub business: Business,
    pub client: Option<Client>,
    pub job: Option<Job>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoArchiveRequest {
    pub archive_name: String,
    pub photos: Vec<JobPhoto>,
}

/// A file ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct RenderedFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait InvoiceRenderer: Send + Sync {
    async fn render_invoice(&self, document: &InvoiceDocument) -> Result<Vec<u8>, ServiceError>;
}

#[async_trait]
pub trait PhotoArchiver: Send + Sync {
    async fn archive_photos(&self, request: &PhotoArchiveRequest) -> Result<Vec<u8>, ServiceError>;
}

/// HTTP rendering service at `DOCUMENTS_URL`; answers with the raw file body.
pub struct RemoteDocuments {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl RemoteDocuments {
    pub fn new(settings: &StorageConfig, http: reqwest::Client) -> Self {
        Self { http, base_url: settings.documents_url.clone() }
    }

    async fn fetch<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<Vec<u8>, ServiceError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| ServiceError::dependency(SERVICE, "DOCUMENTS_URL is not configured"))?;

        let response = self
            .http
            .post(format!("{}{}", base, path))
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::dependency(SERVICE, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::dependency(SERVICE, format!("{}: {}", status, detail)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::dependency(SERVICE, e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl InvoiceRenderer for RemoteDocuments {
    async fn render_invoice(&self, document: &InvoiceDocument) -> Result<Vec<u8>, ServiceError> {
        self.fetch("/render/invoice", document).await
    }
}

#[async_trait]
impl PhotoArchiver for RemoteDocuments {
    async fn archive_photos(&self, request: &PhotoArchiveRequest) -> Result<Vec<u8>, ServiceError> {
        self.fetch("/archive/photos", request).await
    }
}

pub struct DocumentService {
    store: Arc<dyn Store>,
    tenants: TenantResolver,
    renderer: Arc<dyn InvoiceRenderer>,
    archiver: Arc<dyn PhotoArchiver>,
}

impl DocumentService {
    pub fn new(
        store: Arc<dyn Store>,
        tenants: TenantResolver,
        renderer: Arc<dyn InvoiceRenderer>,
        archiver: Arc<dyn PhotoArchiver>,
    ) -> Self {
        Self { store, tenants, renderer, archiver }
    }

    async fn scope(&self, user: &AuthUser, action: Action) -> ServiceResult<TenantScope> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(action)?;
        Ok(scope)
    }

    pub async fn invoice_pdf(&self, user: &AuthUser, invoice_id: &str) -> ServiceResult<RenderedFile> {
        let scope = self.scope(user, Action::ViewInvoices).await?;
        let invoice = self
            .store
            .find_invoice(&scope.business_id, invoice_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invoice not found"))?;
        let business = self
            .store
            .find_business(&scope.business_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Business not found"))?;
        let client = self.store.find_client(&scope.business_id, &invoice.client_id).await?;
        let job = match &invoice.job_id {
            Some(job_id) => self.store.find_job(&scope.business_id, job_id).await?,
            None => None,
        };

        let file_name = format!("invoice-{}.pdf", invoice.invoice_number);
        let document = InvoiceDocument { invoice, business, client, job };
        let bytes = self.renderer.render_invoice(&document).await?;

        tracing::info!(business_id = %scope.business_id, invoice_id, size = bytes.len(), "Invoice PDF rendered");
        Ok(RenderedFile { file_name, content_type: PDF_CONTENT_TYPE, bytes })
    }

    /// Cleaners may only download photos of jobs assigned to them.
    pub async fn job_photos_zip(&self, user: &AuthUser, job_id: &str) -> ServiceResult<RenderedFile> {
        let scope = self.scope(user, Action::ViewJobs).await?;
        let job = self
            .store
            .find_job(&scope.business_id, job_id)
            .await?
            .filter(|job| scope.assignee().map_or(true, |me| job.cleaner_id.as_deref() == Some(me)))
            .ok_or_else(|| ServiceError::not_found("Job not found"))?;

        let photos = self.store.photos(&job.id).await?;
        if photos.is_empty() {
            return Err(ServiceError::not_found("This job has no photos"));
        }

        let archive_name = format!("job-{}-photos", job.scheduled_date.format("%Y-%m-%d"));
        let request = PhotoArchiveRequest { archive_name: archive_name.clone(), photos };
        let bytes = self.archiver.archive_photos(&request).await?;

        tracing::info!(business_id = %scope.business_id, job_id, photos = request.photos.len(), "Job photos archived");
        Ok(RenderedFile { file_name: format!("{}.zip", archive_name), content_type: ZIP_CONTENT_TYPE, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::job_service::AddPhoto;
    use crate::testing::TestContext;
    use crate::types::PhotoType;
    use chrono::Utc;

    #[tokio::test]
    async fn invoice_pdf_carries_the_invoice_number() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;
        let client = ctx.client_for(&business, "Mrs Smith").await;
        let job = ctx.job_for(&business, &client, None, Utc::now()).await;
        let invoice = ctx.invoice_for(&owner, &job).await;

        let file = ctx.services.documents.invoice_pdf(&owner, &invoice.id).await.unwrap();
        assert_eq!(file.file_name, "invoice-INV-000001.pdf");
        assert_eq!(file.content_type, PDF_CONTENT_TYPE);
        let text = String::from_utf8(file.bytes).unwrap();
        assert!(text.starts_with("%PDF"));
        assert!(text.contains("INV-000001"));
        assert!(text.contains("Sparkle"));
        assert!(text.contains("Mrs Smith"));
    }

    #[tokio::test]
    async fn invoice_pdf_is_hidden_from_cleaners_and_other_tenants() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Alpha").await;
        let (other, _) = ctx.owner_with_business("Beta").await;
        let client = ctx.client_for(&business, "Mrs Smith").await;
        let job = ctx.job_for(&business, &client, None, Utc::now()).await;
        let invoice = ctx.invoice_for(&owner, &job).await;
        let cleaner = ctx.cleaner_linked_to(&business).await;

        let documents = &ctx.services.documents;
        assert!(matches!(documents.invoice_pdf(&cleaner, &invoice.id).await, Err(ServiceError::Forbidden)));
        assert!(matches!(documents.invoice_pdf(&other, &invoice.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn photo_archive_follows_job_visibility() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;
        let client = ctx.client_for(&business, "Mrs Smith").await;
        let assigned = ctx.cleaner_linked_to(&business).await;
        let bystander = ctx.cleaner_linked_to(&business).await;
        let job = ctx.job_for(&business, &client, Some(&assigned), Utc::now()).await;

        let documents = &ctx.services.documents;
        assert!(matches!(documents.job_photos_zip(&owner, &job.id).await, Err(ServiceError::NotFound(_))));

        for photo_type in [PhotoType::Before, PhotoType::After] {
            let photo = AddPhoto { image_url: format!("https://cdn.example.com/{:?}.jpg", photo_type), photo_type };
            ctx.services.jobs.add_photo(&assigned, &job.id, photo).await.unwrap();
        }

        let file = documents.job_photos_zip(&assigned, &job.id).await.unwrap();
        assert_eq!(file.content_type, ZIP_CONTENT_TYPE);
        assert!(file.file_name.starts_with("job-") && file.file_name.ends_with("-photos.zip"));
        let listing = String::from_utf8(file.bytes).unwrap();
        assert_eq!(listing.lines().count(), 3);

        assert!(documents.job_photos_zip(&owner, &job.id).await.is_ok());
        assert!(matches!(
            documents.job_photos_zip(&bystander, &job.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unconfigured_renderer_reports_a_dependency_failure() {
        let documents = RemoteDocuments { http: reqwest::Client::new(), base_url: None };
        let request = PhotoArchiveRequest { archive_name: "job-photos".into(), photos: Vec::new() };
        assert!(matches!(
            documents.archive_photos(&request).await,
            Err(ServiceError::Dependency { .. })
        ));
    }
}
