use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::Utc;

use crate::auth::AuthUser;
use crate::database::models::Invoice;
use crate::middleware::{ApiJson, ApiQuery, ApiResponse, ApiResult, Attachment, DownloadResult};
use crate::notifications::WhatsAppLink;
use crate::services::invoice_service::{
    CreateInvoice, InvoiceDetail, InvoicePage, InvoiceQuery, InvoiceSummary, UpdateInvoice,
};
use crate::services::AppState;

/// GET /invoices?page&limit&status - overdue is derived at read time
pub async fn invoice_list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<InvoiceQuery>,
) -> ApiResult<InvoicePage> {
    Ok(ApiResponse::success(state.invoices.list(&user, query, Utc::now()).await?))
}

pub async fn summary_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<InvoiceSummary> {
    Ok(ApiResponse::success(state.invoices.summary(&user, Utc::now()).await?))
}

/// POST /invoices/from-job/:jobId - at most one invoice per job
pub async fn from_job_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<String>,
    ApiJson(body): ApiJson<CreateInvoice>,
) -> ApiResult<Invoice> {
    Ok(ApiResponse::created(state.invoices.create_from_job(&user, &job_id, body).await?))
}

pub async fn invoice_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(invoice_id): Path<String>,
) -> ApiResult<InvoiceDetail> {
    Ok(ApiResponse::success(state.invoices.get(&user, &invoice_id, Utc::now()).await?))
}

/// PUT /invoices/:id {status: PAID, paymentMethod}
pub async fn invoice_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(invoice_id): Path<String>,
    ApiJson(body): ApiJson<UpdateInvoice>,
) -> ApiResult<Invoice> {
    Ok(ApiResponse::success(state.invoices.mark_paid(&user, &invoice_id, body).await?))
}

pub async fn whatsapp_link_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(invoice_id): Path<String>,
) -> ApiResult<WhatsAppLink> {
    Ok(ApiResponse::success(state.invoices.whatsapp_link(&user, &invoice_id).await?))
}

/// GET /invoices/:id/pdf - attachment named after the invoice number
pub async fn pdf_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(invoice_id): Path<String>,
) -> DownloadResult {
    Ok(Attachment(state.documents.invoice_pdf(&user, &invoice_id).await?))
}
