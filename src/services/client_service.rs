use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::sync::Arc;

use super::{is_email, ServiceResult, TenantResolver};
use crate::auth::{Action, AuthUser};
use crate::database::models::{new_id, Client, ClientNotes, Invoice, Job, JobFilter};
use crate::database::Store;
use crate::error::{ServiceError, Validator};

const MAX_NAME_LEN: usize = 100;
const MAX_ADDRESS_LEN: usize = 500;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClient {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<ClientNotes>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClient {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<ClientNotes>,
}

/// A job in a client's history. The invoice is only attached for callers
/// allowed to see invoices.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientJob {
    #[serde(flatten)]
    pub job: Job,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<Invoice>,
}

/// Digits only after dropping spaces, dashes, parentheses and `+`.
pub fn is_valid_phone(phone: &str) -> bool {
    let digits: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '+'))
        .collect();
    (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate(name: Option<&str>, phone: Option<&str>, address: Option<&str>, notes: Option<&ClientNotes>) -> ServiceResult<()> {
    let mut v = Validator::new();
    if let Some(name) = name {
        let name = name.trim();
        v.check(!name.is_empty(), "name", "Client name is required");
        v.check(name.chars().count() <= MAX_NAME_LEN, "name", "Client name must be at most 100 characters");
    }
    if let Some(phone) = phone.filter(|p| !p.trim().is_empty()) {
        v.check(is_valid_phone(phone), "phone", "Invalid phone number format");
    }
    if let Some(address) = address {
        v.check(address.trim().chars().count() <= MAX_ADDRESS_LEN, "address", "Address must be at most 500 characters");
    }
    if let Some(email) = notes.and_then(|n| n.email.as_deref()).filter(|e| !e.trim().is_empty()) {
        v.check(is_email(email), "notes.email", "Invalid email address");
    }
    v.finish()
}

pub struct ClientService {
    store: Arc<dyn Store>,
    tenants: TenantResolver,
}

impl ClientService {
    pub fn new(store: Arc<dyn Store>, tenants: TenantResolver) -> Self {
        Self { store, tenants }
    }

    pub async fn create(&self, user: &AuthUser, request: CreateClient) -> ServiceResult<Client> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::ManageClients)?;
        validate(
            Some(&request.name),
            request.phone.as_deref(),
            request.address.as_deref(),
            request.notes.as_ref(),
        )?;

        let now = Utc::now();
        let client = Client {
            id: new_id(),
            business_id: scope.business_id.clone(),
            name: request.name.trim().to_string(),
            phone: trimmed(request.phone),
            address: trimmed(request.address),
            notes: request.notes.map(Json),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_client(&client).await?;

        tracing::info!(business_id = %scope.business_id, client_id = %client.id, "Client created");
        Ok(client)
    }

    /// A caller with no tenant yet sees an empty list rather than an error.
    pub async fn list(&self, user: &AuthUser) -> ServiceResult<Vec<Client>> {
        let Some(scope) = self.tenants.resolve_optional(user).await? else {
            return Ok(Vec::new());
        };
        scope.require(Action::ViewClients)?;
        Ok(self.store.list_clients(&scope.business_id).await?)
    }

    pub async fn get(&self, user: &AuthUser, client_id: &str) -> ServiceResult<Client> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::ViewClients)?;
        self.store
            .find_client(&scope.business_id, client_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Client not found"))
    }

    pub async fn update(&self, user: &AuthUser, client_id: &str, request: UpdateClient) -> ServiceResult<Client> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::ManageClients)?;
        let mut client = self
            .store
            .find_client(&scope.business_id, client_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Client not found"))?;
        validate(
            request.name.as_deref(),
            request.phone.as_deref(),
            request.address.as_deref(),
            request.notes.as_ref(),
        )?;

        if let Some(name) = request.name {
            client.name = name.trim().to_string();
        }
        if request.phone.is_some() {
            client.phone = trimmed(request.phone);
        }
        if request.address.is_some() {
            client.address = trimmed(request.address);
        }
        if let Some(notes) = request.notes {
            client.notes = Some(Json(notes));
        }
        client.updated_at = Utc::now();
        self.store.save_client(&client).await?;

        tracing::info!(business_id = %scope.business_id, client_id, "Client updated");
        Ok(client)
    }

    pub async fn delete(&self, user: &AuthUser, client_id: &str) -> ServiceResult<()> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::ManageClients)?;
        if self.store.find_client(&scope.business_id, client_id).await?.is_none() {
            return Err(ServiceError::not_found("Client not found"));
        }
        if self.store.client_has_history(&scope.business_id, client_id).await? {
            return Err(ServiceError::conflict(
                "Client has completed jobs or invoices and cannot be deleted",
            ));
        }
        if !self.store.delete_client(&scope.business_id, client_id).await? {
            return Err(ServiceError::conflict("Client history changed while deleting"));
        }
        tracing::info!(business_id = %scope.business_id, client_id, "Client deleted");
        Ok(())
    }

    /// Newest first. Cleaners only see jobs assigned to them.
    pub async fn job_history(&self, user: &AuthUser, client_id: &str) -> ServiceResult<Vec<ClientJob>> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::ViewClients)?;
        if self.store.find_client(&scope.business_id, client_id).await?.is_none() {
            return Err(ServiceError::not_found("Client not found"));
        }

        let filter = JobFilter {
            client_id: Some(client_id.to_string()),
            cleaner_id: scope.assignee().map(str::to_string),
            ..JobFilter::tenant(&scope.business_id)
        };
        let mut jobs = self.store.list_jobs(&filter).await?;
        jobs.reverse();

        let with_invoices = scope.can(Action::ViewInvoices);
        let mut history = Vec::with_capacity(jobs.len());
        for job in jobs {
            let invoice = if with_invoices {
                self.store.find_invoice_for_job(&job.id).await?
            } else {
                None
            };
            history.push(ClientJob { job, invoice });
        }
        Ok(history)
    }
}
