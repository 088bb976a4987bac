use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use super::{ServiceResult, TenantResolver};
use crate::auth::{policy, Action, AuthUser};
use crate::database::models::{Business, InvoiceTemplate, Subscription};
use crate::database::{DatabaseError, Store};
use crate::error::{ServiceError, Validator};

const MAX_NAME_LEN: usize = 100;
const MAX_ADDRESS_LEN: usize = 500;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBusiness {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub vat_enabled: Option<bool>,
    #[serde(default)]
    pub vat_number: Option<String>,
    #[serde(default)]
    pub invoice_template: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBusiness {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub invoice_template: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVat {
    pub vat_enabled: bool,
    #[serde(default)]
    pub vat_number: Option<String>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate_fields(name: Option<&str>, address: Option<&str>, template: Option<&str>) -> ServiceResult<()> {
    let mut v = Validator::new();
    if let Some(name) = name {
        let name = name.trim();
        v.check(!name.is_empty(), "name", "Business name is required");
        v.check(name.chars().count() <= MAX_NAME_LEN, "name", "Business name must be at most 100 characters");
    }
    if let Some(address) = address {
        v.check(address.chars().count() <= MAX_ADDRESS_LEN, "address", "Address must be at most 500 characters");
    }
    if let Some(template) = template {
        v.check(
            InvoiceTemplate::parse(template).is_some(),
            "invoiceTemplate",
            "Invoice template must be one of classic, modern, minimal, professional, elegant, bold",
        );
    }
    v.finish()
}

/// The tenant record itself: creation, profile, VAT settings.
pub struct BusinessService {
    store: Arc<dyn Store>,
    tenants: TenantResolver,
}

impl BusinessService {
    pub fn new(store: Arc<dyn Store>, tenants: TenantResolver) -> Self {
        Self { store, tenants }
    }

    /// Owner's business, or the business a cleaner is ACTIVE in.
    pub async fn get(&self, user: &AuthUser) -> ServiceResult<Business> {
        let scope = self.tenants.resolve(user).await?;
        self.store
            .find_business(&scope.business_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Business not found"))
    }

    pub async fn create(&self, user: &AuthUser, request: CreateBusiness) -> ServiceResult<Business> {
        policy::require(user.role, Action::ManageBusiness)?;
        validate_fields(Some(&request.name), request.address.as_deref(), request.invoice_template.as_deref())?;

        if self.store.find_business_by_owner(&user.id).await?.is_some() {
            return Err(ServiceError::conflict("Business already exists for this user"));
        }

        let mut business = Business::new(&user.id, request.name.trim());
        business.phone = blank_to_none(request.phone);
        business.address = blank_to_none(request.address);
        business.vat_enabled = request.vat_enabled.unwrap_or(false);
        business.vat_number = if business.vat_enabled { blank_to_none(request.vat_number) } else { None };
        if let Some(template) = request.invoice_template.as_deref().and_then(InvoiceTemplate::parse) {
            business.invoice_template = template.as_str().to_string();
        }

        match self.store.insert_business(&business, &Subscription::free(&business.id)).await {
            Ok(()) => {}
            Err(DatabaseError::Conflict(_)) => {
                return Err(ServiceError::conflict("Business already exists for this user"))
            }
            Err(e) => return Err(e.into()),
        }

        self.tenants.forget(user);
        tracing::info!(business_id = %business.id, owner = %user.id, "Business created");
        Ok(business)
    }

    async fn owned(&self, user: &AuthUser) -> ServiceResult<Business> {
        policy::require(user.role, Action::ManageBusiness)?;
        let scope = self.tenants.resolve(user).await?;
        self.store
            .find_business(&scope.business_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Business not found"))
    }

    pub async fn update(&self, user: &AuthUser, request: UpdateBusiness) -> ServiceResult<Business> {
        validate_fields(request.name.as_deref(), request.address.as_deref(), request.invoice_template.as_deref())?;
        let mut business = self.owned(user).await?;

        if let Some(name) = request.name {
            business.name = name.trim().to_string();
        }
        if request.phone.is_some() {
            business.phone = blank_to_none(request.phone);
        }
        if request.address.is_some() {
            business.address = blank_to_none(request.address);
        }
        if let Some(template) = request.invoice_template.as_deref().and_then(InvoiceTemplate::parse) {
            business.invoice_template = template.as_str().to_string();
        }
        business.updated_at = Utc::now();

        self.store.save_business(&business).await?;
        tracing::info!(business_id = %business.id, "Business updated");
        Ok(business)
    }

    /// Disabling VAT also clears the registered VAT number.
    pub async fn update_vat(&self, user: &AuthUser, request: UpdateVat) -> ServiceResult<Business> {
        let mut business = self.owned(user).await?;
        business.vat_enabled = request.vat_enabled;
        business.vat_number = if request.vat_enabled { blank_to_none(request.vat_number) } else { None };
        business.updated_at = Utc::now();

        self.store.save_business(&business).await?;
        tracing::info!(business_id = %business.id, vat_enabled = business.vat_enabled, "VAT settings updated");
        Ok(business)
    }
}
