use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{is_email, start_of_day, ServiceResult, ServiceSettings, TenantResolver};
use crate::auth::credentials::{generate_invitation_token, generate_temp_password, hash_token};
use crate::auth::{policy, Action, AuthUser, IdentityProvider, NewIdentity};
use crate::database::models::{Business, BusinessCleaner, CleanerInvitation, RosterEntry, User};
use crate::database::{DatabaseError, Store};
use crate::error::ServiceError;
use crate::notifications::{templates, EmailSender};
use crate::types::{CleanerStatus, UserRole};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteCleaner {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Result of adding a cleaner. `invitation_url` is only present when a new
/// account was provisioned and still needs a password.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanerInvite {
    #[serde(flatten)]
    pub link: BusinessCleaner,
    pub email: String,
    pub invitation_url: Option<String>,
    pub invitation_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInvitation {
    pub token: String,
    pub password: String,
}

/// Staff roster: which cleaners work for which tenant.
pub struct RosterService {
    store: Arc<dyn Store>,
    tenants: TenantResolver,
    identity: Arc<dyn IdentityProvider>,
    email: Arc<dyn EmailSender>,
    settings: ServiceSettings,
}

impl RosterService {
    pub fn new(
        store: Arc<dyn Store>,
        tenants: TenantResolver,
        identity: Arc<dyn IdentityProvider>,
        email: Arc<dyn EmailSender>,
        settings: ServiceSettings,
    ) -> Self {
        Self { store, tenants, identity, email, settings }
    }

    async fn owner_business(&self, user: &AuthUser) -> ServiceResult<Business> {
        policy::require(user.role, Action::ManageCleaners)?;
        let scope = self.tenants.resolve(user).await?;
        self.store
            .find_business(&scope.business_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Business not found"))
    }

    /// Links an existing cleaner account, or provisions a new one and sends
    /// it a single-use invitation link.
    pub async fn invite(&self, user: &AuthUser, request: InviteCleaner) -> ServiceResult<CleanerInvite> {
        let email = request.email.trim().to_lowercase();
        if !is_email(&email) {
            return Err(ServiceError::invalid("email", "A valid email address is required"));
        }
        let business = self.owner_business(user).await?;

        if let Some(existing) = self.store.find_user_by_email(&email).await? {
            return self.link_existing(user, &business, existing).await;
        }

        let cleaner_id = self
            .identity
            .create_user(&NewIdentity {
                email: email.clone(),
                password: generate_temp_password(),
                name: request.name.or_else(|| email.split('@').next().map(str::to_string)),
            })
            .await?;
        let cleaner = self.store.save_user(&User::new(cleaner_id, &email, UserRole::Cleaner)).await?;

        let link = BusinessCleaner::active(&business.id, &cleaner.id, &user.id);
        self.store.insert_link(&link).await?;

        let token = generate_invitation_token();
        let now = Utc::now();
        let invitation = CleanerInvitation {
            id: crate::database::models::new_id(),
            business_id: business.id.clone(),
            cleaner_id: cleaner.id.clone(),
            email: cleaner.email.clone(),
            token_hash: hash_token(&token),
            expires_at: now + Duration::days(self.settings.invitation_expiry_days),
            accepted_at: None,
            created_at: now,
        };
        self.store.insert_invitation(&invitation).await?;

        let url = format!("{}/invite/{}", self.settings.frontend_url, token);
        let message = templates::cleaner_invitation(&cleaner.email, &business, &url, self.settings.invitation_expiry_days);
        if let Err(e) = self.email.send(&message).await {
            tracing::error!(cleaner = %cleaner.id, "Failed to email invitation: {}", e);
        }

        tracing::info!(business_id = %business.id, cleaner = %cleaner.id, "Cleaner provisioned and invited");
        Ok(CleanerInvite {
            link,
            email: cleaner.email,
            invitation_url: Some(url),
            invitation_expires_at: Some(invitation.expires_at),
        })
    }

    async fn link_existing(&self, user: &AuthUser, business: &Business, existing: User) -> ServiceResult<CleanerInvite> {
        if self.store.find_link(&business.id, &existing.id).await?.is_some() {
            return Err(ServiceError::conflict("Cleaner is already linked to this business"));
        }
        if existing.role != UserRole::Cleaner {
            return Err(ServiceError::bad_request("Cannot add an owner as a cleaner"));
        }
        if self.store.find_active_link(&existing.id).await?.is_some() {
            return Err(ServiceError::conflict("Cleaner is already active with another business"));
        }

        let link = BusinessCleaner::active(&business.id, &existing.id, &user.id);
        match self.store.insert_link(&link).await {
            Ok(()) => {}
            Err(DatabaseError::Conflict(_)) => {
                return Err(ServiceError::conflict("Cleaner is already active with another business"))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(business_id = %business.id, cleaner = %existing.id, "Existing cleaner linked");
        Ok(CleanerInvite {
            link,
            email: existing.email,
            invitation_url: None,
            invitation_expires_at: None,
        })
    }

    /// Every roster entry with job totals, in one grouped query.
    pub async fn list(&self, user: &AuthUser) -> ServiceResult<Vec<RosterEntry>> {
        let business = self.owner_business(user).await?;
        let day_start = start_of_day(Utc::now());
        let entries = self
            .store
            .list_roster(&business.id, day_start, day_start + Duration::days(1))
            .await?;
        Ok(entries)
    }

    async fn link(&self, business_id: &str, cleaner_id: &str) -> ServiceResult<BusinessCleaner> {
        self.store
            .find_link(business_id, cleaner_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Cleaner not found"))
    }

    pub async fn deactivate(&self, user: &AuthUser, cleaner_id: &str) -> ServiceResult<BusinessCleaner> {
        let business = self.owner_business(user).await?;
        let mut link = self.link(&business.id, cleaner_id).await?;

        link.status = CleanerStatus::Inactive;
        link.updated_at = Utc::now();
        self.store.save_link(&link).await?;

        tracing::info!(business_id = %business.id, cleaner = cleaner_id, "Cleaner deactivated");
        Ok(link)
    }

    /// Refuses when the cleaner is already ACTIVE in another tenant.
    pub async fn activate(&self, user: &AuthUser, cleaner_id: &str) -> ServiceResult<BusinessCleaner> {
        let business = self.owner_business(user).await?;
        let mut link = self.link(&business.id, cleaner_id).await?;

        if let Some(active) = self.store.find_active_link(cleaner_id).await? {
            if active.business_id != business.id {
                return Err(ServiceError::conflict("Cleaner is already active with another business"));
            }
        }

        let now = Utc::now();
        link.status = CleanerStatus::Active;
        link.activated_at = Some(now);
        link.updated_at = now;
        match self.store.save_link(&link).await {
            Ok(()) => {}
            Err(DatabaseError::Conflict(_)) => {
                return Err(ServiceError::conflict("Cleaner is already active with another business"))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(business_id = %business.id, cleaner = cleaner_id, "Cleaner activated");
        Ok(link)
    }

    /// Drops the roster link. The account and its job history stay.
    pub async fn remove(&self, user: &AuthUser, cleaner_id: &str) -> ServiceResult<()> {
        let business = self.owner_business(user).await?;
        if !self.store.delete_link(&business.id, cleaner_id).await? {
            return Err(ServiceError::not_found("Cleaner not found"));
        }
        tracing::info!(business_id = %business.id, cleaner = cleaner_id, "Cleaner removed from roster");
        Ok(())
    }

    /// The business a cleaner currently works for, if any.
    pub async fn my_business(&self, user: &AuthUser) -> ServiceResult<Option<Business>> {
        match self.tenants.resolve_optional(user).await? {
            Some(scope) => Ok(self.store.find_business(&scope.business_id).await?),
            None => Ok(None),
        }
    }

    /// Sets the password chosen through an invitation link and burns the token.
    pub async fn accept_invitation(&self, request: AcceptInvitation, now: DateTime<Utc>) -> ServiceResult<()> {
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::invalid("password", "Password must be at least 8 characters"));
        }

        let invitation = self
            .store
            .find_invitation_by_hash(&hash_token(request.token.trim()))
            .await?
            .filter(|invitation| invitation.is_usable(now))
            .ok_or_else(|| ServiceError::bad_request("Invitation is invalid or has expired"))?;

        self.identity.update_password(&invitation.cleaner_id, &request.password).await?;
        self.store.mark_invitation_accepted(&invitation.id, now).await?;

        tracing::info!(cleaner = %invitation.cleaner_id, "Invitation accepted");
        Ok(())
    }
}
