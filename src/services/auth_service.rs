use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::roster_service::MIN_PASSWORD_LEN;
use super::{is_email, ServiceResult, ServiceSettings};
use crate::auth::{AuthUser, IdentityProvider, NewIdentity};
use crate::database::models::User;
use crate::database::{DatabaseError, Store};
use crate::error::{ServiceError, Validator};
use crate::notifications::{templates, EmailSender};
use crate::types::UserRole;

/// Returned by forgot-password whether or not the account exists.
pub const RECOVERY_NOTICE: &str = "If an account exists for that email, a password reset link has been sent";

#[derive(Debug, Deserialize)]
pub struct Signup {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetRole {
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPassword {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub role: UserRole,
}

impl From<&AuthUser> for Profile {
    fn from(user: &AuthUser) -> Self {
        Self { id: user.id.clone(), email: user.email.clone(), role: user.role }
    }
}

pub struct AuthService {
    store: Arc<dyn Store>,
    identity: Arc<dyn IdentityProvider>,
    email: Arc<dyn EmailSender>,
    settings: ServiceSettings,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn Store>,
        identity: Arc<dyn IdentityProvider>,
        email: Arc<dyn EmailSender>,
        settings: ServiceSettings,
    ) -> Self {
        Self { store, identity, email, settings }
    }

    /// Bearer token to request identity. A verified subject without a local
    /// row yet is treated as an OWNER.
    pub async fn authenticate(&self, token: &str) -> ServiceResult<AuthUser> {
        let verified = self.identity.verify_token(token).await?;
        let user = match self.store.find_user(&verified.id).await? {
            Some(local) => AuthUser::new(local.id, local.email, local.role),
            None => {
                tracing::debug!(user_id = %verified.id, "No local user row, defaulting to OWNER");
                AuthUser::new(verified.id, verified.email, UserRole::Owner)
            }
        };
        Ok(user)
    }

    pub async fn signup(&self, request: Signup) -> ServiceResult<User> {
        let email = request.email.trim().to_lowercase();
        let mut v = Validator::new();
        v.check(is_email(&email), "email", "A valid email address is required");
        v.check(
            request.password.chars().count() >= MIN_PASSWORD_LEN,
            "password",
            "Password must be at least 8 characters",
        );
        v.finish()?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::conflict("An account with this email already exists"));
        }

        let id = self
            .identity
            .create_user(&NewIdentity { email: email.clone(), password: request.password, name: request.name })
            .await?;
        let user = match self.store.save_user(&User::new(id, email, UserRole::Owner)).await {
            Ok(user) => user,
            Err(DatabaseError::Conflict(_)) => {
                return Err(ServiceError::conflict("An account with this email already exists"))
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = %user.id, "User signed up");
        Ok(user)
    }

    pub fn me(&self, user: &AuthUser) -> Profile {
        Profile::from(user)
    }

    /// OWNER or CLEANER only; ADMIN is granted out of band.
    pub async fn set_role(&self, user: &AuthUser, request: SetRole) -> ServiceResult<Profile> {
        if request.role == UserRole::Admin {
            return Err(ServiceError::invalid("role", "Role must be OWNER or CLEANER"));
        }
        if user.role == UserRole::Admin {
            return Err(ServiceError::bad_request("Administrators cannot change their own role"));
        }

        let mut local = match self.store.find_user(&user.id).await? {
            Some(existing) => existing,
            None => User::new(user.id.clone(), user.email.clone(), request.role),
        };
        if local.role != request.role {
            // Ownership and roster links both pin the caller to a tenant.
            if self.store.find_business_by_owner(&user.id).await?.is_some() {
                return Err(ServiceError::conflict("Role cannot change after a business has been created"));
            }
            if self.store.find_active_link(&user.id).await?.is_some() {
                return Err(ServiceError::conflict("Role cannot change while linked to a business"));
            }
        }
        local.role = request.role;
        local.updated_at = chrono::Utc::now();
        let saved = self.store.save_user(&local).await?;

        tracing::info!(user_id = %saved.id, role = saved.role.as_str(), "Role updated");
        Ok(Profile { id: saved.id, email: saved.email, role: saved.role })
    }

    pub async fn change_password(&self, user: &AuthUser, request: ChangePassword) -> ServiceResult<()> {
        if request.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::invalid("newPassword", "Password must be at least 8 characters"));
        }
        if !self.identity.check_password(&user.email, &request.current_password).await? {
            return Err(ServiceError::bad_request("Current password is incorrect"));
        }

        self.identity.update_password(&user.id, &request.new_password).await?;
        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    /// Always answers with the same notice. The recovery link only ever
    /// travels by email.
    pub async fn forgot_password(&self, request: ForgotPassword) -> ServiceResult<&'static str> {
        let email = request.email.trim().to_lowercase();
        if !is_email(&email) {
            return Err(ServiceError::invalid("email", "A valid email address is required"));
        }

        if self.store.find_user_by_email(&email).await?.is_some() {
            let redirect = format!("{}/reset-password", self.settings.frontend_url);
            match self.identity.recovery_link(&email, &redirect).await {
                Ok(link) => {
                    if let Err(e) = self.email.send(&templates::password_recovery(&email, &link)).await {
                        tracing::error!("Failed to send recovery email: {}", e);
                    }
                }
                Err(e) => tracing::error!("Failed to generate recovery link: {}", e),
            }
        } else {
            tracing::debug!("Recovery requested for unknown email");
        }
        Ok(RECOVERY_NOTICE)
    }

    /// Grants ADMIN to an existing local account.
    pub async fn promote_to_admin(&self, email: &str) -> ServiceResult<User> {
        let mut user = self
            .store
            .find_user_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))?;
        user.role = UserRole::Admin;
        user.updated_at = chrono::Utc::now();
        let saved = self.store.save_user(&user).await?;
        tracing::info!(user_id = %saved.id, "User promoted to ADMIN");
        Ok(saved)
    }
}
