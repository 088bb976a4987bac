pub mod credentials;
pub mod policy;
pub mod supabase;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::RequestCache;
use crate::error::ServiceError;
use crate::types::UserRole;

pub use policy::Action;
pub use supabase::SupabaseIdentity;

/// Audience the identity provider stamps on user access tokens.
pub const TOKEN_AUDIENCE: &str = "authenticated";

/// Access-token claims issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub aud: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Subject and email confirmed by the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    pub id: String,
    pub email: String,
}

/// Authenticated caller attached to each protected request.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub role: UserRole,
    /// Memo for lookups repeated within this one request.
    pub cache: Arc<RequestCache>,
}

impl AuthUser {
    pub fn new(id: impl Into<String>, email: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            role,
            cache: Arc::new(RequestCache::default()),
        }
    }
}

/// Profile fields passed to the provider when provisioning an account.
#[derive(Debug, Clone, Default)]
pub struct NewIdentity {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// External identity provider. Token issuance and password storage live there.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, ServiceError>;

    /// Creates a confirmed account and returns its subject id.
    async fn create_user(&self, identity: &NewIdentity) -> Result<String, ServiceError>;

    async fn update_password(&self, user_id: &str, password: &str) -> Result<(), ServiceError>;

    /// Returns false when the credentials are rejected.
    async fn check_password(&self, email: &str, password: &str) -> Result<bool, ServiceError>;

    /// Produces a password-recovery link for the account.
    async fn recovery_link(&self, email: &str, redirect_to: &str) -> Result<String, ServiceError>;
}

/// Verify an HS256 access token against the shared signing secret.
pub fn verify_jwt(token: &str, secret: &str) -> Result<VerifiedIdentity, ServiceError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[TOKEN_AUDIENCE]);

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| {
            tracing::debug!("Rejected access token: {}", e);
            ServiceError::unauthorized("Invalid or expired token")
        })?;

    Ok(VerifiedIdentity {
        id: data.claims.sub,
        email: data.claims.email.unwrap_or_default(),
    })
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, ServiceError> {
    let value = header.ok_or_else(|| ServiceError::unauthorized("Missing Authorization header"))?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        Some(_) => Err(ServiceError::unauthorized("Empty bearer token")),
        None => Err(ServiceError::unauthorized("Authorization header must use Bearer token format")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, aud: &str, exp_offset: i64) -> String {
        let claims = Claims {
            sub: "user-1".into(),
            email: Some("owner@example.com".into()),
            aud: aud.into(),
            exp: (Utc::now() + Duration::seconds(exp_offset)).timestamp(),
            iat: Some(Utc::now().timestamp()),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn accepts_valid_token() {
        let identity = verify_jwt(&token("s3cret", TOKEN_AUDIENCE, 3600), "s3cret").unwrap();
        assert_eq!(identity.id, "user-1");
        assert_eq!(identity.email, "owner@example.com");
    }

    #[test]
    fn rejects_wrong_secret_audience_or_expiry() {
        assert!(verify_jwt(&token("other", TOKEN_AUDIENCE, 3600), "s3cret").is_err());
        assert!(verify_jwt(&token("s3cret", "anon", 3600), "s3cret").is_err());
        assert!(verify_jwt(&token("s3cret", TOKEN_AUDIENCE, -3600), "s3cret").is_err());
    }

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert!(bearer_token(None).is_err());
        assert!(bearer_token(Some("Basic abc")).is_err());
        assert!(bearer_token(Some("Bearer   ")).is_err());
    }
}
