use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::time::Duration;

use super::{verify_jwt, IdentityProvider, NewIdentity, VerifiedIdentity};
use crate::config::IdentityConfig;
use crate::error::ServiceError;

const SERVICE: &str = "identity provider";
/// Reads are retried on transport errors and 5xx; writes never are.
const READ_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Supabase Auth (GoTrue) client. Access tokens are verified locally when the
/// JWT secret is configured, otherwise exchanged with `/auth/v1/user`.
pub struct SupabaseIdentity {
    http: reqwest::Client,
    base_url: Option<String>,
    service_role_key: Option<String>,
    anon_key: Option<String>,
    jwt_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedLink {
    #[serde(default)]
    action_link: Option<String>,
    #[serde(default)]
    properties: Option<LinkProperties>,
}

#[derive(Debug, Deserialize)]
struct LinkProperties {
    action_link: Option<String>,
}

impl SupabaseIdentity {
    pub fn new(settings: &IdentityConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: settings.supabase_url.clone(),
            service_role_key: settings.service_role_key.clone(),
            anon_key: settings.anon_key.clone(),
            jwt_secret: settings.jwt_secret.clone(),
        }
    }

    fn base_url(&self) -> Result<&str, ServiceError> {
        self.base_url
            .as_deref()
            .ok_or_else(|| ServiceError::dependency(SERVICE, "SUPABASE_URL is not configured"))
    }

    fn service_key(&self) -> Result<&str, ServiceError> {
        self.service_role_key
            .as_deref()
            .ok_or_else(|| ServiceError::dependency(SERVICE, "SUPABASE_SERVICE_ROLE_KEY is not configured"))
    }

    fn admin(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, ServiceError> {
        let key = self.service_key()?;
        Ok(self
            .http
            .request(method, format!("{}/auth/v1{}", self.base_url()?, path))
            .header("apikey", key)
            .bearer_auth(key))
    }
}

fn transport(err: reqwest::Error) -> ServiceError {
    ServiceError::dependency(SERVICE, err.to_string())
}

async fn failure(response: reqwest::Response) -> ServiceError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ServiceError::dependency(SERVICE, format!("{}: {}", status, body))
}

/// Result of one read attempt against the provider.
enum Attempt<T> {
    Done(Result<T, ServiceError>),
    Transient(ServiceError),
}

/// Runs `op` up to `attempts` times, backing off linearly between transient failures.
async fn with_retry<T, F, Fut>(attempts: u32, backoff: Duration, mut op: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Attempt::Done(result) => return result,
            Attempt::Transient(err) if attempt >= attempts => return Err(err),
            Attempt::Transient(err) => {
                tracing::warn!(attempt, "Identity provider read failed, retrying: {}", err);
                tokio::time::sleep(backoff * attempt).await;
                attempt += 1;
            }
        }
    }
}

/// Sends `request`; an `Err` here is a transport error or a 5xx and is worth retrying.
async fn send_read(request: reqwest::RequestBuilder) -> Result<reqwest::Response, ServiceError> {
    match request.send().await {
        Ok(response) if response.status().is_server_error() => Err(failure(response).await),
        Ok(response) => Ok(response),
        Err(err) => Err(transport(err)),
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentity {
    async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, ServiceError> {
        if let Some(secret) = &self.jwt_secret {
            return verify_jwt(token, secret);
        }

        let key = self
            .anon_key
            .as_deref()
            .or(self.service_role_key.as_deref())
            .ok_or_else(|| ServiceError::dependency(SERVICE, "no Supabase key configured"))?;

        let url = format!("{}/auth/v1/user", self.base_url()?);
        let url = url.as_str();
        let http = &self.http;

        with_retry(READ_ATTEMPTS, RETRY_BACKOFF, move || async move {
            let response = match send_read(http.get(url).header("apikey", key).bearer_auth(token)).await {
                Ok(response) => response,
                Err(err) => return Attempt::Transient(err),
            };
            let result = match response.status() {
                status if status.is_success() => match response.json::<GoTrueUser>().await {
                    Ok(user) => Ok(VerifiedIdentity {
                        id: user.id,
                        email: user.email.unwrap_or_default(),
                    }),
                    Err(err) => Err(transport(err)),
                },
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Err(ServiceError::unauthorized("Invalid or expired token"))
                }
                _ => Err(failure(response).await),
            };
            Attempt::Done(result)
        })
        .await
    }

    async fn create_user(&self, identity: &NewIdentity) -> Result<String, ServiceError> {
        let response = self
            .admin(reqwest::Method::POST, "/admin/users")?
            .json(&json!({
                "email": identity.email,
                "password": identity.password,
                "email_confirm": true,
                "user_metadata": { "name": identity.name },
            }))
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            status if status.is_success() => {
                let user: GoTrueUser = response.json().await.map_err(transport)?;
                Ok(user.id)
            }
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => {
                Err(ServiceError::conflict("An account with this email already exists"))
            }
            _ => Err(failure(response).await),
        }
    }

    async fn update_password(&self, user_id: &str, password: &str) -> Result<(), ServiceError> {
        let response = self
            .admin(reqwest::Method::PUT, &format!("/admin/users/{}", user_id))?
            .json(&json!({ "password": password }))
            .send()
            .await
            .map_err(transport)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(failure(response).await)
        }
    }

    async fn check_password(&self, email: &str, password: &str) -> Result<bool, ServiceError> {
        let key = self
            .anon_key
            .as_deref()
            .ok_or_else(|| ServiceError::dependency(SERVICE, "SUPABASE_ANON_KEY is not configured"))?;

        // Password grant issues a session but changes no account state, so it counts as a read.
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url()?);
        let url = url.as_str();
        let http = &self.http;
        let credentials = json!({ "email": email, "password": password });
        let credentials = &credentials;

        with_retry(READ_ATTEMPTS, RETRY_BACKOFF, move || async move {
            let response = match send_read(http.post(url).header("apikey", key).json(credentials)).await {
                Ok(response) => response,
                Err(err) => return Attempt::Transient(err),
            };
            Attempt::Done(match response.status() {
                status if status.is_success() => Ok(true),
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Ok(false),
                _ => Err(failure(response).await),
            })
        })
        .await
    }

    async fn recovery_link(&self, email: &str, redirect_to: &str) -> Result<String, ServiceError> {
        let response = self
            .admin(reqwest::Method::POST, "/admin/generate_link")?
            .json(&json!({ "type": "recovery", "email": email, "redirect_to": redirect_to }))
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(failure(response).await);
        }

        let link: GeneratedLink = response.json().await.map_err(transport)?;
        link.action_link
            .or_else(|| link.properties.and_then(|p| p.action_link))
            .ok_or_else(|| ServiceError::dependency(SERVICE, "recovery link missing from response"))
    }
}
