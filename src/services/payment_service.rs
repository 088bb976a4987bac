//! Hosted checkout and the payment provider's webhook.
//!
//! Checkout sessions carry the tenant id and plan in their metadata; the
//! webhook is the only path that moves a subscription onto a paid plan.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::{ServiceResult, ServiceSettings, SubscriptionService, TenantResolver};
use crate::auth::{Action, AuthUser};
use crate::config::PaymentsConfig;
use crate::database::Store;
use crate::error::ServiceError;
use crate::types::{PlanType, SubscriptionStatus};

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "payments";
const CHECKOUT_URL: &str = "https://api.stripe.com/v1/checkout/sessions";

/// Maximum age of a signed webhook delivery.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub plan_type: PlanType,
}

/// What the gateway needs to open a checkout for one tenant.
#[derive(Debug, Clone)]
pub struct CheckoutOrder {
    pub business_id: String,
    pub plan_type: PlanType,
    pub customer_email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, order: &CheckoutOrder) -> Result<CheckoutSession, ServiceError>;
}

/// Stripe Checkout over the form-encoded REST API.
pub struct StripeGateway {
    http: reqwest::Client,
    secret_key: Option<String>,
    price_solo: Option<String>,
    price_small_team: Option<String>,
    success_url: String,
    cancel_url: String,
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

impl StripeGateway {
    pub fn new(settings: &PaymentsConfig, frontend_url: &str, http: reqwest::Client) -> Self {
        let frontend_url = frontend_url.trim_end_matches('/');
        Self {
            http,
            secret_key: settings.stripe_secret_key.clone(),
            price_solo: settings.price_id_solo.clone(),
            price_small_team: settings.price_id_small_team.clone(),
            success_url: format!("{}/subscription?success=true&session_id={{CHECKOUT_SESSION_ID}}", frontend_url),
            cancel_url: format!("{}/subscription?canceled=true", frontend_url),
        }
    }

    fn price_for(&self, plan: PlanType) -> Result<&str, ServiceError> {
        let price = match plan {
            PlanType::Solo => self.price_solo.as_deref(),
            PlanType::SmallTeam => self.price_small_team.as_deref(),
            PlanType::Free => return Err(ServiceError::invalid("planType", "The FREE plan needs no checkout")),
        };
        price.ok_or_else(|| ServiceError::dependency(SERVICE, format!("no price configured for {}", plan.as_str())))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, order: &CheckoutOrder) -> Result<CheckoutSession, ServiceError> {
        let key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| ServiceError::dependency(SERVICE, "STRIPE_SECRET_KEY is not configured"))?;
        let price = self.price_for(order.plan_type)?;

        let form = [
            ("mode", "subscription"),
            ("line_items[0][price]", price),
            ("line_items[0][quantity]", "1"),
            ("success_url", self.success_url.as_str()),
            ("cancel_url", self.cancel_url.as_str()),
            ("customer_email", order.customer_email.as_str()),
            ("client_reference_id", order.business_id.as_str()),
            ("metadata[businessId]", order.business_id.as_str()),
            ("metadata[planType]", order.plan_type.as_str()),
            ("subscription_data[metadata][businessId]", order.business_id.as_str()),
            ("subscription_data[metadata][planType]", order.plan_type.as_str()),
        ];

        let response = self
            .http
            .post(CHECKOUT_URL)
            .bearer_auth(key)
            .form(&form)
            .send()
            .await
            .map_err(|e| ServiceError::dependency(SERVICE, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::dependency(SERVICE, format!("{}: {}", status, body)));
        }

        let session: StripeSession = response
            .json()
            .await
            .map_err(|e| ServiceError::dependency(SERVICE, e.to_string()))?;
        let url = session
            .url
            .ok_or_else(|| ServiceError::dependency(SERVICE, "checkout session has no url"))?;
        Ok(CheckoutSession { session_id: session.id, url })
    }
}

pub(crate) fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, ServiceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::dependency(SERVICE, format!("invalid webhook secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`).
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: DateTime<Utc>) -> ServiceResult<()> {
    let invalid = || ServiceError::bad_request("Invalid webhook signature");

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or_else(invalid)?;
    if signatures.is_empty() {
        return Err(invalid());
    }
    if (now.timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(ServiceError::bad_request("Webhook signature timestamp is outside the tolerance"));
    }

    let expected = compute_signature(secret, timestamp, payload)?;
    let matched = signatures
        .iter()
        .any(|candidate| candidate.len() == expected.len() && bool::from(candidate.as_bytes().ct_eq(expected.as_bytes())));
    if matched {
        Ok(())
    } else {
        Err(invalid())
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: Value,
}

fn text<'a>(object: &'a Value, pointer: &str) -> Option<&'a str> {
    object.pointer(pointer).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn period_end(object: &Value) -> Option<DateTime<Utc>> {
    object
        .get("current_period_end")
        .and_then(Value::as_i64)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// Provider subscription status to ours. `None` leaves the row untouched.
fn map_status(status: &str) -> Option<SubscriptionStatus> {
    match status {
        "active" | "trialing" => Some(SubscriptionStatus::Active),
        "past_due" | "unpaid" => Some(SubscriptionStatus::PastDue),
        "canceled" | "incomplete_expired" => Some(SubscriptionStatus::Cancelled),
        _ => None,
    }
}

pub struct PaymentService {
    store: Arc<dyn Store>,
    tenants: TenantResolver,
    gateway: Arc<dyn PaymentGateway>,
    subscriptions: SubscriptionService,
    settings: ServiceSettings,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn Store>,
        tenants: TenantResolver,
        gateway: Arc<dyn PaymentGateway>,
        subscriptions: SubscriptionService,
        settings: ServiceSettings,
    ) -> Self {
        Self { store, tenants, gateway, subscriptions, settings }
    }

    pub async fn create_checkout_session(&self, user: &AuthUser, request: CheckoutRequest) -> ServiceResult<CheckoutSession> {
        let scope = self.tenants.resolve(user).await?;
        scope.require(Action::ManageSubscription)?;
        if request.plan_type == PlanType::Free {
            return Err(ServiceError::invalid("planType", "Choose SOLO or SMALL_TEAM"));
        }

        let order = CheckoutOrder {
            business_id: scope.business_id.clone(),
            plan_type: request.plan_type,
            customer_email: user.email.clone(),
        };
        let session = self.gateway.create_checkout_session(&order).await?;
        tracing::info!(business_id = %scope.business_id, plan = order.plan_type.as_str(), "Checkout session created");
        Ok(session)
    }

    /// Verifies and applies one webhook delivery. Returns whether the event
    /// changed anything; unknown events are acknowledged and ignored.
    pub async fn handle_webhook(&self, payload: &[u8], signature: Option<&str>, now: DateTime<Utc>) -> ServiceResult<bool> {
        let secret = self
            .settings
            .webhook_secret
            .as_deref()
            .ok_or_else(|| ServiceError::dependency(SERVICE, "STRIPE_WEBHOOK_SECRET is not configured"))?;
        let signature = signature.ok_or_else(|| ServiceError::bad_request("Missing Stripe-Signature header"))?;
        verify_signature(payload, signature, secret, now)?;

        let event: WebhookEvent =
            serde_json::from_slice(payload).map_err(|_| ServiceError::bad_request("Malformed webhook payload"))?;
        let object = &event.data.object;

        let handled = match event.event_type.as_str() {
            "checkout.session.completed" => self.checkout_completed(object, now).await?,
            "customer.subscription.updated" => {
                let status = text(object, "/status").and_then(map_status);
                self.apply_to_provider_subscription(text(object, "/id"), status, period_end(object), now)
                    .await?
            }
            "customer.subscription.deleted" => {
                self.apply_to_provider_subscription(text(object, "/id"), Some(SubscriptionStatus::Cancelled), None, now)
                    .await?
            }
            "invoice.payment_failed" => {
                self.apply_to_provider_subscription(text(object, "/subscription"), Some(SubscriptionStatus::PastDue), None, now)
                    .await?
            }
            other => {
                tracing::debug!(event = other, "Ignoring webhook event");
                false
            }
        };
        Ok(handled)
    }

    async fn checkout_completed(&self, object: &Value, now: DateTime<Utc>) -> ServiceResult<bool> {
        let (Some(business_id), Some(plan)) = (
            text(object, "/metadata/businessId"),
            text(object, "/metadata/planType").and_then(PlanType::parse),
        ) else {
            tracing::warn!("Checkout completed without tenant metadata");
            return Ok(false);
        };
        if self.store.find_business(business_id).await?.is_none() {
            tracing::warn!(business_id, "Checkout completed for unknown business");
            return Ok(false);
        }

        let mut subscription = self.subscriptions.ensure(business_id).await?;
        subscription.plan_type = plan;
        subscription.status = SubscriptionStatus::Active;
        if let Some(id) = text(object, "/subscription") {
            subscription.stripe_subscription_id = Some(id.to_string());
        }
        if let Some(customer) = text(object, "/customer") {
            subscription.stripe_customer_id = Some(customer.to_string());
        }
        subscription.current_period_end = Some(now + Duration::days(30));
        subscription.updated_at = now;
        self.store.save_subscription(&subscription).await?;

        tracing::info!(business_id, plan = plan.as_str(), "Subscription activated from checkout");
        Ok(true)
    }

    async fn apply_to_provider_subscription(
        &self,
        provider_id: Option<&str>,
        status: Option<SubscriptionStatus>,
        period_end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        let Some(provider_id) = provider_id else {
            return Ok(false);
        };
        let Some(mut subscription) = self.store.find_subscription_by_provider_id(provider_id).await? else {
            tracing::warn!(provider_id, "Webhook for unknown subscription");
            return Ok(false);
        };

        if let Some(status) = status {
            subscription.status = status;
        }
        if period_end.is_some() {
            subscription.current_period_end = period_end;
        }
        subscription.updated_at = now;
        self.store.save_subscription(&subscription).await?;

        tracing::info!(
            business_id = %subscription.business_id,
            status = ?subscription.status,
            "Subscription updated from webhook"
        );
        Ok(true)
    }
}
