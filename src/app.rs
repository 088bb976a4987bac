// Router assembly: public, protected and elevated tiers plus global layers.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use url::Url;

use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{admin_middleware, auth_middleware};
use crate::services::AppState;

pub fn router(state: AppState, config: &AppConfig) -> Router {
    let protected = Router::new()
        .merge(auth_routes())
        .merge(business_routes())
        .merge(cleaner_routes())
        .merge(client_routes())
        .merge(job_routes())
        .merge(invoice_routes())
        .merge(report_routes())
        .merge(billing_routes())
        .merge(admin_routes())
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        .merge(protected)
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.api.max_request_size_bytes))
        .layer(cors(&config.security.frontend_url))
        .layer(TraceLayer::new_for_http())
}

fn cors(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    match frontend_origin(frontend_url) {
        Some(origin) => layer.allow_origin(AllowOrigin::exact(origin)),
        None => {
            tracing::warn!(frontend_url, "FRONTEND_URL is not a valid origin; cross-origin requests disabled");
            layer
        }
    }
}

/// `https://app.example.com/some/path` -> `https://app.example.com`
fn frontend_origin(frontend_url: &str) -> Option<HeaderValue> {
    let url = Url::parse(frontend_url).ok()?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return None;
    }
    HeaderValue::from_str(&origin.ascii_serialization()).ok()
}

fn public_routes() -> Router<AppState> {
    use public::{auth, payments};

    Router::new()
        .route("/auth/signup", post(auth::signup_post))
        .route("/auth/forgot-password", post(auth::forgot_password_post))
        .route("/auth/accept-invite", post(auth::accept_invite_post))
        .route("/payments/webhook", post(payments::webhook_post))
}

fn auth_routes() -> Router<AppState> {
    use protected::auth;

    Router::new()
        .route("/auth/me", get(auth::me_get))
        .route("/auth/set-role", post(auth::set_role_post))
        .route("/auth/change-password", post(auth::change_password_post))
}

fn business_routes() -> Router<AppState> {
    use protected::business;

    Router::new()
        .route(
            "/business",
            get(business::business_get).post(business::business_post).put(business::business_put),
        )
        .route("/business/vat", put(business::vat_put))
}

fn cleaner_routes() -> Router<AppState> {
    use protected::cleaners;

    Router::new()
        .route("/business/cleaners", get(cleaners::cleaner_list).post(cleaners::cleaner_post))
        .route("/business/cleaners/my-business", get(cleaners::my_business_get))
        .route("/business/cleaners/:cleaner_id", delete(cleaners::cleaner_delete))
        .route("/business/cleaners/:cleaner_id/deactivate", post(cleaners::deactivate_post))
        .route("/business/cleaners/:cleaner_id/activate", post(cleaners::activate_post))
}

fn client_routes() -> Router<AppState> {
    use protected::clients;

    Router::new()
        .route("/clients", get(clients::client_list).post(clients::client_post))
        .route(
            "/clients/:id",
            get(clients::client_get).put(clients::client_put).delete(clients::client_delete),
        )
        .route("/clients/:id/jobs", get(clients::client_jobs_get))
}

fn job_routes() -> Router<AppState> {
    use protected::{jobs, upload};

    Router::new()
        .route("/jobs", get(jobs::job_list).post(jobs::job_post))
        .route("/jobs/today", get(jobs::today_get))
        .route("/jobs/:id", get(jobs::job_get).put(jobs::job_put).delete(jobs::job_delete))
        .route("/jobs/:id/photos", post(jobs::photo_post))
        .route("/jobs/:id/photos/download", get(jobs::photos_download_get))
        .route("/jobs/:id/checklist/:item_id", put(jobs::checklist_put))
        .route("/jobs/:id/whatsapp/photos", get(jobs::whatsapp_photos_get))
        .route("/jobs/:id/whatsapp/completion", get(jobs::whatsapp_completion_get))
        .route("/upload/image", post(upload::image_post))
}

fn invoice_routes() -> Router<AppState> {
    use protected::invoices;

    Router::new()
        .route("/invoices", get(invoices::invoice_list))
        .route("/invoices/summary", get(invoices::summary_get))
        .route("/invoices/from-job/:job_id", post(invoices::from_job_post))
        .route("/invoices/:id", get(invoices::invoice_get).put(invoices::invoice_put))
        .route("/invoices/:id/pdf", get(invoices::pdf_get))
        .route("/invoices/:id/whatsapp-link", get(invoices::whatsapp_link_get))
}

fn report_routes() -> Router<AppState> {
    use protected::reports;

    Router::new()
        .route("/reports/business", get(reports::business_report_get))
        .route("/reports/client/:client_id", get(reports::client_report_get))
}

fn billing_routes() -> Router<AppState> {
    use protected::{dashboard, payments, subscriptions};

    Router::new()
        .route("/subscriptions", get(subscriptions::subscription_get))
        .route("/subscriptions/usage", get(subscriptions::usage_get))
        .route("/subscriptions/plan", put(subscriptions::plan_put))
        .route("/subscriptions/cancel", post(subscriptions::cancel_post))
        .route("/payments/create-checkout-session", post(payments::checkout_post))
        .route("/dashboard/stats", get(dashboard::stats_get))
}

fn admin_routes() -> Router<AppState> {
    use elevated::admin;

    Router::new()
        .route("/admin/stats", get(admin::stats_get))
        .route("/admin/businesses", get(admin::businesses_get))
        .route("/admin/businesses/:id", get(admin::business_get))
        .route("/admin/users", get(admin::users_get))
        .route_layer(from_fn(admin_middleware))
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "CleanBook API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "public": "/auth/signup, /auth/forgot-password, /auth/accept-invite, /payments/webhook",
                "auth": "/auth/me, /auth/set-role, /auth/change-password (protected)",
                "business": "/business[/vat] (protected)",
                "cleaners": "/business/cleaners[/my-business|/:cleanerId[/activate|/deactivate]] (protected)",
                "clients": "/clients[/:id[/jobs]] (protected)",
                "jobs": "/jobs[/today|/:id[/photos[/download]|/checklist/:itemId|/whatsapp/*]] (protected)",
                "invoices": "/invoices[/summary|/from-job/:jobId|/:id[/pdf|/whatsapp-link]] (protected)",
                "reports": "/reports/business?startDate&endDate, /reports/client/:clientId (protected)",
                "billing": "/subscriptions[/usage|/plan|/cancel], /payments/create-checkout-session (protected)",
                "dashboard": "/dashboard/stats (protected)",
                "upload": "/upload/image (protected)",
                "admin": "/admin/stats|businesses[/:id]|users (ADMIN only)",
            }
        }
    }))
}

async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            let detail = if crate::is_production!() { "unavailable".to_string() } else { e.to_string() };
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": { "status": "degraded", "timestamp": now, "database_error": detail }
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::public::payments::SIGNATURE_HEADER;
    use crate::services::payment_service::compute_signature;
    use crate::testing::{TestContext, WEBHOOK_SECRET};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::response::Response;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(ctx: TestContext) -> Router {
        router(Arc::new(ctx.services), crate::config::config())
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_with(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[test]
    fn frontend_origin_drops_the_path() {
        let origin = frontend_origin("https://app.cleanbook.test/dashboard/").unwrap();
        assert_eq!(origin, "https://app.cleanbook.test");
        assert_eq!(frontend_origin("http://localhost:3000").unwrap(), "http://localhost:3000");
        assert!(frontend_origin("not a url").is_none());
    }

    #[tokio::test]
    async fn root_lists_endpoints() {
        let response = app(TestContext::new())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["name"], "CleanBook API");
    }

    #[tokio::test]
    async fn protected_routes_require_a_bearer_token() {
        let response = app(TestContext::new())
            .oneshot(Request::builder().uri("/clients").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn unknown_tokens_are_rejected() {
        let response = app(TestContext::new()).oneshot(get_with("/auth/me", "forged")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_returns_the_caller_profile() {
        let ctx = TestContext::new();
        let owner = ctx.owner("me@example.com").await;
        let token = ctx.identity.token_for(&owner.id);

        let response = app(ctx).oneshot(get_with("/auth/me", &token)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["email"], "me@example.com");
        assert_eq!(body["data"]["role"], "OWNER");
    }

    #[tokio::test]
    async fn roster_lives_under_business_cleaners() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;
        let cleaner = ctx.cleaner_linked_to(&business).await;
        let token = ctx.identity.token_for(&owner.id);
        let router = app(ctx);

        let response = router.clone().oneshot(get_with("/business/cleaners", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let uri = format!("/business/cleaners/{}/deactivate", cleaner.id);
        let response = router
            .clone()
            .oneshot(json_request(Method::POST, &uri, Some(&token), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["status"], "INACTIVE");

        let response = router.oneshot(get_with("/cleaners", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invoice_pdf_downloads_as_an_attachment() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;
        let client = ctx.client_for(&business, "Mrs Smith").await;
        let job = ctx.job_for(&business, &client, None, chrono::Utc::now()).await;
        let invoice = ctx.invoice_for(&owner, &job).await;
        let token = ctx.identity.token_for(&owner.id);

        let uri = format!("/invoices/{}/pdf", invoice.id);
        let response = app(ctx).oneshot(get_with(&uri, &token)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"invoice-INV-000001.pdf\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn reports_answer_owners_and_refuse_cleaners() {
        let ctx = TestContext::new();
        let (owner, business) = ctx.owner_with_business("Sparkle").await;
        let cleaner = ctx.cleaner_linked_to(&business).await;
        let owner_token = ctx.identity.token_for(&owner.id);
        let cleaner_token = ctx.identity.token_for(&cleaner.id);
        let router = app(ctx);

        let response = router
            .clone()
            .oneshot(get_with("/reports/business?startDate=2024-01-01&endDate=2024-01-31", &owner_token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["summary"]["totalJobs"], 0);
        assert_eq!(body["data"]["period"]["end"], "2024-02-01T00:00:00Z");

        let response = router.oneshot(get_with("/reports/business", &cleaner_token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_routes_are_forbidden_to_owners() {
        let ctx = TestContext::new();
        let owner = ctx.owner("owner@example.com").await;
        let token = ctx.identity.token_for(&owner.id);

        let response = app(ctx).oneshot(get_with("/admin/stats", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_routes_serve_admins() {
        let ctx = TestContext::new();
        let admin = ctx.admin("admin@example.com").await;
        let token = ctx.identity.token_for(&admin.id);

        let response = app(ctx).oneshot(get_with("/admin/users?page=1&limit=5", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn creating_a_business_answers_201() {
        let ctx = TestContext::new();
        let owner = ctx.owner("new@example.com").await;
        let token = ctx.identity.token_for(&owner.id);

        let response = app(ctx)
            .oneshot(json_request(Method::POST, "/business", Some(&token), json!({ "name": "Sparkle Ltd" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["data"]["name"], "Sparkle Ltd");
    }

    #[tokio::test]
    async fn malformed_json_is_a_client_error() {
        let ctx = TestContext::new();
        let owner = ctx.owner("bad@example.com").await;
        let token = ctx.identity.token_for(&owner.id);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/clients")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from("{not json"))
            .unwrap();
        let response = app(ctx).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn invalid_query_parameters_are_rejected() {
        let ctx = TestContext::new();
        let (owner, _) = ctx.owner_with_business("Sparkle").await;
        let token = ctx.identity.token_for(&owner.id);

        let response = app(ctx).oneshot(get_with("/invoices?page=abc", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signup_is_public() {
        let response = app(TestContext::new())
            .oneshot(json_request(
                Method::POST,
                "/auth/signup",
                None,
                json!({ "email": "fresh@example.com", "password": "longenough" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["data"]["role"], "OWNER");
    }

    #[tokio::test]
    async fn webhook_without_signature_is_rejected() {
        let response = app(TestContext::new())
            .oneshot(json_request(Method::POST, "/payments/webhook", None, json!({ "type": "ping" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_with_a_valid_signature_is_acknowledged() {
        let payload = json!({ "type": "invoice.created", "data": { "object": {} } }).to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let digest = compute_signature(WEBHOOK_SECRET, timestamp, payload.as_bytes()).unwrap();
        let signature = format!("t={},v1={}", timestamp, digest);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/payments/webhook")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(payload))
            .unwrap();
        let response = app(TestContext::new()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["received"], true);
        assert_eq!(body["data"]["handled"], false);
    }

    #[tokio::test]
    async fn image_upload_accepts_multipart_and_rejects_json() {
        let ctx = TestContext::new();
        let (owner, _) = ctx.owner_with_business("Sparkle").await;
        let token = ctx.identity.token_for(&owner.id);
        let router = app(ctx);

        let boundary = "cleanbook-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"kitchen.png\"\r\n\
             Content-Type: image/png\r\n\r\nPNGDATA\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/upload/image")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["data"]["name"], "kitchen.png");

        let response = router
            .oneshot(json_request(Method::POST, "/upload/image", Some(&token), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
