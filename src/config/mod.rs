use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub identity: IdentityConfig,
    pub payments: PaymentsConfig,
    pub storage: StorageConfig,
    pub email: EmailConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub max_request_size_bytes: usize,
    /// Timeout applied to every outbound provider call.
    pub http_client_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Frontend origin; used for the CORS allow-list and for links in emails.
    pub frontend_url: String,
    pub invitation_expiry_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub supabase_url: Option<String>,
    pub service_role_key: Option<String>,
    pub anon_key: Option<String>,
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub price_id_solo: Option<String>,
    pub price_id_small_team: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub imagekit_private_key: Option<String>,
    /// Rendering service for invoice PDFs and photo archives.
    pub documents_url: Option<String>,
    pub upload_folder: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub reminder_interval_secs: u64,
    pub recurring_interval_secs: u64,
    pub payment_reminder_interval_secs: u64,
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database overrides
        if let Some(v) = non_empty("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }

        // API overrides
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }
        if let Ok(v) = env::var("HTTP_CLIENT_TIMEOUT_SECS") {
            self.api.http_client_timeout_secs = v.parse().unwrap_or(self.api.http_client_timeout_secs);
        }

        // Security overrides
        if let Some(v) = non_empty("FRONTEND_URL") {
            self.security.frontend_url = v.trim_end_matches('/').to_string();
        }

        // Identity provider
        if let Some(v) = non_empty("SUPABASE_URL") {
            self.identity.supabase_url = Some(v.trim_end_matches('/').to_string());
        }
        if let Some(v) = non_empty("SUPABASE_SERVICE_ROLE_KEY") {
            self.identity.service_role_key = Some(v);
        }
        if let Some(v) = non_empty("SUPABASE_ANON_KEY") {
            self.identity.anon_key = Some(v);
        }
        if let Some(v) = non_empty("SUPABASE_JWT_SECRET") {
            self.identity.jwt_secret = Some(v);
        }

        // Payments
        if let Some(v) = non_empty("STRIPE_SECRET_KEY") {
            self.payments.stripe_secret_key = Some(v);
        }
        if let Some(v) = non_empty("STRIPE_WEBHOOK_SECRET") {
            self.payments.stripe_webhook_secret = Some(v);
        }
        if let Some(v) = non_empty("STRIPE_PRICE_ID_SOLO") {
            self.payments.price_id_solo = Some(v);
        }
        if let Some(v) = non_empty("STRIPE_PRICE_ID_SMALL_TEAM") {
            self.payments.price_id_small_team = Some(v);
        }

        if let Some(v) = non_empty("IMAGEKIT_PRIVATE_KEY") {
            self.storage.imagekit_private_key = Some(v);
        }
        if let Some(v) = non_empty("DOCUMENTS_URL") {
            self.storage.documents_url = Some(v.trim_end_matches('/').to_string());
        }

        // Email
        if let Some(v) = non_empty("EMAIL_API_KEY") {
            self.email.api_key = Some(v);
        }
        if let Some(v) = non_empty("EMAIL_API_URL") {
            self.email.api_url = v;
        }
        if let Some(v) = non_empty("EMAIL_FROM") {
            self.email.from = v;
        }

        if let Ok(v) = env::var("SCHEDULER_ENABLED") {
            self.scheduler.enabled = v.parse().unwrap_or(self.scheduler.enabled);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
            },
            api: ApiConfig {
                max_request_size_bytes: 12 * 1024 * 1024, // 12MB, leaves room for a 10MB upload
                http_client_timeout_secs: 30,
            },
            security: SecurityConfig {
                frontend_url: "http://localhost:3001".to_string(),
                invitation_expiry_days: 7,
            },
            identity: IdentityConfig::empty(),
            payments: PaymentsConfig::empty(),
            storage: StorageConfig::default_folder(),
            email: EmailConfig::default_provider(),
            scheduler: SchedulerConfig {
                enabled: true,
                reminder_interval_secs: 60 * 60,
                recurring_interval_secs: 24 * 60 * 60,
                payment_reminder_interval_secs: 24 * 60 * 60,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                run_migrations: true,
            },
            api: ApiConfig {
                max_request_size_bytes: 12 * 1024 * 1024,
                http_client_timeout_secs: 15,
            },
            security: SecurityConfig {
                frontend_url: "https://staging.cleanbook.app".to_string(),
                invitation_expiry_days: 7,
            },
            ..Self::development()
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                run_migrations: false,
            },
            api: ApiConfig {
                max_request_size_bytes: 12 * 1024 * 1024,
                http_client_timeout_secs: 10,
            },
            security: SecurityConfig {
                frontend_url: "https://app.cleanbook.app".to_string(),
                invitation_expiry_days: 7,
            },
            ..Self::development()
        }
    }
}

impl IdentityConfig {
    fn empty() -> Self {
        Self {
            supabase_url: None,
            service_role_key: None,
            anon_key: None,
            jwt_secret: None,
        }
    }
}

impl PaymentsConfig {
    fn empty() -> Self {
        Self {
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            price_id_solo: None,
            price_id_small_team: None,
        }
    }
}

impl StorageConfig {
    fn default_folder() -> Self {
        Self {
            imagekit_private_key: None,
            documents_url: None,
            upload_folder: "job-photos".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl EmailConfig {
    fn default_provider() -> Self {
        Self {
            api_key: None,
            api_url: "https://api.resend.com/emails".to_string(),
            from: "CleanBook <noreply@cleanbook.app>".to_string(),
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.server.port, 3000);
        assert!(config.database.run_migrations);
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.reminder_interval_secs, 3600);
        assert_eq!(config.storage.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.environment, Environment::Production);
        assert!(!config.database.run_migrations);
        assert_eq!(config.security.invitation_expiry_days, 7);
        assert!(config.identity.jwt_secret.is_none());
    }

    #[test]
    fn upload_cap_fits_inside_request_limit() {
        for config in [AppConfig::development(), AppConfig::staging(), AppConfig::production()] {
            assert!(config.storage.max_upload_bytes < config.api.max_request_size_bytes);
        }
    }
}
