use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tenant. Exactly one per owning user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub vat_enabled: bool,
    pub vat_number: Option<String>,
    pub invoice_template: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Business {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            user_id: user_id.into(),
            name: name.into(),
            phone: None,
            address: None,
            vat_enabled: false,
            vat_number: None,
            invoice_template: InvoiceTemplate::default().as_str().to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Invoice layout chosen by the business. Stored as plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvoiceTemplate {
    #[default]
    Classic,
    Modern,
    Minimal,
    Professional,
    Elegant,
    Bold,
}

impl InvoiceTemplate {
    pub const ALL: [InvoiceTemplate; 6] = [
        InvoiceTemplate::Classic,
        InvoiceTemplate::Modern,
        InvoiceTemplate::Minimal,
        InvoiceTemplate::Professional,
        InvoiceTemplate::Elegant,
        InvoiceTemplate::Bold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceTemplate::Classic => "classic",
            InvoiceTemplate::Modern => "modern",
            InvoiceTemplate::Minimal => "minimal",
            InvoiceTemplate::Professional => "professional",
            InvoiceTemplate::Elegant => "elegant",
            InvoiceTemplate::Bold => "bold",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}
