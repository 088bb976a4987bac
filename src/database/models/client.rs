use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};

/// Customer of a business.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub business_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<Json<ClientNotes>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Access and contact details kept alongside a client, stored as JSONB.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientNotes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_safe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarm_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pets: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Client {
    /// Email address kept in the notes, if any.
    pub fn email(&self) -> Option<&str> {
        self.notes
            .as_ref()
            .and_then(|notes| notes.0.email.as_deref())
            .filter(|email| !email.trim().is_empty())
    }
}
