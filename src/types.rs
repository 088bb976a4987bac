/// Shared enums used across models, services and handlers.
///
/// Each enum is stored as a Postgres enum type of the same snake_case name and
/// serialized on the wire in SCREAMING_SNAKE_CASE.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Owner,
    Cleaner,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Owner => "OWNER",
            UserRole::Cleaner => "CLEANER",
            UserRole::Admin => "ADMIN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "cleaner_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CleanerStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    OneOff,
    Recurring,
}

impl JobType {
    pub fn label(&self) -> &'static str {
        match self {
            JobType::OneOff => "ONE OFF",
            JobType::Recurring => "RECURRING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_frequency", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobFrequency {
    Weekly,
    BiWeekly,
}

impl JobFrequency {
    /// Days between two consecutive occurrences.
    pub fn interval_days(&self) -> i64 {
        match self {
            JobFrequency::Weekly => 7,
            JobFrequency::BiWeekly => 14,
        }
    }
}

/// Job lifecycle. Variants are declared in lifecycle order so `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Scheduled,
    InProgress,
    Completed,
}

impl JobStatus {
    /// Forward-only: staying put is a no-op, moving back is never allowed.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        next >= *self
    }

    pub fn next(&self) -> Option<JobStatus> {
        match self {
            JobStatus::Scheduled => Some(JobStatus::InProgress),
            JobStatus::InProgress => Some(JobStatus::Completed),
            JobStatus::Completed => None,
        }
    }

    pub fn is_deletable(&self) -> bool {
        matches!(self, JobStatus::Scheduled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "photo_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhotoType {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    BankTransfer,
    Card,
    Cash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanType {
    Free,
    Solo,
    SmallTeam,
}

impl PlanType {
    /// Jobs per calendar month included in the plan.
    pub fn monthly_job_limit(&self) -> i64 {
        match self {
            PlanType::Free => 10,
            PlanType::Solo => 50,
            PlanType::SmallTeam => 200,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Free => "FREE",
            PlanType::Solo => "SOLO",
            PlanType::SmallTeam => "SMALL_TEAM",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "FREE" => Some(PlanType::Free),
            "SOLO" => Some(PlanType::Solo),
            "SMALL_TEAM" => Some(PlanType::SmallTeam),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    PastDue,
}
