use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use time::{Duration, OffsetDateTime};

/// Account role. Stored as text, exposed as a typed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(anyhow::anyhow!("unknown role: {other}")),
        }
    }
}

/// Identity record. Either `password_hash` or `external_id` must be present
/// for the account to ever authenticate; email and external id are each
/// unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub external_id: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub password_hash: Option<String>,
    pub external_id: Option<String>,
    pub role: Role,
    pub is_active: bool,
}

/// Partial update of a user row. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub picture: Option<String>,
    pub external_id: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub last_login: Option<OffsetDateTime>,
}

/// One dated monetary entry, owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SavingsEntry {
    pub id: i64,
    pub user_id: i64,
    pub date: OffsetDateTime,
    pub amount: Decimal,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Payload for creating or fully replacing a savings entry.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEntry {
    pub date: OffsetDateTime,
    pub amount: Decimal,
    pub description: Option<String>,
}

/// Singleton configuration row, lazily created with defaults on first read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SystemSettings {
    pub id: i64,
    pub site_name: Option<String>,
    pub allow_signups: bool,
    pub token_expiry_minutes: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl SystemSettings {
    /// Session-token lifetime derived from the current settings.
    pub fn token_ttl(&self) -> Duration {
        Duration::minutes(self.token_expiry_minutes)
    }
}

/// Partial settings update. `None` fields are no-ops; a non-positive
/// `token_expiry_minutes` is silently ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub site_name: Option<String>,
    pub allow_signups: Option<bool>,
    pub token_expiry_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SystemLog {
    pub id: i64,
    pub level: String,
    pub message: String,
    pub meta: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Aggregate over all savings entries, for the admin analytics surface.
#[derive(Debug, Clone, Copy)]
pub struct EntryTotals {
    pub entries: i64,
    pub amount: Decimal,
}
