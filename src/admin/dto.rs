use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::store::{Role, SystemSettings, User};

#[derive(Debug, Clone, Serialize)]
pub struct AdminUserRow {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}

impl From<&User> for AdminUserRow {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// Administrative change to a user: assign a role and/or flip the active
/// flag. `toggle_active` flips regardless of the boolean's value; its
/// presence is what matters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUserUpdate {
    pub role: Option<Role>,
    pub toggle_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub total_users: i64,
    pub total_savings_entries: i64,
    pub total_savings_amount: Decimal,
    pub average_per_entry: Decimal,
}

/// The settings fields exposed over the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    pub site_name: Option<String>,
    pub allow_signups: bool,
    pub token_expiry_minutes: i64,
}

impl From<SystemSettings> for SettingsView {
    fn from(settings: SystemSettings) -> Self {
        Self {
            site_name: settings.site_name,
            allow_signups: settings.allow_signups,
            token_expiry_minutes: settings.token_expiry_minutes,
        }
    }
}
