use async_trait::async_trait;
use tracing::warn;

mod memory;
mod postgres;
mod types;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use types::{
    EntryTotals, NewEntry, NewUser, Role, SavingsEntry, SettingsPatch, SystemLog, SystemSettings,
    User, UserPatch,
};

/// Persistence collaborator. All operations are atomic at the single-row
/// level; no method spans multiple rows transactionally.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_user_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn find_user_by_external_id(&self, external_id: &str) -> anyhow::Result<Option<User>>;
    async fn create_user(&self, new_user: NewUser) -> anyhow::Result<User>;
    /// Applies the `Some` fields of the patch. Returns `None` when no such
    /// user exists.
    async fn update_user(&self, id: i64, patch: UserPatch) -> anyhow::Result<Option<User>>;
    async fn list_users(&self) -> anyhow::Result<Vec<User>>;
    async fn count_users(&self) -> anyhow::Result<i64>;

    /// Returns the settings row, persisting the default one if none exists.
    /// Idempotent under concurrent first readers: exactly one row ever ends
    /// up stored.
    async fn get_or_create_settings(&self) -> anyhow::Result<SystemSettings>;
    async fn update_settings(&self, patch: SettingsPatch) -> anyhow::Result<SystemSettings>;

    async fn create_entry(&self, user_id: i64, entry: NewEntry) -> anyhow::Result<SavingsEntry>;
    async fn list_entries(&self, user_id: i64) -> anyhow::Result<Vec<SavingsEntry>>;
    async fn find_entry(&self, id: i64) -> anyhow::Result<Option<SavingsEntry>>;
    async fn update_entry(&self, id: i64, entry: NewEntry)
        -> anyhow::Result<Option<SavingsEntry>>;
    async fn delete_entry(&self, id: i64) -> anyhow::Result<bool>;
    async fn entry_totals(&self) -> anyhow::Result<EntryTotals>;

    async fn append_log(
        &self,
        level: &str,
        message: &str,
        meta: Option<&str>,
    ) -> anyhow::Result<()>;
    /// Newest first, optionally filtered by level.
    async fn recent_logs(&self, level: Option<&str>, limit: i64) -> anyhow::Result<Vec<SystemLog>>;
}

/// Best-effort audit record; a failed log write never fails the operation
/// that produced it.
pub(crate) async fn log_event(store: &dyn Store, level: &str, message: &str, meta: Option<String>) {
    if let Err(error) = store.append_log(level, message, meta.as_deref()).await {
        warn!(%error, message, "failed to append system log");
    }
}
