use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use super::types::{
    EntryTotals, NewEntry, NewUser, SavingsEntry, SettingsPatch, SystemLog, SystemSettings, User,
    UserPatch,
};
use super::Store;

/// In-memory store mirroring the Postgres row semantics, including the
/// uniqueness constraints. Backs unit tests and embedding consumers' tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    entries: Vec<SavingsEntry>,
    settings: Option<SystemSettings>,
    logs: Vec<SystemLog>,
    next_user_id: i64,
    next_entry_id: i64,
    next_log_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> anyhow::Result<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .iter()
            .find(|u| u.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> anyhow::Result<User> {
        let mut inner = self.inner.lock().await;
        if inner.users.iter().any(|u| u.email == new_user.email) {
            anyhow::bail!("unique violation: users.email");
        }
        if let Some(external_id) = &new_user.external_id {
            if inner
                .users
                .iter()
                .any(|u| u.external_id.as_deref() == Some(external_id))
            {
                anyhow::bail!("unique violation: users.external_id");
            }
        }
        inner.next_user_id += 1;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: inner.next_user_id,
            email: new_user.email,
            name: new_user.name,
            picture: new_user.picture,
            password_hash: new_user.password_hash,
            external_id: new_user.external_id,
            role: new_user.role,
            is_active: new_user.is_active,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> anyhow::Result<Option<User>> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(picture) = patch.picture {
            user.picture = Some(picture);
        }
        if let Some(external_id) = patch.external_id {
            user.external_id = Some(external_id);
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(is_active) = patch.is_active {
            user.is_active = is_active;
        }
        if let Some(last_login) = patch.last_login {
            user.last_login = Some(last_login);
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn list_users(&self) -> anyhow::Result<Vec<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.clone())
    }

    async fn count_users(&self) -> anyhow::Result<i64> {
        let inner = self.inner.lock().await;
        Ok(inner.users.len() as i64)
    }

    async fn get_or_create_settings(&self) -> anyhow::Result<SystemSettings> {
        let mut inner = self.inner.lock().await;
        let now = OffsetDateTime::now_utc();
        let settings = inner.settings.get_or_insert_with(|| SystemSettings {
            id: 1,
            site_name: None,
            allow_signups: true,
            token_expiry_minutes: 30,
            created_at: now,
            updated_at: now,
        });
        Ok(settings.clone())
    }

    async fn update_settings(&self, patch: SettingsPatch) -> anyhow::Result<SystemSettings> {
        self.get_or_create_settings().await?;
        let mut inner = self.inner.lock().await;
        let settings = inner
            .settings
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("settings row missing after get-or-create"))?;
        if let Some(site_name) = patch.site_name {
            settings.site_name = Some(site_name);
        }
        if let Some(allow_signups) = patch.allow_signups {
            settings.allow_signups = allow_signups;
        }
        if let Some(minutes) = patch.token_expiry_minutes {
            if minutes > 0 {
                settings.token_expiry_minutes = minutes;
            }
        }
        settings.updated_at = OffsetDateTime::now_utc();
        Ok(settings.clone())
    }

    async fn create_entry(&self, user_id: i64, entry: NewEntry) -> anyhow::Result<SavingsEntry> {
        let mut inner = self.inner.lock().await;
        inner.next_entry_id += 1;
        let now = OffsetDateTime::now_utc();
        let row = SavingsEntry {
            id: inner.next_entry_id,
            user_id,
            date: entry.date,
            amount: entry.amount,
            description: entry.description,
            created_at: now,
            updated_at: now,
        };
        inner.entries.push(row.clone());
        Ok(row)
    }

    async fn list_entries(&self, user_id: i64) -> anyhow::Result<Vec<SavingsEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_entry(&self, id: i64) -> anyhow::Result<Option<SavingsEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner.entries.iter().find(|e| e.id == id).cloned())
    }

    async fn update_entry(
        &self,
        id: i64,
        entry: NewEntry,
    ) -> anyhow::Result<Option<SavingsEntry>> {
        let mut inner = self.inner.lock().await;
        let Some(row) = inner.entries.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };
        row.date = entry.date;
        row.amount = entry.amount;
        row.description = entry.description;
        row.updated_at = OffsetDateTime::now_utc();
        Ok(Some(row.clone()))
    }

    async fn delete_entry(&self, id: i64) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().await;
        let before = inner.entries.len();
        inner.entries.retain(|e| e.id != id);
        Ok(inner.entries.len() < before)
    }

    async fn entry_totals(&self) -> anyhow::Result<EntryTotals> {
        let inner = self.inner.lock().await;
        let amount = inner
            .entries
            .iter()
            .fold(Decimal::ZERO, |acc, e| acc + e.amount);
        Ok(EntryTotals {
            entries: inner.entries.len() as i64,
            amount,
        })
    }

    async fn append_log(
        &self,
        level: &str,
        message: &str,
        meta: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        inner.next_log_id += 1;
        let log = SystemLog {
            id: inner.next_log_id,
            level: level.to_string(),
            message: message.to_string(),
            meta: meta.map(|m| m.to_string()),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.logs.push(log);
        Ok(())
    }

    async fn recent_logs(
        &self,
        level: Option<&str>,
        limit: i64,
    ) -> anyhow::Result<Vec<SystemLog>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .logs
            .iter()
            .rev()
            .filter(|l| level.map(|lv| l.level == lv).unwrap_or(true))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::types::Role;
    use super::*;
    use std::sync::Arc;

    fn new_user(email: &str, external_id: Option<&str>) -> NewUser {
        NewUser {
            email: email.into(),
            name: "Test".into(),
            picture: None,
            password_hash: None,
            external_id: external_id.map(|s| s.to_string()),
            role: Role::User,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn email_uniqueness_is_enforced() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@x.com", None)).await.unwrap();
        let err = store.create_user(new_user("a@x.com", None)).await.unwrap_err();
        assert!(err.to_string().contains("users.email"));
    }

    #[tokio::test]
    async fn external_id_uniqueness_is_enforced() {
        let store = MemoryStore::new();
        store
            .create_user(new_user("a@x.com", Some("ext-1")))
            .await
            .unwrap();
        let err = store
            .create_user(new_user("b@x.com", Some("ext-1")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("users.external_id"));
    }

    #[tokio::test]
    async fn lookup_by_external_id() {
        let store = MemoryStore::new();
        let created = store
            .create_user(new_user("a@x.com", Some("ext-9")))
            .await
            .unwrap();
        let found = store.find_user_by_external_id("ext-9").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(created.id));
        assert!(store.find_user_by_external_id("ext-0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_user_applies_only_supplied_fields() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("a@x.com", None)).await.unwrap();
        let updated = store
            .update_user(
                user.id,
                UserPatch {
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .expect("user exists");
        assert_eq!(updated.role, Role::Admin);
        assert_eq!(updated.email, "a@x.com");
        assert!(updated.is_active);
        assert!(updated.last_login.is_none());
    }

    #[tokio::test]
    async fn concurrent_first_settings_reads_create_one_row() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.get_or_create_settings().await.unwrap()
            }));
        }
        let mut rows = Vec::new();
        for handle in handles {
            rows.push(handle.await.unwrap());
        }
        let first = &rows[0];
        assert_eq!(first.id, 1);
        assert!(first.allow_signups);
        assert_eq!(first.token_expiry_minutes, 30);
        // Every reader saw the very same row, creation timestamp included.
        assert!(rows.iter().all(|r| r == first));
    }

    #[tokio::test]
    async fn settings_update_ignores_non_positive_expiry() {
        let store = MemoryStore::new();
        let settings = store
            .update_settings(SettingsPatch {
                token_expiry_minutes: Some(0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(settings.token_expiry_minutes, 30);

        let settings = store
            .update_settings(SettingsPatch {
                token_expiry_minutes: Some(-5),
                site_name: Some("Savings Calendar".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(settings.token_expiry_minutes, 30);
        assert_eq!(settings.site_name.as_deref(), Some("Savings Calendar"));
    }

    #[tokio::test]
    async fn recent_logs_filters_and_orders() {
        let store = MemoryStore::new();
        store.append_log("INFO", "first", None).await.unwrap();
        store.append_log("ERROR", "second", Some("{}")).await.unwrap();
        store.append_log("INFO", "third", None).await.unwrap();

        let all = store.recent_logs(None, 500).await.unwrap();
        assert_eq!(
            all.iter().map(|l| l.message.as_str()).collect::<Vec<_>>(),
            vec!["third", "second", "first"]
        );

        let errors = store.recent_logs(Some("ERROR"), 500).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "second");
    }
}
