use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::OffsetDateTime;

use super::types::{
    EntryTotals, NewEntry, NewUser, SavingsEntry, SettingsPatch, SystemLog, SystemSettings, User,
    UserPatch,
};
use super::Store;

/// Postgres-backed store. The schema is bootstrapped idempotently at
/// connect time; uniqueness of email and external id and the single
/// settings row are enforced by constraints.
pub struct PgStore {
    pool: PgPool,
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        picture TEXT,
        password_hash TEXT,
        external_id TEXT UNIQUE,
        role TEXT NOT NULL DEFAULT 'user',
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        last_login TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS savings (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL REFERENCES users (id),
        date TIMESTAMPTZ NOT NULL,
        amount NUMERIC(10, 2) NOT NULL,
        description TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS system_settings (
        id BIGINT PRIMARY KEY DEFAULT 1 CHECK (id = 1),
        site_name TEXT,
        allow_signups BOOLEAN NOT NULL DEFAULT TRUE,
        token_expiry_minutes BIGINT NOT NULL DEFAULT 30,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS system_logs (
        id BIGSERIAL PRIMARY KEY,
        level TEXT NOT NULL DEFAULT 'INFO',
        message TEXT NOT NULL,
        meta TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

const USER_COLUMNS: &str = "id, email, name, picture, password_hash, external_id, role, \
                            is_active, last_login, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    id: i64,
    email: String,
    name: String,
    picture: Option<String>,
    password_hash: Option<String>,
    external_id: Option<String>,
    role: String,
    is_active: bool,
    last_login: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl UserRow {
    fn into_user(self) -> anyhow::Result<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            name: self.name,
            picture: self.picture,
            password_hash: self.password_hash,
            external_id: self.external_id,
            role: self.role.parse()?,
            is_active: self.is_active,
            last_login: self.last_login,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("bootstrap schema")?;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn find_user_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn create_user(&self, new_user: NewUser) -> anyhow::Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (email, name, picture, password_hash, external_id, role, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.picture)
        .bind(&new_user.password_hash)
        .bind(&new_user.external_id)
        .bind(new_user.role.as_str())
        .bind(new_user.is_active)
        .fetch_one(&self.pool)
        .await?;
        row.into_user()
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET
                picture = COALESCE($2, picture),
                external_id = COALESCE($3, external_id),
                role = COALESCE($4, role),
                is_active = COALESCE($5, is_active),
                last_login = COALESCE($6, last_login),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.picture)
        .bind(&patch.external_id)
        .bind(patch.role.map(|r| r.to_string()))
        .bind(patch.is_active)
        .bind(patch.last_login)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn list_users(&self) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn count_users(&self) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_or_create_settings(&self) -> anyhow::Result<SystemSettings> {
        // Fixed primary key makes the lazy creation a no-op for every
        // concurrent first reader except one.
        sqlx::query("INSERT INTO system_settings (id) VALUES (1) ON CONFLICT (id) DO NOTHING")
            .execute(&self.pool)
            .await?;
        let settings = sqlx::query_as::<_, SystemSettings>(
            r#"
            SELECT id, site_name, allow_signups, token_expiry_minutes, created_at, updated_at
            FROM system_settings
            WHERE id = 1
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(settings)
    }

    async fn update_settings(&self, patch: SettingsPatch) -> anyhow::Result<SystemSettings> {
        self.get_or_create_settings().await?;
        let settings = sqlx::query_as::<_, SystemSettings>(
            r#"
            UPDATE system_settings SET
                site_name = COALESCE($1, site_name),
                allow_signups = COALESCE($2, allow_signups),
                token_expiry_minutes = COALESCE($3, token_expiry_minutes),
                updated_at = now()
            WHERE id = 1
            RETURNING id, site_name, allow_signups, token_expiry_minutes, created_at, updated_at
            "#,
        )
        .bind(&patch.site_name)
        .bind(patch.allow_signups)
        .bind(patch.token_expiry_minutes.filter(|m| *m > 0))
        .fetch_one(&self.pool)
        .await?;
        Ok(settings)
    }

    async fn create_entry(&self, user_id: i64, entry: NewEntry) -> anyhow::Result<SavingsEntry> {
        let row = sqlx::query_as::<_, SavingsEntry>(
            r#"
            INSERT INTO savings (user_id, date, amount, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, date, amount, description, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(entry.date)
        .bind(entry.amount)
        .bind(&entry.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_entries(&self, user_id: i64) -> anyhow::Result<Vec<SavingsEntry>> {
        let rows = sqlx::query_as::<_, SavingsEntry>(
            r#"
            SELECT id, user_id, date, amount, description, created_at, updated_at
            FROM savings
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_entry(&self, id: i64) -> anyhow::Result<Option<SavingsEntry>> {
        let row = sqlx::query_as::<_, SavingsEntry>(
            r#"
            SELECT id, user_id, date, amount, description, created_at, updated_at
            FROM savings
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_entry(
        &self,
        id: i64,
        entry: NewEntry,
    ) -> anyhow::Result<Option<SavingsEntry>> {
        let row = sqlx::query_as::<_, SavingsEntry>(
            r#"
            UPDATE savings SET date = $2, amount = $3, description = $4, updated_at = now()
            WHERE id = $1
            RETURNING id, user_id, date, amount, description, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(entry.date)
        .bind(entry.amount)
        .bind(&entry.description)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_entry(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM savings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn entry_totals(&self) -> anyhow::Result<EntryTotals> {
        let (entries, amount) = sqlx::query_as::<_, (i64, Decimal)>(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM savings",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(EntryTotals { entries, amount })
    }

    async fn append_log(
        &self,
        level: &str,
        message: &str,
        meta: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO system_logs (level, message, meta) VALUES ($1, $2, $3)")
            .bind(level)
            .bind(message)
            .bind(meta)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn recent_logs(&self, level: Option<&str>, limit: i64) -> anyhow::Result<Vec<SystemLog>> {
        let rows = sqlx::query_as::<_, SystemLog>(
            r#"
            SELECT id, level, message, meta, created_at
            FROM system_logs
            WHERE ($1::TEXT IS NULL OR level = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(level)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
