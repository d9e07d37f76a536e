use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};

use crate::admin::dto::{AdminUserRow, AdminUserUpdate, Analytics, SettingsView};
use crate::auth::policy::{require_role, AuthContext};
use crate::error::AuthError;
use crate::store::{log_event, Role, SettingsPatch, Store, SystemLog, User, UserPatch};

const LOG_LIMIT: i64 = 500;

/// Role-gated administrative surface: user management, usage analytics,
/// system settings and the persisted event log.
#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn Store>,
}

impl AdminService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, ctx))]
    pub async fn list_users(&self, ctx: &AuthContext) -> Result<Vec<AdminUserRow>, AuthError> {
        require_role(ctx, Role::Admin)?;
        let users = self.store.list_users().await?;
        Ok(users.iter().map(AdminUserRow::from).collect())
    }

    /// Assign a role and/or flip the active flag on a user.
    #[instrument(skip(self, ctx, update))]
    pub async fn update_user(
        &self,
        ctx: &AuthContext,
        user_id: i64,
        update: AdminUserUpdate,
    ) -> Result<User, AuthError> {
        require_role(ctx, Role::Admin)?;
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let patch = UserPatch {
            role: update.role,
            is_active: update.toggle_active.map(|_| !user.is_active),
            ..Default::default()
        };
        let updated = self
            .store
            .update_user(user_id, patch)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        info!(
            admin_id = ctx.user_id(),
            user_id,
            role = %updated.role,
            is_active = updated.is_active,
            "user updated by admin"
        );
        log_event(
            self.store.as_ref(),
            "INFO",
            "user updated by admin",
            Some(
                serde_json::json!({
                    "admin_id": ctx.user_id(),
                    "user_id": user_id,
                    "role": updated.role,
                    "is_active": updated.is_active,
                })
                .to_string(),
            ),
        )
        .await;
        Ok(updated)
    }

    #[instrument(skip(self, ctx))]
    pub async fn analytics(&self, ctx: &AuthContext) -> Result<Analytics, AuthError> {
        require_role(ctx, Role::Admin)?;
        let total_users = self.store.count_users().await?;
        let totals = self.store.entry_totals().await?;
        let average = if totals.entries > 0 {
            (totals.amount / Decimal::from(totals.entries)).round_dp(2)
        } else {
            Decimal::ZERO
        };
        Ok(Analytics {
            total_users,
            total_savings_entries: totals.entries,
            total_savings_amount: totals.amount.round_dp(2),
            average_per_entry: average,
        })
    }

    #[instrument(skip(self, ctx))]
    pub async fn get_settings(&self, ctx: &AuthContext) -> Result<SettingsView, AuthError> {
        require_role(ctx, Role::Admin)?;
        let settings = self.store.get_or_create_settings().await?;
        Ok(settings.into())
    }

    #[instrument(skip(self, ctx, patch))]
    pub async fn update_settings(
        &self,
        ctx: &AuthContext,
        patch: SettingsPatch,
    ) -> Result<SettingsView, AuthError> {
        require_role(ctx, Role::Admin)?;
        let settings = self.store.update_settings(patch).await?;
        info!(admin_id = ctx.user_id(), "settings updated");
        log_event(
            self.store.as_ref(),
            "INFO",
            "settings updated",
            Some(serde_json::json!({"admin_id": ctx.user_id()}).to_string()),
        )
        .await;
        Ok(settings.into())
    }

    #[instrument(skip(self, ctx))]
    pub async fn logs(
        &self,
        ctx: &AuthContext,
        level: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<SystemLog>, AuthError> {
        require_role(ctx, Role::Admin)?;
        let limit = limit.unwrap_or(LOG_LIMIT).clamp(1, LOG_LIMIT);
        Ok(self.store.recent_logs(level, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::dto::RegisterRequest;
    use crate::state::AppState;
    use crate::store::NewEntry;
    use time::OffsetDateTime;

    async fn register(state: &AppState, email: &str) -> AuthContext {
        let response = state
            .auth
            .register(RegisterRequest {
                email: email.into(),
                name: "Test".into(),
                password: "pw1".into(),
            })
            .await
            .unwrap();
        state.auth.authenticate(&response.access_token).await.unwrap()
    }

    async fn register_admin(state: &AppState, email: &str) -> AuthContext {
        let ctx = register(state, email).await;
        let user = state
            .store
            .update_user(
                ctx.user_id(),
                UserPatch {
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        AuthContext::new(user)
    }

    fn entry(amount: &str) -> NewEntry {
        NewEntry {
            date: OffsetDateTime::now_utc(),
            amount: amount.parse().unwrap(),
            description: None,
        }
    }

    #[tokio::test]
    async fn every_operation_requires_the_admin_role() {
        let state = AppState::fake();
        let ctx = register(&state, "user@x.com").await;

        assert!(matches!(
            state.admin.list_users(&ctx).await.unwrap_err(),
            AuthError::InsufficientPrivilege
        ));
        assert!(matches!(
            state.admin.analytics(&ctx).await.unwrap_err(),
            AuthError::InsufficientPrivilege
        ));
        assert!(matches!(
            state.admin.get_settings(&ctx).await.unwrap_err(),
            AuthError::InsufficientPrivilege
        ));
        assert!(matches!(
            state
                .admin
                .update_settings(&ctx, SettingsPatch::default())
                .await
                .unwrap_err(),
            AuthError::InsufficientPrivilege
        ));
        assert!(matches!(
            state.admin.logs(&ctx, None, None).await.unwrap_err(),
            AuthError::InsufficientPrivilege
        ));
    }

    #[tokio::test]
    async fn list_users_shows_every_account() {
        let state = AppState::fake();
        let admin = register_admin(&state, "admin@x.com").await;
        register(&state, "a@x.com").await;

        let rows = state.admin.list_users(&admin).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.email == "a@x.com" && r.role == Role::User));
    }

    #[tokio::test]
    async fn role_assignment_and_active_toggle() {
        let state = AppState::fake();
        let admin = register_admin(&state, "admin@x.com").await;
        let target = register(&state, "a@x.com").await;

        let updated = state
            .admin
            .update_user(
                &admin,
                target.user_id(),
                AdminUserUpdate {
                    role: Some(Role::Admin),
                    toggle_active: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert!(updated.is_active);

        // The toggle flips on presence, whatever the value.
        let updated = state
            .admin
            .update_user(
                &admin,
                target.user_id(),
                AdminUserUpdate {
                    role: None,
                    toggle_active: Some(false),
                },
            )
            .await
            .unwrap();
        assert!(!updated.is_active);

        let updated = state
            .admin
            .update_user(
                &admin,
                target.user_id(),
                AdminUserUpdate {
                    role: None,
                    toggle_active: Some(true),
                },
            )
            .await
            .unwrap();
        assert!(updated.is_active);
    }

    #[tokio::test]
    async fn updating_a_missing_user_is_user_not_found() {
        let state = AppState::fake();
        let admin = register_admin(&state, "admin@x.com").await;
        let err = state
            .admin
            .update_user(&admin, 999, AdminUserUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn analytics_totals_and_rounding() {
        let state = AppState::fake();
        let admin = register_admin(&state, "admin@x.com").await;
        let a = register(&state, "a@x.com").await;
        let b = register(&state, "b@x.com").await;

        state.savings.create(&a, entry("10.00")).await.unwrap();
        state.savings.create(&a, entry("0.01")).await.unwrap();
        state.savings.create(&b, entry("5.00")).await.unwrap();

        let analytics = state.admin.analytics(&admin).await.unwrap();
        assert_eq!(analytics.total_users, 3);
        assert_eq!(analytics.total_savings_entries, 3);
        assert_eq!(
            analytics.total_savings_amount,
            "15.01".parse::<Decimal>().unwrap()
        );
        assert_eq!(
            analytics.average_per_entry,
            "5.00".parse::<Decimal>().unwrap()
        );
    }

    #[tokio::test]
    async fn analytics_with_no_entries_is_all_zero() {
        let state = AppState::fake();
        let admin = register_admin(&state, "admin@x.com").await;
        let analytics = state.admin.analytics(&admin).await.unwrap();
        assert_eq!(analytics.total_savings_entries, 0);
        assert_eq!(analytics.average_per_entry, Decimal::ZERO);
    }

    #[tokio::test]
    async fn settings_roundtrip_through_the_admin_surface() {
        let state = AppState::fake();
        let admin = register_admin(&state, "admin@x.com").await;

        let view = state.admin.get_settings(&admin).await.unwrap();
        assert!(view.allow_signups);
        assert_eq!(view.token_expiry_minutes, 30);

        let view = state
            .admin
            .update_settings(
                &admin,
                SettingsPatch {
                    site_name: Some("Savings Calendar".into()),
                    allow_signups: Some(false),
                    token_expiry_minutes: Some(0), // ignored: not positive
                },
            )
            .await
            .unwrap();
        assert_eq!(view.site_name.as_deref(), Some("Savings Calendar"));
        assert!(!view.allow_signups);
        assert_eq!(view.token_expiry_minutes, 30);
    }

    #[tokio::test]
    async fn log_trail_is_readable_and_filterable() {
        let state = AppState::fake();
        let admin = register_admin(&state, "admin@x.com").await;
        register(&state, "a@x.com").await;

        let logs = state.admin.logs(&admin, None, None).await.unwrap();
        assert!(logs.iter().any(|l| l.message == "user registered"));

        let none = state.admin.logs(&admin, Some("ERROR"), None).await.unwrap();
        assert!(none.is_empty());
    }
}
