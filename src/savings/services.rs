use std::sync::Arc;

use tracing::{info, instrument};

use crate::auth::policy::{require_ownership, AuthContext};
use crate::error::AuthError;
use crate::store::{NewEntry, SavingsEntry, Store};

/// Per-user CRUD over dated monetary entries. Every lookup by id is
/// ownership-gated: an entry belonging to someone else answers exactly
/// like one that does not exist.
#[derive(Clone)]
pub struct SavingsService {
    store: Arc<dyn Store>,
}

impl SavingsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, ctx, entry))]
    pub async fn create(
        &self,
        ctx: &AuthContext,
        entry: NewEntry,
    ) -> Result<SavingsEntry, AuthError> {
        let entry = self.store.create_entry(ctx.user_id(), entry).await?;
        info!(user_id = ctx.user_id(), entry_id = entry.id, "savings entry created");
        Ok(entry)
    }

    #[instrument(skip(self, ctx))]
    pub async fn list(&self, ctx: &AuthContext) -> Result<Vec<SavingsEntry>, AuthError> {
        Ok(self.store.list_entries(ctx.user_id()).await?)
    }

    #[instrument(skip(self, ctx))]
    pub async fn get(&self, ctx: &AuthContext, id: i64) -> Result<SavingsEntry, AuthError> {
        let entry = self.store.find_entry(id).await?.ok_or(AuthError::NotFound)?;
        require_ownership(ctx, entry.user_id)?;
        Ok(entry)
    }

    #[instrument(skip(self, ctx, entry))]
    pub async fn update(
        &self,
        ctx: &AuthContext,
        id: i64,
        entry: NewEntry,
    ) -> Result<SavingsEntry, AuthError> {
        self.get(ctx, id).await?;
        let updated = self
            .store
            .update_entry(id, entry)
            .await?
            .ok_or(AuthError::NotFound)?;
        info!(user_id = ctx.user_id(), entry_id = id, "savings entry updated");
        Ok(updated)
    }

    #[instrument(skip(self, ctx))]
    pub async fn delete(&self, ctx: &AuthContext, id: i64) -> Result<(), AuthError> {
        self.get(ctx, id).await?;
        if !self.store.delete_entry(id).await? {
            return Err(AuthError::NotFound);
        }
        info!(user_id = ctx.user_id(), entry_id = id, "savings entry deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::dto::RegisterRequest;
    use crate::state::AppState;
    use rust_decimal::Decimal;
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

    fn entry(amount: &str) -> NewEntry {
        NewEntry {
            date: OffsetDateTime::now_utc(),
            amount: amount.parse::<Decimal>().unwrap(),
            description: Some("coffee money".into()),
        }
    }

    #[tokio::test]
    async fn create_list_and_get_own_entries() {
        let state = AppState::fake();
        let ctx = register(&state, "a@x.com").await;

        let created = state.savings.create(&ctx, entry("12.50")).await.unwrap();
        assert_eq!(created.user_id, ctx.user_id());
        assert_eq!(created.amount, "12.50".parse::<Decimal>().unwrap());

        let listed = state.savings.list(&ctx).await.unwrap();
        assert_eq!(listed.len(), 1);

        let fetched = state.savings.get(&ctx, created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
    }

    #[tokio::test]
    async fn foreign_and_absent_entries_are_indistinguishable() {
        let state = AppState::fake();
        let owner = register(&state, "a@x.com").await;
        let other = register(&state, "b@x.com").await;

        let created = state.savings.create(&owner, entry("5.00")).await.unwrap();

        let foreign = state.savings.get(&other, created.id).await.unwrap_err();
        let absent = state.savings.get(&other, 9999).await.unwrap_err();
        assert!(matches!(foreign, AuthError::NotFound));
        assert!(matches!(absent, AuthError::NotFound));
        assert_eq!(foreign.to_string(), absent.to_string());
    }

    #[tokio::test]
    async fn list_is_scoped_to_the_caller() {
        let state = AppState::fake();
        let a = register(&state, "a@x.com").await;
        let b = register(&state, "b@x.com").await;

        state.savings.create(&a, entry("1.00")).await.unwrap();
        state.savings.create(&a, entry("2.00")).await.unwrap();
        state.savings.create(&b, entry("3.00")).await.unwrap();

        assert_eq!(state.savings.list(&a).await.unwrap().len(), 2);
        assert_eq!(state.savings.list(&b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_replaces_the_entry_and_respects_ownership() {
        let state = AppState::fake();
        let owner = register(&state, "a@x.com").await;
        let other = register(&state, "b@x.com").await;

        let created = state.savings.create(&owner, entry("5.00")).await.unwrap();
        let updated = state
            .savings
            .update(&owner, created.id, entry("7.25"))
            .await
            .unwrap();
        assert_eq!(updated.amount, "7.25".parse::<Decimal>().unwrap());

        let err = state
            .savings
            .update(&other, created.id, entry("0.01"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn delete_removes_the_entry_and_respects_ownership() {
        let state = AppState::fake();
        let owner = register(&state, "a@x.com").await;
        let other = register(&state, "b@x.com").await;

        let created = state.savings.create(&owner, entry("5.00")).await.unwrap();
        let err = state.savings.delete(&other, created.id).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));

        state.savings.delete(&owner, created.id).await.unwrap();
        let err = state.savings.get(&owner, created.id).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }
}
