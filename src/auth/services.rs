use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::auth::dto::{
    AuthResponse, ExternalAuthRequest, LoginRequest, PublicUser, RegisterRequest,
};
use crate::auth::identity::IdentityVerifier;
use crate::auth::jwt::JwtKeys;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::policy::AuthContext;
use crate::error::AuthError;
use crate::store::{log_event, NewUser, Role, Store, UserPatch};

/// Registration, login, external-identity exchange and per-request
/// authentication. Holds the persistence collaborator and the two token
/// components, all fixed at startup.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    jwt: JwtKeys,
    identity: IdentityVerifier,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, jwt: JwtKeys, identity: IdentityVerifier) -> Self {
        Self {
            store,
            jwt,
            identity,
        }
    }

    /// Create a password account and mint its first session token.
    ///
    /// Nothing is written when registration fails: the signup switch and
    /// the email uniqueness check both run before the insert.
    #[instrument(skip(self, req))]
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, AuthError> {
        let settings = self.store.get_or_create_settings().await?;
        if !settings.allow_signups {
            warn!(email = %req.email, "registration attempted while signups are disabled");
            return Err(AuthError::SignupsDisabled);
        }

        if self.store.find_user_by_email(&req.email).await?.is_some() {
            warn!(email = %req.email, "email already registered");
            return Err(AuthError::EmailTaken);
        }

        let hash = hash_password(&req.password)?;
        let user = self
            .store
            .create_user(NewUser {
                email: req.email,
                name: req.name,
                picture: None,
                password_hash: Some(hash),
                external_id: None,
                role: Role::User,
                is_active: true,
            })
            .await?;

        let token = self.jwt.sign(user.id, Some(settings.token_ttl()))?;

        info!(user_id = user.id, email = %user.email, "user registered");
        log_event(
            self.store.as_ref(),
            "INFO",
            "user registered",
            Some(serde_json::json!({"user_id": user.id, "email": user.email}).to_string()),
        )
        .await;

        Ok(AuthResponse::bearer(token, &user))
    }

    /// Verify a password and mint a session token. Unknown email, an
    /// account without a password, and a wrong password are deliberately
    /// indistinguishable; `last_login` is only written on success.
    #[instrument(skip(self, req))]
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AuthError> {
        let Some(user) = self.store.find_user_by_email(&req.email).await? else {
            warn!(email = %req.email, "login with unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        let Some(hash) = user.password_hash.as_deref() else {
            warn!(user_id = user.id, "login against a password-less account");
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(&req.password, hash) {
            warn!(user_id = user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let settings = self.store.get_or_create_settings().await?;
        let token = self.jwt.sign(user.id, Some(settings.token_ttl()))?;

        let user = self
            .store
            .update_user(
                user.id,
                UserPatch {
                    last_login: Some(OffsetDateTime::now_utc()),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| anyhow::anyhow!("user row vanished during login"))?;

        info!(user_id = user.id, email = %user.email, "user logged in");
        log_event(
            self.store.as_ref(),
            "INFO",
            "user logged in",
            Some(serde_json::json!({"user_id": user.id}).to_string()),
        )
        .await;

        Ok(AuthResponse::bearer(token, &user))
    }

    /// Exchange a third-party identity token for a session token, creating
    /// or linking the account as needed.
    ///
    /// The account is looked up by the email the client asserts, not by a
    /// claim inside the token; the verified claims only supply the external
    /// subject id. An account that already carries an external id is used
    /// as-is. Linking never touches an existing password hash.
    #[instrument(skip(self, req))]
    pub async fn external_auth(&self, req: ExternalAuthRequest) -> Result<AuthResponse, AuthError> {
        let claims = self.identity.verify(&req.token)?;

        let user = match self.store.find_user_by_email(&req.email).await? {
            None => {
                let user = self
                    .store
                    .create_user(NewUser {
                        email: req.email,
                        name: req.name,
                        picture: req.picture,
                        password_hash: None,
                        external_id: Some(claims.sub),
                        role: Role::User,
                        is_active: true,
                    })
                    .await?;
                info!(user_id = user.id, "account created from external identity");
                user
            }
            Some(user) if user.external_id.is_none() => {
                let user = self
                    .store
                    .update_user(
                        user.id,
                        UserPatch {
                            external_id: Some(claims.sub),
                            picture: req.picture,
                            ..Default::default()
                        },
                    )
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("user row vanished during linking"))?;
                info!(user_id = user.id, "external identity linked to existing account");
                log_event(
                    self.store.as_ref(),
                    "INFO",
                    "external identity linked",
                    Some(serde_json::json!({"user_id": user.id}).to_string()),
                )
                .await;
                user
            }
            Some(user) => user,
        };

        let settings = self.store.get_or_create_settings().await?;
        let token = self.jwt.sign(user.id, Some(settings.token_ttl()))?;

        let user = self
            .store
            .update_user(
                user.id,
                UserPatch {
                    last_login: Some(OffsetDateTime::now_utc()),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| anyhow::anyhow!("user row vanished during external auth"))?;

        info!(user_id = user.id, "external identity sign-in");
        Ok(AuthResponse::bearer(token, &user))
    }

    /// Resolve a bearer token into an authorization context: verify the
    /// token, load the user, and reject disabled accounts. Deactivation
    /// takes effect here on the very next check, without waiting for the
    /// token to expire.
    #[instrument(skip(self, bearer))]
    pub async fn authenticate(&self, bearer: &str) -> Result<AuthContext, AuthError> {
        let user_id = self.jwt.verify(bearer)?;
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !user.is_active {
            warn!(user_id, "authentication by disabled account");
            return Err(AuthError::AccountDisabled);
        }
        Ok(AuthContext::new(user))
    }

    /// The authenticated caller's own public profile.
    pub fn current_user(&self, ctx: &AuthContext) -> PublicUser {
        PublicUser::from(&ctx.user)
    }
}
