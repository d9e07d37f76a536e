use thiserror::Error;

/// Terminal failures surfaced by the auth, savings and admin services.
///
/// None of these are retriable and none leave partial writes behind.
/// `InvalidCredentials` deliberately covers both unknown email and wrong
/// password, and `NotFound` covers both a genuinely absent record and a
/// record owned by someone else.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email already registered")]
    EmailTaken,
    #[error("signups are disabled")]
    SignupsDisabled,
    #[error("incorrect email or password")]
    InvalidCredentials,
    #[error("invalid identity token")]
    InvalidIdentityToken,
    #[error("invalid or expired token")]
    InvalidSession,
    #[error("token is missing a subject claim")]
    MissingSubject,
    #[error("user not found")]
    UserNotFound,
    #[error("user disabled")]
    AccountDisabled,
    #[error("admin privileges required")]
    InsufficientPrivilege,
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
