use crate::error::AuthError;
use crate::store::{Role, User};

/// The authenticated principal for one request: a verified session token
/// resolved to a live user record.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
}

impl AuthContext {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }
}

/// Gate an operation on the caller's role. Admins satisfy every role
/// requirement.
pub fn require_role(ctx: &AuthContext, role: Role) -> Result<(), AuthError> {
    match role {
        Role::Admin if ctx.user.role != Role::Admin => Err(AuthError::InsufficientPrivilege),
        _ => Ok(()),
    }
}

/// Gate an operation on resource ownership. A mismatch is reported as
/// `NotFound`, the same answer a genuinely absent record gets, so the
/// existence of other users' records is never confirmed.
pub fn require_ownership(ctx: &AuthContext, owner_id: i64) -> Result<(), AuthError> {
    if ctx.user.id == owner_id {
        Ok(())
    } else {
        Err(AuthError::NotFound)
    }
}
