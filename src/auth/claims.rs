use serde::{Deserialize, Serialize};

/// Payload of the session tokens this service mints itself.
///
/// `sub` is optional on the decode side so that a token without a subject
/// claim is reported as such instead of failing as a generic parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>, // user id, as string
    pub exp: i64, // expiry (unix timestamp)
}

/// Claims extracted from a validated third-party identity token. These are
/// the authoritative identity values; anything the client sends alongside
/// the raw token is advisory.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityClaims {
    pub sub: String, // stable subject id at the provider
    pub email: Option<String>,
    pub name: Option<String>,
}
