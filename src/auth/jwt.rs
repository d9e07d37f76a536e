use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::auth::claims::SessionClaims;
use crate::config::JwtConfig;
use crate::error::AuthError;

/// Issues and verifies the service's own bearer tokens. Built once at
/// startup; the algorithm is fixed for the process lifetime.
///
/// Tokens are stateless: there is no revocation list, so an issued token
/// stays valid until its expiry regardless of later account changes.
/// Deactivation is enforced when the user record is loaded, not here.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    default_ttl: Duration,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys")
            .field("algorithm", &self.algorithm)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn new(config: &JwtConfig) -> anyhow::Result<Self> {
        let algorithm: Algorithm = config.algorithm.parse()?;
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            anyhow::bail!("session tokens are signed with a shared secret; {algorithm:?} is not an HMAC algorithm");
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            algorithm,
            default_ttl: Duration::minutes(config.ttl_minutes),
        })
    }

    /// Mint a token for `user_id`, valid for `ttl` (the configured default
    /// when unspecified).
    pub fn sign(&self, user_id: i64, ttl: Option<Duration>) -> Result<String, AuthError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let exp = OffsetDateTime::now_utc() + ttl;
        let claims = SessionClaims {
            sub: Some(user_id.to_string()),
            exp: exp.unix_timestamp(),
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(e.into()))?;
        debug!(user_id, "session token signed");
        Ok(token)
    }

    /// Decode and check a token, returning the subject user id.
    ///
    /// Signature mismatch, malformed payload and expiry all surface as
    /// `InvalidSession`; a structurally valid token without a subject claim
    /// surfaces as `MissingSubject`.
    pub fn verify(&self, token: &str) -> Result<i64, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_aud = false;
        let data = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "session token rejected");
            AuthError::InvalidSession
        })?;
        let sub = data.claims.sub.ok_or(AuthError::MissingSubject)?;
        sub.parse::<i64>().map_err(|_| AuthError::InvalidSession)
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .or_else(|| header_value.strip_prefix("bearer "))
}
