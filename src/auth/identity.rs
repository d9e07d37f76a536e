use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::debug;

pub use crate::auth::claims::IdentityClaims;
use crate::config::IdentityConfig;
use crate::error::AuthError;

/// Validates third-party identity assertions: signature against the
/// provider's current keys, expiry, and that the audience is our registered
/// client id. Several keys may be configured to bridge provider key
/// rotation; each is tried in order.
#[derive(Clone)]
pub struct IdentityVerifier {
    client_id: String,
    issuer: String,
    keys: Vec<(Algorithm, DecodingKey)>,
}

impl IdentityVerifier {
    pub fn new(config: &IdentityConfig) -> anyhow::Result<Self> {
        let algorithm: Algorithm = config.algorithm.parse()?;
        let key = if let Some(pem) = &config.public_key_pem {
            match algorithm {
                Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem.as_bytes())?,
                Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem.as_bytes())?,
                Algorithm::EdDSA => DecodingKey::from_ed_pem(pem.as_bytes())?,
                Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                    anyhow::bail!("PEM key material requires an asymmetric algorithm")
                }
            }
        } else if let Some(secret) = &config.shared_secret {
            DecodingKey::from_secret(secret.as_bytes())
        } else {
            anyhow::bail!("identity provider needs a public key or a shared secret");
        };
        Ok(Self {
            client_id: config.client_id.clone(),
            issuer: config.issuer.clone(),
            keys: vec![(algorithm, key)],
        })
    }

    /// Register an additional accepted key (e.g. the provider's previous
    /// key during rotation).
    pub fn with_key(mut self, algorithm: Algorithm, key: DecodingKey) -> Self {
        self.keys.push((algorithm, key));
        self
    }

    /// Validate a raw identity token and extract its claims. Any failure
    /// (malformed token, wrong audience or issuer, bad signature, expiry)
    /// is `InvalidIdentityToken`.
    pub fn verify(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        for (algorithm, key) in &self.keys {
            let mut validation = Validation::new(*algorithm);
            validation.set_audience(std::slice::from_ref(&self.client_id));
            validation.set_issuer(std::slice::from_ref(&self.issuer));
            match decode::<IdentityClaims>(token, key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(error) => debug!(%error, "identity token rejected by key"),
            }
        }
        Err(AuthError::InvalidIdentityToken)
    }
}
