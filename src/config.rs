use serde::Deserialize;

/// Signing configuration for the session tokens this service mints itself.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    /// HMAC algorithm name ("HS256", "HS384" or "HS512"). Fixed for the
    /// process lifetime.
    pub algorithm: String,
    /// Fallback token lifetime when no system-settings value applies.
    pub ttl_minutes: i64,
}

/// Verification configuration for externally-issued identity tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Our registered client id at the provider; tokens must carry it as
    /// their audience.
    pub client_id: String,
    pub issuer: String,
    pub algorithm: String,
    pub public_key_pem: Option<String>,
    pub shared_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub identity: IdentityConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            algorithm: std::env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(15),
        };
        let identity = IdentityConfig {
            client_id: std::env::var("IDENTITY_CLIENT_ID")
                .unwrap_or_else(|_| "unconfigured-client-id".into()),
            issuer: std::env::var("IDENTITY_ISSUER")
                .unwrap_or_else(|_| "https://accounts.google.com".into()),
            algorithm: std::env::var("IDENTITY_ALGORITHM").unwrap_or_else(|_| "RS256".into()),
            public_key_pem: std::env::var("IDENTITY_PUBLIC_KEY_PEM").ok(),
            shared_secret: std::env::var("IDENTITY_SHARED_SECRET").ok(),
        };
        Ok(Self {
            database_url,
            jwt,
            identity,
        })
    }
}
