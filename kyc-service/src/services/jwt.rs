use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{JwtConfig, MIN_JWT_SECRET_BYTES};
use crate::models::{AuthenticatedIdentity, Identity, Role};
use crate::services::error::ServiceError;

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (identity ID)
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// A freshly signed token and the instant it stops being accepted.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        Self::with_ttl(&config.secret, Duration::hours(config.expiry_hours))
    }

    /// Builds a service with an explicit lifetime. A negative lifetime yields already-expired tokens.
    pub fn with_ttl(secret: &SecretString, ttl: Duration) -> Result<Self, anyhow::Error> {
        let secret = secret.expose_secret().as_bytes();
        if secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(anyhow::anyhow!(
                "Signing secret must be at least {} bytes",
                MIN_JWT_SECRET_BYTES
            ));
        }

        tracing::info!(ttl_seconds = ttl.num_seconds(), "Token service initialized with HS256");

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        })
    }

    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken, ServiceError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;

        let claims = SessionClaims {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            role: identity.role,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode session token: {}", e))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Any failure (bad signature, malformed, expired, unknown role) is `Unauthenticated`.
    pub fn verify(&self, token: &str) -> Result<AuthenticatedIdentity, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Session token rejected");
                ServiceError::Unauthenticated
            })?;

        let claims = token_data.claims;
        let id = Uuid::parse_str(&claims.sub).map_err(|_| ServiceError::Unauthenticated)?;

        Ok(AuthenticatedIdentity {
            id,
            email: claims.email,
            role: claims.role,
        })
    }
}
