//! JWT credential handling

use crate::config::JwtConfig;
use crate::error::{ApiError, AuthFailure, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audience every session credential is issued for
pub const SESSION_AUDIENCE: &str = "mesto-session";

/// Session credential claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// The user this credential was issued to
    pub fn user_id(&self) -> std::result::Result<Uuid, AuthFailure> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthFailure::InvalidToken)
    }
}

/// JWT token manager
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Strict leeway (5 seconds) so credentials expire promptly while tolerating
    /// minor clock skew.
    fn strict_validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.leeway = 5;
        v.set_issuer(&[&self.config.issuer]);
        v.set_audience(&[SESSION_AUDIENCE]);
        v.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        v
    }

    /// Issue a session credential for a user
    pub fn create_token(&self, user_id: Uuid) -> Result<String> {
        self.create_token_at(user_id, Utc::now().timestamp())
    }

    fn create_token_at(&self, user_id: Uuid, issued_at: i64) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            iss: self.config.issuer.clone(),
            aud: SESSION_AUDIENCE.to_string(),
            iat: issued_at,
            exp: issued_at + Duration::seconds(self.config.ttl_secs).num_seconds(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ApiError::internal(format!("failed to sign credential: {e}")))
    }

    /// Verify signature and expiry of a session credential.
    ///
    /// Failures are classified so the authenticator can log the exact reason.
    pub fn verify_token(&self, token: &str) -> std::result::Result<Claims, AuthFailure> {
        decode::<Claims>(token, &self.decoding_key, &self.strict_validation())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => AuthFailure::Expired,
                JwtErrorKind::InvalidSignature => AuthFailure::InvalidSignature,
                _ => AuthFailure::InvalidToken,
            })
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    /// `Set-Cookie` value carrying a freshly issued credential
    pub fn session_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Strict",
            self.config.cookie_name, token, self.config.ttl_secs
        );
        if self.config.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value that clears the credential cookie
    pub fn clear_cookie(&self) -> String {
        let mut cookie = format!(
            "{}=; Max-Age=0; Path=/; HttpOnly; SameSite=Strict",
            self.config.cookie_name
        );
        if self.config.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
