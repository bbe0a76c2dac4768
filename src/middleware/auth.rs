//! Credential verification for protected routes and the `Identity` extractor
//!
//! The credential is read from the session cookie first, then from an
//! `Authorization: Bearer` header. Every rejection carries an
//! [`AuthFailure`] reason for the error log; clients get one generic message.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, AuthFailure, Result};
use crate::jwt::JwtManager;
use crate::pipeline::{RequestContext, Stage, Zone};
use crate::repository::UserRepository;

/// Authenticated principal bound to a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User ID from the credential's `sub` claim
    pub user_id: Uuid,
}

/// Pull the raw credential out of the cookie jar or the Authorization header
fn extract_credential<'a>(ctx: &'a RequestContext, cookie_name: &str) -> std::result::Result<&'a str, AuthFailure> {
    if let Some(token) = ctx.cookies.get(cookie_name).filter(|t| !t.is_empty()) {
        return Ok(token);
    }

    let header = ctx
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthFailure::MissingCredential)?
        .to_str()
        .map_err(|_| AuthFailure::MalformedHeader)?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or(AuthFailure::MalformedHeader)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthFailure::MalformedHeader);
    }
    Ok(token)
}

/// Pipeline stage guarding every protected route
pub struct Authenticate<R: UserRepository> {
    jwt: JwtManager,
    users: Arc<R>,
}

fn reject(reason: AuthFailure) -> ApiError {
    counter!("mesto_auth_failures_total", "reason" => reason.as_str()).increment(1);
    ApiError::AuthenticationFailed(reason)
}

impl<R: UserRepository> Authenticate<R> {
    pub fn new(jwt: JwtManager, users: Arc<R>) -> Self {
        Self { jwt, users }
    }

    async fn resolve(&self, token: &str) -> Result<Identity> {
        let claims = self.jwt.verify_token(token).map_err(reject)?;
        let user_id = claims.user_id().map_err(reject)?;

        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(reject(AuthFailure::UnknownIdentity));
        }
        Ok(Identity { user_id })
    }
}

#[async_trait::async_trait]
impl<R: UserRepository + 'static> Stage for Authenticate<R> {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<()> {
        if ctx.zone == Zone::Public {
            return Ok(());
        }
        // Owned, so no borrow of the context lives across the lookup
        let token = extract_credential(ctx, self.jwt.cookie_name())
            .map_err(reject)?
            .to_owned();
        let identity = self.resolve(&token).await?;
        tracing::debug!(user_id = %identity.user_id, "Request authenticated");
        ctx.identity = Some(identity);
        Ok(())
    }
}

/// Extractor for handlers behind the authentication gate.
///
/// The pipeline binds the identity before any protected handler runs, so a
/// missing identity means the handler was mounted on a public route.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(ApiError::AuthenticationFailed(AuthFailure::MissingCredential))
    }
}
