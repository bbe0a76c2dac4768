//! Registration, sign-in and sign-out

use crate::api::{MessageResponse, Payload, SuccessResponse};
use crate::domain::{SigninInput, SignupInput};
use crate::error::Result;
use crate::middleware::Identity;
use crate::state::HasServices;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

/// Body of a successful sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// POST /signup
pub async fn signup<S: HasServices>(
    State(state): State<S>,
    Payload(input): Payload<SignupInput>,
) -> Result<impl IntoResponse> {
    let user = state.account_service().register(input).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(user))))
}

/// POST /signin
///
/// The token goes out twice: as the `HttpOnly` session cookie and in the body.
pub async fn signin<S: HasServices>(
    State(state): State<S>,
    Payload(input): Payload<SigninInput>,
) -> Result<impl IntoResponse> {
    let (_user, token) = state.account_service().login(input).await?;
    let cookie = state.jwt_manager().session_cookie(&token);
    Ok(([(header::SET_COOKIE, cookie)], Json(TokenResponse { token })))
}

/// POST /signout
pub async fn signout<S: HasServices>(
    State(state): State<S>,
    identity: Identity,
) -> impl IntoResponse {
    tracing::info!(user_id = %identity.user_id, "User signed out");
    (
        [(header::SET_COOKIE, state.jwt_manager().clear_cookie())],
        Json(MessageResponse::new("Signed out")),
    )
}
