//! User profile endpoints

use crate::api::{Payload, SuccessResponse};
use crate::domain::{UpdateAvatarInput, UpdateProfileInput};
use crate::error::Result;
use crate::middleware::Identity;
use crate::state::HasServices;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

/// GET /users
pub async fn list<S: HasServices>(State(state): State<S>) -> Result<impl IntoResponse> {
    let users = state.account_service().list().await?;
    Ok(Json(SuccessResponse::new(users)))
}

/// GET /users/me
pub async fn me<S: HasServices>(
    State(state): State<S>,
    identity: Identity,
) -> Result<impl IntoResponse> {
    let user = state.account_service().get(identity.user_id).await?;
    Ok(Json(SuccessResponse::new(user)))
}

/// GET /users/{id}
pub async fn get<S: HasServices>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let user = state.account_service().get(id).await?;
    Ok(Json(SuccessResponse::new(user)))
}

/// PATCH /users/me
pub async fn update_me<S: HasServices>(
    State(state): State<S>,
    identity: Identity,
    Payload(input): Payload<UpdateProfileInput>,
) -> Result<impl IntoResponse> {
    let user = state
        .account_service()
        .update_profile(identity.user_id, input)
        .await?;
    Ok(Json(SuccessResponse::new(user)))
}

/// PATCH /users/me/avatar
pub async fn update_avatar<S: HasServices>(
    State(state): State<S>,
    identity: Identity,
    Payload(input): Payload<UpdateAvatarInput>,
) -> Result<impl IntoResponse> {
    let user = state
        .account_service()
        .update_avatar(identity.user_id, input)
        .await?;
    Ok(Json(SuccessResponse::new(user)))
}
