//! Card endpoints

use crate::api::{Payload, SuccessResponse};
use crate::domain::CreateCardInput;
use crate::error::Result;
use crate::middleware::Identity;
use crate::state::HasServices;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

/// GET /cards
pub async fn list<S: HasServices>(State(state): State<S>) -> Result<impl IntoResponse> {
    let cards = state.card_service().list().await?;
    Ok(Json(SuccessResponse::new(cards)))
}

/// POST /cards
pub async fn create<S: HasServices>(
    State(state): State<S>,
    identity: Identity,
    Payload(input): Payload<CreateCardInput>,
) -> Result<impl IntoResponse> {
    let card = state.card_service().create(identity.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(card))))
}

/// DELETE /cards/{id}; owner only
pub async fn delete<S: HasServices>(
    State(state): State<S>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let card = state.card_service().delete(identity.user_id, id).await?;
    Ok(Json(SuccessResponse::new(card)))
}

/// PUT /cards/{id}/likes
pub async fn like<S: HasServices>(
    State(state): State<S>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let card = state.card_service().like(identity.user_id, id).await?;
    Ok(Json(SuccessResponse::new(card)))
}

/// DELETE /cards/{id}/likes
pub async fn unlike<S: HasServices>(
    State(state): State<S>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let card = state.card_service().unlike(identity.user_id, id).await?;
    Ok(Json(SuccessResponse::new(card)))
}
