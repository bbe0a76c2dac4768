//! Card business logic

use crate::domain::{Card, CreateCardInput};
use crate::error::{ApiError, Result};
use crate::repository::CardRepository;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub struct CardService<R: CardRepository> {
    repo: Arc<R>,
}

impl<R: CardRepository> CardService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<Card>> {
        self.repo.list().await
    }

    pub async fn create(&self, owner: Uuid, input: CreateCardInput) -> Result<Card> {
        input.validate()?;
        self.repo.create(owner, &input).await
    }

    /// Delete a card; only its owner may do so
    pub async fn delete(&self, requester: Uuid, id: Uuid) -> Result<Card> {
        let card = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Card not found".to_string()))?;

        if card.owner != requester {
            return Err(ApiError::Forbidden(
                "You can only delete your own cards".to_string(),
            ));
        }

        self.repo.delete(id).await?;
        info!(card_id = %id, "Card deleted");
        Ok(card)
    }

    pub async fn like(&self, user_id: Uuid, id: Uuid) -> Result<Card> {
        self.repo.add_like(id, user_id).await
    }

    pub async fn unlike(&self, user_id: Uuid, id: Uuid) -> Result<Card> {
        self.repo.remove_like(id, user_id).await
    }
}
