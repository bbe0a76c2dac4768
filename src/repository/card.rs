//! Card repository

use crate::domain::{Card, CreateCardInput};
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CardRepository: Send + Sync {
    async fn create(&self, owner: Uuid, input: &CreateCardInput) -> Result<Card>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Card>>;
    async fn list(&self) -> Result<Vec<Card>>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    /// Add a like; liking twice is a no-op
    async fn add_like(&self, id: Uuid, user_id: Uuid) -> Result<Card>;
    async fn remove_like(&self, id: Uuid, user_id: Uuid) -> Result<Card>;
}

/// Thread-safe in-memory card store
#[derive(Default)]
pub struct InMemoryCardRepository {
    cards: DashMap<Uuid, Card>,
}

impl InMemoryCardRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn modify(&self, id: Uuid, apply: impl FnOnce(&mut Card)) -> Result<Card> {
        let mut card = self.cards.get_mut(&id).ok_or_else(card_not_found)?;
        apply(card.value_mut());
        Ok(card.clone())
    }
}

fn card_not_found() -> ApiError {
    ApiError::NotFound("Card not found".to_string())
}

#[async_trait]
impl CardRepository for InMemoryCardRepository {
    async fn create(&self, owner: Uuid, input: &CreateCardInput) -> Result<Card> {
        let card = Card {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            link: input.link.clone(),
            owner,
            likes: Vec::new(),
            created_at: Utc::now(),
        };
        self.cards.insert(card.id, card.clone());
        Ok(card)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Card>> {
        Ok(self.cards.get(&id).map(|c| c.clone()))
    }

    async fn list(&self) -> Result<Vec<Card>> {
        let mut cards: Vec<Card> = self.cards.iter().map(|c| c.clone()).collect();
        cards.sort_by_key(|c| c.created_at);
        Ok(cards)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.cards.remove(&id).map(|_| ()).ok_or_else(card_not_found)
    }

    async fn add_like(&self, id: Uuid, user_id: Uuid) -> Result<Card> {
        self.modify(id, |card| {
            if !card.likes.contains(&user_id) {
                card.likes.push(user_id);
            }
        })
    }

    async fn remove_like(&self, id: Uuid, user_id: Uuid) -> Result<Card> {
        self.modify(id, |card| card.likes.retain(|liker| *liker != user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CreateCardInput {
        CreateCardInput {
            name: "Baikal".to_string(),
            link: "https://example.com/baikal.jpg".to_string(),
        }
    }

    #[tokio::test]
    async fn test_likes_are_a_set() {
        let repo = InMemoryCardRepository::new();
        let owner = Uuid::new_v4();
        let fan = Uuid::new_v4();
        let card = repo.create(owner, &input()).await.unwrap();

        repo.add_like(card.id, fan).await.unwrap();
        let card = repo.add_like(card.id, fan).await.unwrap();
        assert_eq!(card.likes, vec![fan]);

        let card = repo.remove_like(card.id, fan).await.unwrap();
        assert!(card.likes.is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = InMemoryCardRepository::new();
        let card = repo.create(Uuid::new_v4(), &input()).await.unwrap();

        repo.delete(card.id).await.unwrap();
        assert!(repo.find_by_id(card.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(card.id).await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }
}
