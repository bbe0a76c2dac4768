//! User repository

use crate::domain::{normalize_email, NewUser, UpdateProfileInput, User};
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new user; a taken email is a `Conflict`
    async fn create(&self, input: &NewUser) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list(&self) -> Result<Vec<User>>;
    async fn update_profile(&self, id: Uuid, input: &UpdateProfileInput) -> Result<User>;
    async fn update_avatar(&self, id: Uuid, avatar: &str) -> Result<User>;
}

/// Thread-safe in-memory user store
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: DashMap<Uuid, User>,
    /// normalized email -> user id
    emails: DashMap<String, Uuid>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn modify(&self, id: Uuid, apply: impl FnOnce(&mut User)) -> Result<User> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
        apply(user.value_mut());
        Ok(user.clone())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, input: &NewUser) -> Result<User> {
        let email = normalize_email(&input.email);
        let id = Uuid::new_v4();

        // The email entry is the uniqueness lock for concurrent signups.
        match self.emails.entry(email.clone()) {
            Entry::Occupied(_) => {
                return Err(ApiError::Conflict(
                    "A user with this email already exists".to_string(),
                ))
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let user = User {
            id,
            email,
            name: input.name.clone(),
            about: input.about.clone(),
            avatar: input.avatar.clone(),
            password_hash: input.password_hash.clone(),
            created_at: Utc::now(),
        };
        self.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let id = match self.emails.get(&normalize_email(email)) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.find_by_id(id).await
    }

    async fn list(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.clone()).collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn update_profile(&self, id: Uuid, input: &UpdateProfileInput) -> Result<User> {
        self.modify(id, |user| {
            user.name = input.name.clone();
            user.about = input.about.clone();
        })
    }

    async fn update_avatar(&self, id: Uuid, avatar: &str) -> Result<User> {
        self.modify(id, |user| user.avatar = avatar.to_string())
    }
}
