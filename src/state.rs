//! Application state traits for dependency injection
//!
//! Handlers are generic over [`HasServices`], so the same routing code runs
//! against the production `AppState` and any test implementation.

use std::sync::Arc;

use crate::config::Config;
use crate::jwt::JwtManager;
use crate::repository::{CardRepository, UserRepository};
use crate::service::{AccountService, CardService};

/// Trait for application state that provides access to all services.
pub trait HasServices: Clone + Send + Sync + 'static {
    /// The user repository type
    type UserRepo: UserRepository + 'static;
    /// The card repository type
    type CardRepo: CardRepository + 'static;

    /// Get the application configuration
    fn config(&self) -> &Config;

    /// Get the account service (registration, login, profiles)
    fn account_service(&self) -> &AccountService<Self::UserRepo>;

    /// Get the card service
    fn card_service(&self) -> &CardService<Self::CardRepo>;

    /// Get the JWT manager
    fn jwt_manager(&self) -> &JwtManager;

    /// Shared handle on the user store, for the authentication stage
    fn user_repo(&self) -> Arc<Self::UserRepo>;
}
