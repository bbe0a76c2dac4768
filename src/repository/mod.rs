//! Repository layer: storage contracts and their in-memory implementations

pub mod card;
pub mod user;

pub use card::{CardRepository, InMemoryCardRepository};
pub use user::{InMemoryUserRepository, UserRepository};
