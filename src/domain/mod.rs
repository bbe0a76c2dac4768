//! Domain models for the Mesto API

pub mod card;
pub mod user;

pub use card::*;
pub use user::*;
