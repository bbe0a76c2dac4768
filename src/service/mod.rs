//! Business logic layer

pub mod account;
pub mod card;

pub use account::AccountService;
pub use card::CardService;
