//! Card domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Card entity
#[derive(Debug, Clone, Serialize)]
pub struct Card {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub link: String,
    pub owner: Uuid,
    /// Users who liked the card; each user at most once
    pub likes: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Input for `POST /cards`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateCardInput {
    #[validate(length(min = 2, max = 30))]
    pub name: String,
    #[validate(url)]
    pub link: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_card_input_validation() {
        let input = CreateCardInput {
            name: "Baikal".to_string(),
            link: "not a url".to_string(),
        };
        assert!(input.validate().is_err());

        let valid = CreateCardInput {
            name: "Baikal".to_string(),
            link: "https://example.com/baikal.jpg".to_string(),
        };
        assert!(valid.validate().is_ok());
    }
}
