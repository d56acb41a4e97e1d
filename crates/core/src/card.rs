use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardId(pub String);

impl CardId {
    pub fn generate() -> Self {
        CardId(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored membership / medical card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub store_name: String,
    pub member_number: String,
    pub barcode: Option<String>,
    pub qr_code: Option<String>,
    pub phone_number: Option<String>,
    pub url: Option<String>,
    /// Reference to the stored front image (path into the image store).
    pub front_image: String,
    pub back_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A card that has not been persisted yet: no id, no timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCard {
    pub store_name: String,
    pub member_number: String,
    pub barcode: Option<String>,
    pub qr_code: Option<String>,
    pub phone_number: Option<String>,
    pub url: Option<String>,
    pub front_image: String,
    pub back_image: Option<String>,
}

impl NewCard {
    pub fn validate(&self) -> Result<(), CardError> {
        if self.front_image.trim().is_empty() {
            return Err(CardError::MissingFrontImage);
        }
        Ok(())
    }
}

/// Partial update. `None` leaves the stored value as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardUpdate {
    pub store_name: Option<String>,
    pub member_number: Option<String>,
    pub barcode: Option<String>,
    pub qr_code: Option<String>,
    pub phone_number: Option<String>,
    pub url: Option<String>,
    pub front_image: Option<String>,
    pub back_image: Option<String>,
}

impl CardUpdate {
    pub fn is_empty(&self) -> bool {
        *self == CardUpdate::default()
    }

    /// Apply the patch to `card`, bumping `updated_at` when anything changed.
    pub fn apply(&self, card: &mut Card, now: DateTime<Utc>) {
        if self.is_empty() {
            return;
        }
        if let Some(v) = &self.store_name {
            card.store_name = v.clone();
        }
        if let Some(v) = &self.member_number {
            card.member_number = v.clone();
        }
        if let Some(v) = &self.barcode {
            card.barcode = Some(v.clone());
        }
        if let Some(v) = &self.qr_code {
            card.qr_code = Some(v.clone());
        }
        if let Some(v) = &self.phone_number {
            card.phone_number = Some(v.clone());
        }
        if let Some(v) = &self.url {
            card.url = Some(v.clone());
        }
        if let Some(v) = &self.front_image {
            card.front_image = v.clone();
        }
        if let Some(v) = &self.back_image {
            card.back_image = Some(v.clone());
        }
        card.updated_at = now;
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CardError {
    #[error("Card has no front image")]
    MissingFrontImage,
    #[error("Card not found: {0}")]
    NotFound(CardId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stored_card() -> Card {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Card {
            id: CardId("abc".into()),
            store_name: "さくら歯科医院".into(),
            member_number: "123456".into(),
            barcode: None,
            qr_code: None,
            phone_number: Some("03-1234-5678".into()),
            url: None,
            front_image: "images/ab/front.jpg".into(),
            back_image: None,
            created_at: t,
            updated_at: t,
        }
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(CardId::generate(), CardId::generate());
    }

    #[test]
    fn new_card_requires_front_image() {
        let card = NewCard { store_name: "A".into(), ..Default::default() };
        assert_eq!(card.validate(), Err(CardError::MissingFrontImage));

        let card = NewCard { front_image: "f.jpg".into(), ..card };
        assert!(card.validate().is_ok());
    }

    #[test]
    fn update_applies_only_present_fields() {
        let mut card = stored_card();
        let later = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let patch = CardUpdate {
            url: Some("https://sakura-dental.jp".into()),
            ..Default::default()
        };
        patch.apply(&mut card, later);

        assert_eq!(card.url.as_deref(), Some("https://sakura-dental.jp"));
        assert_eq!(card.phone_number.as_deref(), Some("03-1234-5678"));
        assert_eq!(card.store_name, "さくら歯科医院");
        assert_eq!(card.updated_at, later);
    }

    #[test]
    fn empty_update_keeps_timestamp() {
        let mut card = stored_card();
        let before = card.updated_at;
        CardUpdate::default().apply(&mut card, Utc::now());
        assert_eq!(card.updated_at, before);
    }
}
