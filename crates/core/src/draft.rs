use serde::{Deserialize, Serialize};

use crate::card::NewCard;

/// Editable card form state. An empty string means the user has not filled the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDraft {
    pub store_name: String,
    pub member_number: String,
    pub barcode: String,
    pub qr_code: String,
    pub phone_number: String,
    pub url: String,
}

/// Field values proposed by automatic extraction. `None` means "nothing found".
#[derive(Debug, Clone, Copy, Default)]
pub struct DraftSuggestion<'a> {
    pub store_name: Option<&'a str>,
    pub member_number: Option<&'a str>,
    pub barcode: Option<&'a str>,
    pub qr_code: Option<&'a str>,
    pub phone_number: Option<&'a str>,
    pub url: Option<&'a str>,
}

impl CardDraft {
    /// Pre-fill the form. Only present, non-empty suggestions replace the current value;
    /// an absent suggestion never clears what the user already typed.
    pub fn merge(&mut self, suggestion: DraftSuggestion<'_>) {
        fill(&mut self.store_name, suggestion.store_name);
        fill(&mut self.member_number, suggestion.member_number);
        fill(&mut self.barcode, suggestion.barcode);
        fill(&mut self.qr_code, suggestion.qr_code);
        fill(&mut self.phone_number, suggestion.phone_number);
        fill(&mut self.url, suggestion.url);
    }

    /// Turn the form into a card ready to be persisted.
    pub fn into_new_card(self, front_image: String, back_image: Option<String>) -> NewCard {
        NewCard {
            store_name: self.store_name,
            member_number: self.member_number,
            barcode: non_empty(self.barcode),
            qr_code: non_empty(self.qr_code),
            phone_number: non_empty(self.phone_number),
            url: non_empty(self.url),
            front_image,
            back_image,
        }
    }
}

fn fill(slot: &mut String, value: Option<&str>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        *slot = v.to_string();
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_user_values_when_suggestion_absent() {
        let mut draft = CardDraft {
            store_name: "My clinic".into(),
            phone_number: "090-1111-2222".into(),
            ..Default::default()
        };
        draft.merge(DraftSuggestion {
            member_number: Some("A-12345"),
            ..Default::default()
        });

        assert_eq!(draft.store_name, "My clinic");
        assert_eq!(draft.phone_number, "090-1111-2222");
        assert_eq!(draft.member_number, "A-12345");
    }

    #[test]
    fn merge_replaces_with_present_values() {
        let mut draft = CardDraft { store_name: "old".into(), ..Default::default() };
        draft.merge(DraftSuggestion { store_name: Some("新宿クリニック"), ..Default::default() });
        assert_eq!(draft.store_name, "新宿クリニック");
    }

    #[test]
    fn merge_ignores_empty_strings() {
        let mut draft = CardDraft { url: "https://a.jp".into(), ..Default::default() };
        draft.merge(DraftSuggestion { url: Some(""), ..Default::default() });
        assert_eq!(draft.url, "https://a.jp");
    }

    #[test]
    fn into_new_card_maps_empty_optionals_to_none() {
        let draft = CardDraft {
            store_name: "さくら歯科医院".into(),
            member_number: "123456".into(),
            barcode: "4901234567890".into(),
            ..Default::default()
        };
        let card = draft.into_new_card("front.jpg".into(), None);
        assert_eq!(card.barcode.as_deref(), Some("4901234567890"));
        assert_eq!(card.qr_code, None);
        assert_eq!(card.url, None);
        assert_eq!(card.front_image, "front.jpg");
    }
}
