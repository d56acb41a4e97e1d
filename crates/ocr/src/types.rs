use cardwallet_core::{CardDraft, DraftSuggestion};
use serde::{Deserialize, Serialize};

/// Card fields inferred from recognized text. `None` means no confident match was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        *self == ExtractedFields::default()
    }

    pub fn as_suggestion(&self) -> DraftSuggestion<'_> {
        DraftSuggestion {
            store_name: self.store_name.as_deref(),
            member_number: self.member_number.as_deref(),
            barcode: self.barcode.as_deref(),
            qr_code: self.qr_code.as_deref(),
            phone_number: self.phone_number.as_deref(),
            url: self.url.as_deref(),
        }
    }

    /// Merge into form state without touching fields that were not extracted.
    pub fn apply_to(&self, draft: &mut CardDraft) {
        draft.merge(self.as_suggestion());
    }
}

/// Text returned by a recognizer: a block of lines, nothing more.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedText(String);

impl RecognizedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.0.lines()
    }
}

impl From<String> for RecognizedText {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty() {
        assert!(ExtractedFields::default().is_empty());
        let f = ExtractedFields { url: Some("https://a.jp".into()), ..Default::default() };
        assert!(!f.is_empty());
    }

    #[test]
    fn serializes_without_absent_fields() {
        let f = ExtractedFields {
            store_name: Some("さくら歯科医院".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, r#"{"store_name":"さくら歯科医院"}"#);
    }

    #[test]
    fn apply_to_leaves_unextracted_fields_alone() {
        let mut draft = CardDraft {
            store_name: "typed by user".into(),
            barcode: "12345678".into(),
            ..Default::default()
        };
        let f = ExtractedFields {
            phone_number: Some("03-1234-5678".into()),
            ..Default::default()
        };
        f.apply_to(&mut draft);
        assert_eq!(draft.store_name, "typed by user");
        assert_eq!(draft.barcode, "12345678");
        assert_eq!(draft.phone_number, "03-1234-5678");
    }

    #[test]
    fn recognized_text_lines() {
        let t = RecognizedText::new("A\nB\r\nC");
        assert_eq!(t.lines().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }
}
