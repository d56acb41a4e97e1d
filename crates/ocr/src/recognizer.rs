use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cardwallet_core::RecognizerSettings;
use thiserror::Error;

use crate::types::RecognizedText;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available, build with the `tesseract` feature")]
    NotAvailable,
}

/// Characters the recognizer may emit: digits, Latin letters, kana, and the
/// punctuation / bracket / postal symbols printed on Japanese cards.
pub const CARD_CHAR_ALLOWLIST: &str = concat!(
    "0123456789",
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz",
    "あいうえおかきくけこさしすせそたちつてとなにぬねのはひふへほまみむめもやゆよらりるれろわをん",
    "アイウエオカキクケコサシスセソタチツテトナニヌネノハヒフヘホマミムメモヤユヨラリルレロワヲン",
    "ー々〒（）()[]【】{}／・-−：:.,、。",
);

/// Tesseract page segmentation mode 6: a single uniform block of text.
pub const PAGE_SEG_SINGLE_BLOCK: &str = "6";

/// How the recognizer should be configured for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageHint {
    pub language: String,
    pub char_allowlist: String,
    pub page_seg_mode: String,
    pub preserve_interword_spaces: bool,
}

impl LanguageHint {
    /// Mixed Japanese + Latin card text.
    pub fn japanese_card() -> Self {
        Self::from_settings(&RecognizerSettings::default())
    }

    pub fn from_settings(settings: &RecognizerSettings) -> Self {
        Self {
            language: settings.language.clone(),
            char_allowlist: CARD_CHAR_ALLOWLIST.to_string(),
            page_seg_mode: PAGE_SEG_SINGLE_BLOCK.to_string(),
            preserve_interword_spaces: true,
        }
    }
}

impl Default for LanguageHint {
    fn default() -> Self {
        Self::japanese_card()
    }
}

/// One acquired recognizer instance. Dropping the session releases the engine.
pub trait RecognitionSession {
    fn recognize(&mut self, image_bytes: &[u8]) -> Result<RecognizedText, OcrError>;
}

/// Abstraction over an OCR backend.
///
/// A backend hands out a fresh session per recognition call; sessions are never
/// cached implicitly, so a pooling backend has to say so in its own type.
pub trait OcrBackend: Send + Sync {
    type Session: RecognitionSession;

    fn acquire(&self, hint: &LanguageHint) -> Result<Self::Session, OcrError>;

    /// Acquire a session, run one recognition and release the session on every path.
    fn recognize_once(
        &self,
        image_bytes: &[u8],
        hint: &LanguageHint,
    ) -> Result<RecognizedText, OcrError> {
        let mut session = self.acquire(hint)?;
        session.recognize(image_bytes)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set result, for exercising the extraction pipeline
/// without requiring Tesseract to be installed. Tracks live sessions so tests
/// can check that every session is released.
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    outcome: Result<String, String>,
    live_sessions: Arc<AtomicUsize>,
    acquired: Arc<AtomicUsize>,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_outcome(Ok(text.into()))
    }

    /// A recognizer whose every call fails with an engine error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_outcome(Err(message.into()))
    }

    fn with_outcome(outcome: Result<String, String>) -> Self {
        Self {
            outcome,
            live_sessions: Arc::new(AtomicUsize::new(0)),
            acquired: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn live_sessions(&self) -> usize {
        self.live_sessions.load(Ordering::SeqCst)
    }

    pub fn sessions_acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
}

pub struct MockSession {
    outcome: Result<String, String>,
    live_sessions: Arc<AtomicUsize>,
}

impl RecognitionSession for MockSession {
    fn recognize(&mut self, _image_bytes: &[u8]) -> Result<RecognizedText, OcrError> {
        self.outcome
            .clone()
            .map(RecognizedText::from)
            .map_err(OcrError::Engine)
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.live_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

impl OcrBackend for MockRecognizer {
    type Session = MockSession;

    fn acquire(&self, _hint: &LanguageHint) -> Result<MockSession, OcrError> {
        self.live_sessions.fetch_add(1, Ordering::SeqCst);
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            outcome: self.outcome.clone(),
            live_sessions: Arc::clone(&self.live_sessions),
        })
    }
}

// ── Unavailable backend (builds without an OCR engine) ───────────────────────

/// Stands in when no engine was compiled in: every acquisition fails with
/// [`OcrError::NotAvailable`], so scans fall back to manual entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRecognizer;

/// Uninhabited; an [`UnavailableRecognizer`] never hands out a session.
pub enum NoSession {}

impl RecognitionSession for NoSession {
    fn recognize(&mut self, _image_bytes: &[u8]) -> Result<RecognizedText, OcrError> {
        match *self {}
    }
}

impl OcrBackend for UnavailableRecognizer {
    type Session = NoSession;

    fn acquire(&self, _hint: &LanguageHint) -> Result<NoSession, OcrError> {
        Err(OcrError::NotAvailable)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{LanguageHint, OcrBackend, OcrError, RecognitionSession};
    use crate::types::RecognizedText;
    use leptess::{LepTess, Variable};

    pub struct TesseractRecognizer {
        data_path: Option<String>,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>) -> Self {
            Self { data_path }
        }
    }

    /// Owns one Tesseract engine; the engine is torn down when the session drops.
    pub struct TesseractSession {
        engine: LepTess,
    }

    impl RecognitionSession for TesseractSession {
        fn recognize(&mut self, image_bytes: &[u8]) -> Result<RecognizedText, OcrError> {
            self.engine
                .set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            self.engine
                .get_utf8_text()
                .map(RecognizedText::from)
                .map_err(|e| OcrError::Engine(e.to_string()))
        }
    }

    impl OcrBackend for TesseractRecognizer {
        type Session = TesseractSession;

        fn acquire(&self, hint: &LanguageHint) -> Result<TesseractSession, OcrError> {
            let mut engine = LepTess::new(self.data_path.as_deref(), &hint.language)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            let interword = if hint.preserve_interword_spaces { "1" } else { "0" };
            for (var, value) in [
                (Variable::TesseditCharWhitelist, hint.char_allowlist.as_str()),
                (Variable::TesseditPagesegMode, hint.page_seg_mode.as_str()),
                (Variable::PreserveInterwordSpaces, interword),
            ] {
                engine
                    .set_variable(var, value)
                    .map_err(|e| OcrError::Engine(e.to_string()))?;
            }
            Ok(TesseractSession { engine })
        }
    }
}
