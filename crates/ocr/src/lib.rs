pub mod enhance;
pub mod extract;
pub mod hash;
pub mod pipeline;
pub mod recognizer;
pub mod types;

pub use enhance::{EnhanceError, ImageEnhancer};
pub use extract::FieldExtractor;
pub use hash::{sha256_bytes, to_hex, ImageStore, StoredImage};
pub use pipeline::{CardScanPipeline, PipelineError, Recognition, ScanResult, MANUAL_ENTRY_NOTICE};
pub use recognizer::{
    LanguageHint, MockRecognizer, OcrBackend, OcrError, RecognitionSession, UnavailableRecognizer,
};
pub use types::{ExtractedFields, RecognizedText};
