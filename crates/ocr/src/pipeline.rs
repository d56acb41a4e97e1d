use std::path::{Path, PathBuf};
use std::sync::Arc;

use cardwallet_core::{CardDraft, NewCard};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::enhance::ImageEnhancer;
use crate::extract::FieldExtractor;
use crate::hash::{ImageStore, StoredImage};
use crate::recognizer::{LanguageHint, OcrBackend, OcrError};
use crate::types::{ExtractedFields, RecognizedText};

/// Shown to the user when the recognizer could not produce any text.
pub const MANUAL_ENTRY_NOTICE: &str =
    "Could not read text automatically. Please enter the details manually.";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of running OCR over one card image.
#[derive(Debug, Clone, Default)]
pub struct Recognition {
    /// `None` when the recognizer failed.
    pub text: Option<RecognizedText>,
    pub fields: ExtractedFields,
}

impl Recognition {
    pub fn failed(&self) -> bool {
        self.text.is_none()
    }
}

/// The result of scanning one card.
#[derive(Debug)]
pub struct ScanResult {
    pub front: StoredImage,
    pub back: Option<StoredImage>,
    pub recognition: Recognition,
}

impl ScanResult {
    pub fn extracted(&self) -> &ExtractedFields {
        &self.recognition.fields
    }

    pub fn user_notice(&self) -> Option<&'static str> {
        self.recognition.failed().then_some(MANUAL_ENTRY_NOTICE)
    }

    /// Merge the extracted fields into `draft` and attach the stored images.
    pub fn into_new_card(self, mut draft: CardDraft) -> NewCard {
        self.recognition.fields.apply_to(&mut draft);
        draft.into_new_card(
            self.front.path.display().to_string(),
            self.back.map(|b| b.path.display().to_string()),
        )
    }
}

/// Orchestrates: store images → enhance front → recognize → extract.
pub struct CardScanPipeline<R: OcrBackend> {
    recognizer: Arc<R>,
    enhancer: ImageEnhancer,
    images: ImageStore,
    hint: LanguageHint,
}

impl<R: OcrBackend + 'static> CardScanPipeline<R> {
    pub fn new(recognizer: R, images_dir: PathBuf) -> Self {
        Self {
            recognizer: Arc::new(recognizer),
            enhancer: ImageEnhancer::default(),
            images: ImageStore::new(images_dir),
            hint: LanguageHint::default(),
        }
    }

    pub fn with_enhancer(mut self, enhancer: ImageEnhancer) -> Self {
        self.enhancer = enhancer;
        self
    }

    pub fn with_hint(mut self, hint: LanguageHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    /// Enhance (best-effort) and run one scoped recognition.
    pub async fn read_text(&self, data: &[u8]) -> Result<RecognizedText, OcrError> {
        let enhanced = self.enhancer.enhance_or_original(data).await;
        let recognizer = Arc::clone(&self.recognizer);
        let hint = self.hint.clone();

        tokio::task::spawn_blocking(move || recognizer.recognize_once(&enhanced, &hint))
            .await
            .map_err(|e| OcrError::Engine(format!("recognition task aborted: {e}")))?
    }

    /// Image in, fields out. Recognizer failures become an empty field set.
    pub async fn process_card_image(&self, data: &[u8]) -> Recognition {
        match self.read_text(data).await {
            Ok(text) => {
                let fields = FieldExtractor::extract(text.as_str());
                Recognition { text: Some(text), fields }
            }
            Err(e) => {
                tracing::warn!("Card text recognition failed: {e}");
                Recognition::default()
            }
        }
    }

    /// Scan a card photo on disk.
    pub async fn scan_file(&self, path: &Path) -> Result<ScanResult, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        self.scan_bytes(&bytes, &extension_of(path), None).await
    }

    /// Store the front (and optional back) image, then read the front.
    pub async fn scan_bytes(
        &self,
        front: &[u8],
        front_ext: &str,
        back: Option<(&[u8], &str)>,
    ) -> Result<ScanResult, PipelineError> {
        let front_stored = self.images.store(front, front_ext).await?;
        let back_stored = match back {
            Some((data, ext)) => Some(self.images.store(data, ext).await?),
            None => None,
        };

        let recognition = self.process_card_image(front).await;
        tracing::info!(
            image = %front_stored.hash_hex,
            failed = recognition.failed(),
            "Card scanned"
        );

        Ok(ScanResult {
            front: front_stored,
            back: back_stored,
            recognition,
        })
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin")
        .to_lowercase()
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(image::ImageFormat::from_extension)
        .is_some()
}

// ── Watch-folder integration ──────────────────────────────────────────────────

/// Spawn a notify watcher on `watch_dir` that sends newly created image paths to `tx`.
/// The returned watcher must be kept alive for watching to continue.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{EventKind, RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        if let Ok(ev) = event {
            if matches!(ev.kind, EventKind::Create(_)) {
                for path in ev.paths.into_iter().filter(|p| is_image_path(p)) {
                    if tx.try_send(path).is_err() {
                        tracing::warn!("Intake queue full or closed, dropping event");
                    }
                }
            }
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
