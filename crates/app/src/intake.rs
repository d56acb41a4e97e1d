use std::path::{Path, PathBuf};

use anyhow::Context;
use cardwallet_core::{Card, CardDraft};
use cardwallet_ocr::{CardScanPipeline, OcrBackend};
use cardwallet_storage::DbPool;
use tokio::sync::mpsc;

/// Scan one photo from the intake folder and save it as a new card.
pub async fn ingest_card<R: OcrBackend + 'static>(
    pipeline: &CardScanPipeline<R>,
    db: &DbPool,
    path: &Path,
) -> anyhow::Result<Card> {
    let scan = pipeline
        .scan_file(path)
        .await
        .with_context(|| format!("failed to scan {}", path.display()))?;

    if let Some(notice) = scan.user_notice() {
        tracing::warn!(path = %path.display(), "{notice}");
    }

    let card = cardwallet_storage::create_card(db, &scan.into_new_card(CardDraft::default()))
        .await
        .context("failed to save card")?;
    Ok(card)
}

/// Drain the intake queue until every sender is gone.
pub async fn run_intake<R: OcrBackend + 'static>(
    pipeline: CardScanPipeline<R>,
    db: DbPool,
    mut rx: mpsc::Receiver<PathBuf>,
) {
    while let Some(path) = rx.recv().await {
        tracing::info!("Processing card photo: {}", path.display());
        match ingest_card(&pipeline, &db, &path).await {
            Ok(card) => tracing::info!(id = %card.id, store = %card.store_name, "Card saved"),
            Err(e) => tracing::warn!("Card intake error: {e:#}"),
        }
    }
}
