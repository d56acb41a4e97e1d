use std::path::PathBuf;

use anyhow::Context;
use cardwallet_core::WalletConfig;
use cardwallet_ocr::{CardScanPipeline, ImageEnhancer, LanguageHint};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod intake;

#[cfg(not(feature = "tesseract"))]
fn build_recognizer(_config: &WalletConfig) -> cardwallet_ocr::UnavailableRecognizer {
    tracing::warn!("Built without the `tesseract` feature; card text will not be recognized");
    cardwallet_ocr::UnavailableRecognizer
}

#[cfg(feature = "tesseract")]
fn build_recognizer(
    config: &WalletConfig,
) -> cardwallet_ocr::recognizer::tesseract_backend::TesseractRecognizer {
    cardwallet_ocr::recognizer::tesseract_backend::TesseractRecognizer::new(
        config.recognizer.tessdata_path.clone(),
    )
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("com", "cardwallet", "CardWallet")
        .context("Failed to get app directory")?;
    Ok(project_dirs.data_dir().to_path_buf())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let default_dir = default_data_dir()?;
    let config = WalletConfig::load_or_default(&default_dir.join("config.toml"))?;
    let data_dir = config.data_dir.clone().unwrap_or(default_dir);

    let images_dir = data_dir.join("images");
    let intake_dir = data_dir.join("intake");
    std::fs::create_dir_all(&images_dir).context("Failed to create images directory")?;
    std::fs::create_dir_all(&intake_dir).context("Failed to create intake directory")?;

    let db = cardwallet_storage::create_db(&data_dir.join("wallet.db"))
        .await
        .context("Failed to create database")?;
    let stored = cardwallet_storage::get_all_cards(&db).await?.len();
    tracing::info!("Wallet opened at {} ({stored} cards)", data_dir.display());

    let pipeline = CardScanPipeline::new(build_recognizer(&config), images_dir)
        .with_enhancer(ImageEnhancer::new(config.enhance))
        .with_hint(LanguageHint::from_settings(&config.recognizer));

    // Bridges the notify watcher thread and the async processor.
    let (intake_tx, intake_rx) = mpsc::channel::<PathBuf>(64);
    let worker = tokio::spawn(intake::run_intake(pipeline, db, intake_rx));

    let watcher = cardwallet_ocr::pipeline::spawn_intake_watcher(&intake_dir, intake_tx)
        .context("Failed to start intake folder watcher")?;
    tracing::info!("Watching intake folder: {}", intake_dir.display());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    // Dropping the watcher closes the queue; let in-flight cards finish.
    drop(watcher);
    worker.await?;
    Ok(())
}
