use cardwallet_core::{Card, CardError, CardId, CardUpdate, NewCard};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Card(#[from] CardError),
}

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cards (
            id TEXT PRIMARY KEY,
            store_name TEXT NOT NULL,
            member_number TEXT NOT NULL,
            barcode TEXT,
            qr_code TEXT,
            phone_number TEXT,
            url TEXT,
            front_image TEXT NOT NULL,
            back_image TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cards_created_at ON cards(created_at)")
        .execute(pool)
        .await?;

    Ok(())
}

type CardRow = (
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

const CARD_COLUMNS: &str = "id, store_name, member_number, barcode, qr_code, phone_number, url, \
                            front_image, back_image, created_at, updated_at";

fn row_to_card(r: CardRow) -> Card {
    Card {
        id: CardId(r.0),
        store_name: r.1,
        member_number: r.2,
        barcode: r.3,
        qr_code: r.4,
        phone_number: r.5,
        url: r.6,
        front_image: r.7,
        back_image: r.8,
        created_at: r.9,
        updated_at: r.10,
    }
}

pub async fn create_card(pool: &DbPool, card: &NewCard) -> Result<Card, StorageError> {
    card.validate()?;

    let now = Utc::now();
    let stored = Card {
        id: CardId::generate(),
        store_name: card.store_name.clone(),
        member_number: card.member_number.clone(),
        barcode: card.barcode.clone(),
        qr_code: card.qr_code.clone(),
        phone_number: card.phone_number.clone(),
        url: card.url.clone(),
        front_image: card.front_image.clone(),
        back_image: card.back_image.clone(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(&format!(
        "INSERT INTO cards ({CARD_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&stored.id.0)
    .bind(&stored.store_name)
    .bind(&stored.member_number)
    .bind(&stored.barcode)
    .bind(&stored.qr_code)
    .bind(&stored.phone_number)
    .bind(&stored.url)
    .bind(&stored.front_image)
    .bind(&stored.back_image)
    .bind(stored.created_at)
    .bind(stored.updated_at)
    .execute(pool)
    .await?;

    Ok(stored)
}

/// All cards, newest first.
pub async fn get_all_cards(pool: &DbPool) -> Result<Vec<Card>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CardRow>(&format!(
        "SELECT {CARD_COLUMNS} FROM cards ORDER BY created_at DESC, rowid DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_card).collect())
}

pub async fn get_card_by_id(pool: &DbPool, id: &CardId) -> Result<Option<Card>, sqlx::Error> {
    let row = sqlx::query_as::<_, CardRow>(&format!(
        "SELECT {CARD_COLUMNS} FROM cards WHERE id = ?"
    ))
    .bind(&id.0)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_card))
}

pub async fn update_card(
    pool: &DbPool,
    id: &CardId,
    update: &CardUpdate,
) -> Result<Card, StorageError> {
    let mut card = get_card_by_id(pool, id)
        .await?
        .ok_or_else(|| CardError::NotFound(id.clone()))?;

    update.apply(&mut card, Utc::now());

    sqlx::query(
        "UPDATE cards SET store_name = ?, member_number = ?, barcode = ?, qr_code = ?, \
         phone_number = ?, url = ?, front_image = ?, back_image = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&card.store_name)
    .bind(&card.member_number)
    .bind(&card.barcode)
    .bind(&card.qr_code)
    .bind(&card.phone_number)
    .bind(&card.url)
    .bind(&card.front_image)
    .bind(&card.back_image)
    .bind(card.updated_at)
    .bind(&card.id.0)
    .execute(pool)
    .await?;

    Ok(card)
}

/// Returns `false` when no card had that id.
pub async fn delete_card(pool: &DbPool, id: &CardId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cards WHERE id = ?")
        .bind(&id.0)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
