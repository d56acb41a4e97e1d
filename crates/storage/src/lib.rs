pub mod db;

pub use db::{
    create_card, create_db, delete_card, get_all_cards, get_card_by_id, update_card, DbPool,
    StorageError,
};
