pub mod card;
pub mod config;
pub mod draft;

pub use card::{Card, CardError, CardId, CardUpdate, NewCard};
pub use config::{ConfigError, EnhanceSettings, RecognizerSettings, WalletConfig};
pub use draft::{CardDraft, DraftSuggestion};
