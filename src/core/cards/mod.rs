// Record cards - good/bad behaviour slips and complaints posted to a shared
// log channel.

pub mod card_models;
pub mod card_service;

pub use card_models::{CardKind, CardRecord};
pub use card_service::{is_mentee, CardError, CardService};
