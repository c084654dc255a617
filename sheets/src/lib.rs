pub mod auth;
pub mod errors;
pub mod sheets;
pub mod types;

pub use auth::Authenticator;
pub use errors::SheetsError;
pub use sheets::{a1_cell, append_range, column_letter, SheetsOptions, SheetsOptionsBuilder, Spreadsheets, Worksheet};
