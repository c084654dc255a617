use std::path::PathBuf;

pub const LISTINGS_FILE: &str = "listings.json";
pub const MAX_LISTINGS: usize = 20;
pub const LISTING_SELECTOR: &str = "a.posting-title";
pub const EXPECTED_DOMAIN: &str = "craigslist.org";
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// 1-based sheet columns
pub const LINK_COLUMN: usize = 11; // K, "Outreach Link"
pub const RESULT_COLUMN: usize = 13; // M
pub const PROCESSED_COLUMN: usize = 14; // N
pub const RESULT_HEADER: &str = "Scraped Data";
pub const PROCESSED_HEADER: &str = "Processed";
pub const FIRST_DATA_ROW: usize = 2;

pub const SUCCESS_MARKER: &str = "✓";
pub const FAILURE_MARKER: &str = "❌";
pub const ERROR_PREFIX: &str = "Error: ";
pub const MAX_ERROR_LEN: usize = 100;

pub const ROW_DELAY_SECS: u64 = 2;

lazy_static! {
    pub static ref GOOGLE_SHEET_ID: String = std::env::var("GOOGLE_SHEET_ID").unwrap_or_default();
    pub static ref CREDENTIALS_FILE: PathBuf = match std::env::var("GOOGLE_SHEETS_CREDS_FILE") {
        Ok(p) if !p.is_empty() => PathBuf::from(p),
        _ => PathBuf::from("credentials.json"),
    };
    pub static ref AGENTQL_API_KEY: Option<String> = match std::env::var("AGENTQL_API_KEY") {
        Ok(k) if !k.is_empty() => Some(k),
        _ => None,
    };
}

/// Cuts `s` to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub fn error_text(e: &impl std::fmt::Display) -> String {
    // alternate formatting keeps anyhow's context chain
    let msg = format!("{:#}", e);
    format!("{}{}", ERROR_PREFIX, truncate_chars(&msg, MAX_ERROR_LEN))
}

pub fn is_docker() -> bool {
    std::env::var("IN_DOCKER").is_ok()
}
