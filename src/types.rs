use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("fetch: {0}")]
    Fetch(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A page as the browser left it after navigation settled.
#[derive(Debug, Clone, Default)]
pub struct LoadedPage {
    pub url: String,
    pub title: String,
    pub html: String,
    pub text: String,
}

/// One data row of the worksheet. `number` is the 1-based sheet row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub number: usize,
    pub link: String,
    pub marker: String,
}

impl SheetRow {
    pub fn is_processed(&self) -> bool {
        !self.marker.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Scraped(String),
    Failed(String),
}

impl RowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RowOutcome::Scraped(_))
    }

    pub fn text(&self) -> &str {
        match self {
            RowOutcome::Scraped(t) | RowOutcome::Failed(t) => t,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub eligible: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}
