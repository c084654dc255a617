use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::time::sleep;

use crate::{
    browser_controller::PageLoader,
    extraction::PageExtractor,
    sheet::{rows_from_values, select_rows, RowStore},
    types::{RowOutcome, RunSummary, SheetRow},
    utils::{
        error_text, truncate_chars, FAILURE_MARKER, PROCESSED_COLUMN, RESULT_COLUMN,
        ROW_DELAY_SECS, SUCCESS_MARKER,
    },
};

pub struct Runner<S, L, E> {
    store: S,
    loader: L,
    extractor: E,
    options: RunnerOptions,
    should_terminate: Arc<AtomicBool>,
}

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct RunnerOptions {
    // first sheet row to consider, header rows are always skipped
    #[builder(default = "None")]
    start_row: Option<usize>,
    // maximum number of eligible rows to attempt
    #[builder(default = "None")]
    max_rows: Option<usize>,
    // pause between two rows
    #[builder(default = "self.default_delay()")]
    delay: Duration,
}

impl RunnerOptions {
    pub fn default_builder() -> RunnerOptionsBuilder {
        RunnerOptionsBuilder::default()
    }
}

impl RunnerOptionsBuilder {
    fn default_delay(&self) -> Duration {
        Duration::from_secs(ROW_DELAY_SECS)
    }
}

impl<S, L, E> Runner<S, L, E>
where
    S: RowStore,
    L: PageLoader,
    E: PageExtractor,
{
    pub fn new(store: S, loader: L, extractor: E, options: RunnerOptions) -> Self {
        Runner {
            store,
            loader,
            extractor,
            options,
            should_terminate: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Lets a signal handler stop the run between two rows.
    pub fn with_termination_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.should_terminate = flag;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rows that the current options would attempt, read fresh from the sheet.
    pub async fn pending_rows(&self) -> anyhow::Result<Vec<SheetRow>> {
        let values = self.store.all_values().await?;
        let rows = rows_from_values(&values);
        debug!("{} data rows in sheet", rows.len());
        Ok(select_rows(
            rows,
            self.options.start_row,
            self.options.max_rows,
        ))
    }

    pub async fn run(&self) -> anyhow::Result<RunSummary> {
        let rows = self.pending_rows().await?;
        let mut summary = RunSummary {
            eligible: rows.len(),
            ..Default::default()
        };

        if rows.is_empty() {
            info!("no unprocessed links found");
            return Ok(summary);
        }
        info!("processing {} links", rows.len());

        for (idx, row) in rows.iter().enumerate() {
            if idx > 0 && !self.options.delay.is_zero() {
                sleep(self.options.delay).await;
            }
            // a signal that lands during the pause skips the next row
            if self.should_terminate.load(Ordering::Relaxed) {
                warn!("termination requested, stopping before row {}", row.number);
                break;
            }

            info!(
                "processing {}/{} row {} {}",
                idx + 1,
                rows.len(),
                row.number,
                truncate_chars(&row.link, 60)
            );
            summary.attempted += 1;

            let outcome = self.process_row(row).await;
            match self.record_outcome(row, &outcome).await {
                Ok(_) if outcome.is_success() => {
                    summary.succeeded += 1;
                    info!("row {} completed successfully", row.number);
                }
                Ok(_) => {
                    summary.failed += 1;
                    warn!("row {} failed: {}", row.number, outcome.text());
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("could not update row {}: {}", row.number, e);
                }
            }
        }

        info!(
            "scraping complete: {} succeeded, {} failed, {} total",
            summary.succeeded,
            summary.failed,
            summary.total()
        );
        Ok(summary)
    }

    /// Visits the row's link and extracts from it. Never fails: errors become
    /// a [`RowOutcome::Failed`] carrying the error text.
    pub async fn process_row(&self, row: &SheetRow) -> RowOutcome {
        let page = match self.loader.load(&row.link).await {
            Ok(p) => p,
            Err(e) => {
                warn!("could not load {}: {:#}", row.link, e);
                return RowOutcome::Failed(error_text(&e));
            }
        };
        debug!("loaded {} ({})", page.url, page.title);

        match self.extractor.extract(&page).await {
            Ok(text) => {
                debug!("scraped: {}", truncate_chars(&text, 60));
                RowOutcome::Scraped(text)
            }
            Err(e) => {
                warn!("extraction failed for {}: {:#}", row.link, e);
                RowOutcome::Failed(error_text(&e))
            }
        }
    }

    pub async fn record_outcome(&self, row: &SheetRow, outcome: &RowOutcome) -> anyhow::Result<()> {
        let marker = if outcome.is_success() {
            SUCCESS_MARKER
        } else {
            FAILURE_MARKER
        };
        self.store
            .write_cell(row.number, RESULT_COLUMN, outcome.text())
            .await?;
        self.store
            .write_cell(row.number, PROCESSED_COLUMN, marker)
            .await?;
        debug!("updated row {}", row.number);
        Ok(())
    }
}
