use anyhow::Result;
use async_trait::async_trait;
use sheets::Worksheet;

use crate::{
    types::SheetRow,
    utils::{
        FIRST_DATA_ROW, LINK_COLUMN, PROCESSED_COLUMN, PROCESSED_HEADER, RESULT_COLUMN,
        RESULT_HEADER,
    },
};

/// The two spreadsheet calls the row processor needs. Rows and columns are 1-based.
#[async_trait(?Send)]
pub trait RowStore {
    async fn all_values(&self) -> Result<Vec<Vec<String>>>;
    async fn write_cell(&self, row: usize, col: usize, value: &str) -> Result<()>;
}

#[async_trait(?Send)]
impl RowStore for Worksheet {
    async fn all_values(&self) -> Result<Vec<Vec<String>>> {
        Ok(self.get_all_values().await?)
    }

    async fn write_cell(&self, row: usize, col: usize, value: &str) -> Result<()> {
        Ok(self.update_cell(row, col, value).await?)
    }
}

fn cell(row: &[String], col: usize) -> &str {
    row.get(col - 1).map(|c| c.trim()).unwrap_or("")
}

/// Turns the raw grid into data rows, skipping the header row.
pub fn rows_from_values(values: &[Vec<String>]) -> Vec<SheetRow> {
    values
        .iter()
        .enumerate()
        .skip(FIRST_DATA_ROW - 1)
        .map(|(idx, row)| SheetRow {
            number: idx + 1,
            link: cell(row, LINK_COLUMN).to_string(),
            marker: cell(row, PROCESSED_COLUMN).to_string(),
        })
        .collect()
}

/// Rows to attempt: at or after `start`, with a link and no processed marker,
/// capped at `max`. Rows before the first data row are never selected.
pub fn select_rows(rows: Vec<SheetRow>, start: Option<usize>, max: Option<usize>) -> Vec<SheetRow> {
    let start = start.unwrap_or(FIRST_DATA_ROW).max(FIRST_DATA_ROW);
    let eligible = rows
        .into_iter()
        .filter(|r| r.number >= start)
        .filter(|r| !r.link.is_empty() && !r.is_processed());
    match max {
        Some(max) => eligible.take(max).collect(),
        None => eligible.collect(),
    }
}

/// Writes the result and marker headers if the header row does not reach them.
pub async fn ensure_result_headers<S: RowStore + ?Sized>(store: &S, headers: &[String]) -> Result<()> {
    if headers.len() < RESULT_COLUMN {
        info!("adding header {} in column {}", RESULT_HEADER, RESULT_COLUMN);
        store.write_cell(1, RESULT_COLUMN, RESULT_HEADER).await?;
    }
    if headers.len() < PROCESSED_COLUMN {
        info!("adding header {} in column {}", PROCESSED_HEADER, PROCESSED_COLUMN);
        store
            .write_cell(1, PROCESSED_COLUMN, PROCESSED_HEADER)
            .await?;
    }
    Ok(())
}
