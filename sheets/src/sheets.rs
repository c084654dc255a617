use derive_builder::Builder;
use log::debug;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::{str::FromStr, sync::Arc};

use crate::{
    auth::Authenticator,
    errors::{Result, SheetsError},
    types::{SpreadsheetMetadata, UpdateValuesResponse, ValueRange},
};

pub struct Spreadsheets {
    client: Client,
    url: Url,
    auth: Arc<Authenticator>,
}

#[derive(Builder, Debug)]
#[builder(setter(into))]
pub struct SheetsOptions {
    #[builder(default = "self.default_url()")]
    url: Url,
    #[builder(default = "self.default_client()")]
    client: Client,
}

impl SheetsOptions {
    pub fn default_builder() -> SheetsOptionsBuilder {
        SheetsOptionsBuilder::default()
    }
}

impl SheetsOptionsBuilder {
    fn default_url(&self) -> Url {
        Url::from_str("https://sheets.googleapis.com/v4/").unwrap()
    }
    fn default_client(&self) -> Client {
        Client::new()
    }
}

/// One tab of a spreadsheet. Rows and columns are 1-based, as in the sheets ui.
pub struct Worksheet {
    client: Client,
    url: Url,
    auth: Arc<Authenticator>,
    spreadsheet_id: String,
    spreadsheet_title: String,
    title: String,
}

impl Spreadsheets {
    pub fn new(lo: SheetsOptions, auth: Authenticator) -> Self {
        Spreadsheets {
            client: lo.client,
            url: lo.url,
            auth: Arc::new(auth),
        }
    }

    pub async fn metadata(&self, spreadsheet_id: &str) -> Result<SpreadsheetMetadata> {
        if spreadsheet_id.is_empty() {
            return Err(SheetsError::invalid_argument("spreadsheet_id"));
        }
        let token = self.auth.token().await?;
        let res = self
            .client
            .get(format!(
                "{}spreadsheets/{}",
                self.url,
                urlencoding::encode(spreadsheet_id)
            ))
            .query(&[(
                "fields",
                "spreadsheetId,properties.title,sheets.properties",
            )])
            .bearer_auth(token)
            .send()
            .await?;

        parse_response(res).await
    }

    /// Opens the first tab of the spreadsheet.
    pub async fn open_first(&self, spreadsheet_id: &str) -> Result<Worksheet> {
        let meta = self.metadata(spreadsheet_id).await?;
        let first = meta
            .sheets
            .iter()
            .min_by_key(|s| s.properties.index)
            .ok_or_else(|| SheetsError::invalid_argument("spreadsheet has no sheets"))?;

        debug!(
            "opened spreadsheet {} ({}), tab {}",
            meta.properties.title, spreadsheet_id, first.properties.title
        );

        Ok(Worksheet {
            client: self.client.clone(),
            url: self.url.clone(),
            auth: self.auth.clone(),
            spreadsheet_id: spreadsheet_id.into(),
            spreadsheet_title: meta.properties.title.clone(),
            title: first.properties.title.clone(),
        })
    }
}

impl Worksheet {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn spreadsheet_title(&self) -> &str {
        &self.spreadsheet_title
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}spreadsheets/{}/values/{}",
            self.url,
            urlencoding::encode(&self.spreadsheet_id),
            urlencoding::encode(range)
        )
    }

    async fn get_range(&self, range: &str, major_dimension: &str) -> Result<ValueRange> {
        let token = self.auth.token().await?;
        let res = self
            .client
            .get(self.values_url(range))
            .query(&[("majorDimension", major_dimension)])
            .bearer_auth(token)
            .send()
            .await?;

        parse_response(res).await
    }

    /// Every populated row of the tab. Trailing empty cells are not returned by
    /// the api, so rows may have different lengths.
    pub async fn get_all_values(&self) -> Result<Vec<Vec<String>>> {
        let range = quote_sheet(&self.title);
        Ok(self.get_range(&range, "ROWS").await?.values)
    }

    pub async fn row_values(&self, row: usize) -> Result<Vec<String>> {
        if row == 0 {
            return Err(SheetsError::invalid_argument("row must be >= 1"));
        }
        let range = format!("{}!{}:{}", quote_sheet(&self.title), row, row);
        let v = self.get_range(&range, "ROWS").await?;
        Ok(v.values.into_iter().next().unwrap_or_default())
    }

    pub async fn col_values(&self, col: usize) -> Result<Vec<String>> {
        let letter = column_letter(col)?;
        let range = format!("{}!{}:{}", quote_sheet(&self.title), letter, letter);
        let v = self.get_range(&range, "COLUMNS").await?;
        Ok(v.values.into_iter().next().unwrap_or_default())
    }

    pub async fn update_cell(&self, row: usize, col: usize, value: &str) -> Result<()> {
        let range = format!("{}!{}", quote_sheet(&self.title), a1_cell(row, col)?);
        self.put_values(&range, "ROWS", vec![vec![value.to_string()]])
            .await
    }

    /// Writes `values` down one column, starting at the first row after the last
    /// populated cell of that column. Returns the first row written.
    pub async fn append_column_values(&self, col: usize, values: &[String]) -> Result<usize> {
        let existing = self.col_values(col).await?;
        if values.is_empty() {
            return Ok(existing.len() + 1);
        }
        let (start, cells) = append_range(col, existing.len(), values.len())?;
        let range = format!("{}!{}", quote_sheet(&self.title), cells);
        self.put_values(&range, "COLUMNS", vec![values.to_vec()])
            .await?;
        Ok(start)
    }

    async fn put_values(
        &self,
        range: &str,
        major_dimension: &str,
        values: Vec<Vec<String>>,
    ) -> Result<()> {
        let token = self.auth.token().await?;
        let body = ValueRange {
            range: range.into(),
            major_dimension: major_dimension.into(),
            values,
        };
        let res = self
            .client
            .put(self.values_url(range))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let updated: UpdateValuesResponse = parse_response(res).await?;
        debug!(
            "updated {} cells in {}",
            updated.updated_cells, updated.updated_range
        );
        Ok(())
    }
}

async fn parse_response<T: DeserializeOwned>(res: Response) -> Result<T> {
    if res.status() == StatusCode::OK {
        Ok(res.json::<T>().await?)
    } else {
        Err(SheetsError::ApiError {
            status: res.status().as_u16(),
            body: res.text().await?,
        })
    }
}

/// `1 -> A`, `11 -> K`, `27 -> AA`.
pub fn column_letter(col: usize) -> Result<String> {
    if col == 0 {
        return Err(SheetsError::invalid_argument("column must be >= 1"));
    }
    let mut n = col;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    Ok(letters.iter().rev().collect())
}

pub fn a1_cell(row: usize, col: usize) -> Result<String> {
    if row == 0 {
        return Err(SheetsError::invalid_argument("row must be >= 1"));
    }
    Ok(format!("{}{}", column_letter(col)?, row))
}

/// The cells `count` values take in column `col` below `filled` populated rows,
/// and the first row they land on.
pub fn append_range(col: usize, filled: usize, count: usize) -> Result<(usize, String)> {
    if count == 0 {
        return Err(SheetsError::invalid_argument("nothing to append"));
    }
    let start = filled + 1;
    let end = filled + count;
    Ok((
        start,
        format!("{}:{}", a1_cell(start, col)?, a1_cell(end, col)?),
    ))
}

fn quote_sheet(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}
