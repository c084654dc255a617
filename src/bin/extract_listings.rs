use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use dialoguer::Input;
use listing_scraper::{
    extractor::{ExtractorOptions, ListingExtractor},
    utils::{
        CREDENTIALS_FILE, EXPECTED_DOMAIN, GOOGLE_SHEET_ID, LINK_COLUMN, LISTINGS_FILE,
        LISTING_SELECTOR, MAX_LISTINGS,
    },
};
use log::{debug, info};
use sheets::{Authenticator, SheetsOptions, Spreadsheets};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Saves the listing links of a search results page", long_about = None)]
struct Args {
    /// Search results url, prompted for when omitted
    #[arg(short = 'u', long)]
    url: Option<String>,
    /// File the JSON array of links is written to
    #[arg(short = 'o', long, default_value = LISTINGS_FILE)]
    output: PathBuf,
    /// Substring every accepted url must contain
    #[arg(long, default_value = EXPECTED_DOMAIN)]
    domain: String,
    /// CSS selector matching the listing anchors
    #[arg(long, default_value = LISTING_SELECTOR)]
    selector: String,
    /// Also append the links to the link column of the spreadsheet
    #[arg(long)]
    to_sheet: bool,
    /// Spreadsheet id used with --to-sheet
    #[arg(long, default_value_t = GOOGLE_SHEET_ID.clone())]
    sheet_id: String,
    /// Service account credentials used with --to-sheet
    #[arg(long, default_value_os_t = CREDENTIALS_FILE.clone())]
    credentials: PathBuf,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    debug!("Starting extractor with {:#?}", args.clone());

    let options = ExtractorOptions::default_builder()
        .selector(args.selector.clone())
        .limit(MAX_LISTINGS)
        .output(args.output.clone())
        .domain(args.domain.clone())
        .build()?;
    let extractor = ListingExtractor::new(options)?;

    let input = match &args.url {
        Some(u) => u.clone(),
        None => Input::<String>::new()
            .with_prompt("Please enter the URL you want to scrape")
            .allow_empty(true)
            .interact_text()
            .context("could not read url from prompt")?,
    };
    let url = extractor.validate(&input)?;

    let urls = extractor
        .run(&url)
        .context(format!("could not extract listings from {}", url))?;

    println!(
        "Found {} listing urls, saved to {}",
        urls.len(),
        args.output.display()
    );
    for (i, u) in urls.iter().enumerate() {
        println!("{}. {}", i + 1, u);
    }

    if args.to_sheet {
        push_to_sheet(&args, &urls)?;
    }

    Ok(())
}

fn push_to_sheet(args: &Args, urls: &[String]) -> anyhow::Result<()> {
    if args.sheet_id.is_empty() {
        return Err(anyhow!(
            "no spreadsheet id, set GOOGLE_SHEET_ID or pass --sheet-id"
        ));
    }
    if urls.is_empty() {
        info!("no links to add");
        return Ok(());
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let auth = Authenticator::from_file(&args.credentials, reqwest::Client::new())
            .context(format!(
                "could not load credentials from {:?}",
                args.credentials
            ))?;
        let spreadsheets = Spreadsheets::new(SheetsOptions::default_builder().build()?, auth);
        let worksheet = spreadsheets
            .open_first(&args.sheet_id)
            .await
            .context(format!("could not open spreadsheet {}", args.sheet_id))?;

        let first = worksheet.append_column_values(LINK_COLUMN, urls).await?;
        info!(
            "added {} links to {} rows {}-{}",
            urls.len(),
            worksheet.title(),
            first,
            first + urls.len() - 1
        );
        Ok::<_, anyhow::Error>(())
    })
}
