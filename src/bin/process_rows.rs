use std::{
    path::PathBuf,
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use listing_scraper::{
    browser_controller::{BrowserController, BrowserOptions},
    extraction::{AgentQlExtractor, BuiltinExtractor, TitleExtractor},
    runner::{Runner, RunnerOptions},
    sheet::ensure_result_headers,
    utils::{
        AGENTQL_API_KEY, CREDENTIALS_FILE, GOOGLE_SHEET_ID, LINK_COLUMN, RESULT_COLUMN,
        ROW_DELAY_SECS,
    },
};
use log::{debug, info};
use signal_hook::consts::{SIGINT, SIGTERM};
use sheets::{column_letter, Authenticator, SheetsOptions, Spreadsheets};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractorKind {
    /// Page title and the start of the page text
    Title,
    /// AgentQL query-data api, needs AGENTQL_API_KEY
    Agentql,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Scrapes the links stored in a spreadsheet and writes the results back", long_about = None)]
struct Args {
    /// Process at most N unprocessed links
    #[arg(long, value_name = "N")]
    max: Option<usize>,
    /// Start from sheet row N
    #[arg(long, value_name = "N")]
    start: Option<usize>,
    /// Spreadsheet id
    #[arg(long, default_value_t = GOOGLE_SHEET_ID.clone())]
    sheet_id: String,
    /// Service account credentials file
    #[arg(long, default_value_os_t = CREDENTIALS_FILE.clone())]
    credentials: PathBuf,
    /// Seconds to wait between two rows
    #[arg(long, default_value_t = ROW_DELAY_SECS)]
    delay_secs: u64,
    /// Run chrome with a visible window
    #[arg(long)]
    show_browser: bool,
    /// Maximum time the browser will wait for an event before timing out
    #[arg(long, default_value_t = 45)]
    browser_timeout: u64,
    /// How to extract data from each visited page
    #[arg(long, value_enum, default_value_t = ExtractorKind::Title)]
    extractor: ExtractorKind,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    debug!("Starting row processor with {:#?}", args.clone());

    if args.sheet_id.is_empty() {
        return Err(anyhow!(
            "no spreadsheet id, set GOOGLE_SHEET_ID or pass --sheet-id"
        ));
    }

    println!(
        "STARTING LINK SCRAPER - {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    let extractor = match args.extractor {
        ExtractorKind::Title => BuiltinExtractor::Title(TitleExtractor),
        ExtractorKind::Agentql => {
            let key = AGENTQL_API_KEY
                .clone()
                .ok_or_else(|| anyhow!("AGENTQL_API_KEY is missing, check your .env file"))?;
            BuiltinExtractor::AgentQl(AgentQlExtractor::new(&key)?)
        }
    };

    let auth = Authenticator::from_file(&args.credentials, reqwest::Client::new()).context(
        format!("could not load credentials from {:?}", args.credentials),
    )?;
    debug!("authenticating as {}", auth.client_email());

    let spreadsheets = Spreadsheets::new(SheetsOptions::default_builder().build()?, auth);
    let worksheet = spreadsheets
        .open_first(&args.sheet_id)
        .await
        .context(format!("could not open spreadsheet {}", args.sheet_id))?;
    info!(
        "connected to google sheet: {} ({})",
        worksheet.spreadsheet_title(),
        worksheet.title()
    );

    let headers = worksheet
        .row_values(1)
        .await
        .context("could not read header row")?;
    log_sheet_structure(&headers);
    ensure_result_headers(&worksheet, &headers)
        .await
        .context("could not write result headers")?;

    let browser = BrowserController::new(
        BrowserOptions::default_builder()
            .headless(!args.show_browser)
            .timeout(args.browser_timeout)
            .build()?,
    )?;

    let should_terminate = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGTERM, Arc::clone(&should_terminate))?;
    signal_hook::flag::register(SIGINT, Arc::clone(&should_terminate))?;

    let options = RunnerOptions::default_builder()
        .start_row(args.start)
        .max_rows(args.max)
        .delay(Duration::from_secs(args.delay_secs))
        .build()?;
    let runner = Runner::new(worksheet, browser, extractor, options)
        .with_termination_flag(should_terminate);

    let summary = runner.run().await?;

    println!("{number:=>width$}", number = "", width = 70);
    println!("SCRAPING COMPLETE");
    println!("{number:=>width$}", number = "", width = 70);
    println!("Successfully processed: {}", summary.succeeded);
    println!("Failed: {}", summary.failed);
    println!("Total: {}", summary.total());
    if summary.attempted < summary.eligible {
        println!("Not attempted: {}", summary.eligible - summary.attempted);
    }

    Ok(())
}

fn log_sheet_structure(headers: &[String]) {
    for (i, header) in headers.iter().take(15).enumerate() {
        let col = i + 1;
        let marker = match col {
            LINK_COLUMN => " <- link source",
            RESULT_COLUMN => " <- result output",
            _ => "",
        };
        let letter = column_letter(col).unwrap_or_default();
        info!("column {} ({:2}): {}{}", letter, col, header, marker);
    }
}
