use std::{
    cell::RefCell,
    collections::HashSet,
    rc::Rc,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use listing_scraper::{
    browser_controller::{check_status, PageLoader},
    extraction::{PageExtractor, TitleExtractor},
    runner::{Runner, RunnerOptions},
    sheet::{ensure_result_headers, RowStore},
    types::LoadedPage,
    utils::{LINK_COLUMN, PROCESSED_COLUMN, RESULT_COLUMN},
};

macro_rules! aw {
    ($e:expr) => {
        tokio_test::block_on($e)
    };
}

/// In-memory worksheet, 1-based like the real one.
#[derive(Default)]
struct MemorySheet {
    grid: RefCell<Vec<Vec<String>>>,
    writes: RefCell<Vec<(usize, usize, String)>>,
    broken_rows: HashSet<usize>,
}

impl MemorySheet {
    fn with_links(links: &[&str]) -> Self {
        let mut grid = vec![vec!["ID".to_string(), "Company".to_string()]];
        for link in links {
            let mut row = vec![String::new(); LINK_COLUMN];
            row[LINK_COLUMN - 1] = link.to_string();
            grid.push(row);
        }
        MemorySheet {
            grid: RefCell::new(grid),
            ..Default::default()
        }
    }

    fn cell(&self, row: usize, col: usize) -> String {
        self.grid
            .borrow()
            .get(row - 1)
            .and_then(|r| r.get(col - 1))
            .cloned()
            .unwrap_or_default()
    }

    fn rows_written(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self.writes.borrow().iter().map(|w| w.0).collect();
        rows.dedup();
        rows
    }
}

#[async_trait(?Send)]
impl RowStore for MemorySheet {
    async fn all_values(&self) -> Result<Vec<Vec<String>>> {
        Ok(self.grid.borrow().clone())
    }

    async fn write_cell(&self, row: usize, col: usize, value: &str) -> Result<()> {
        if self.broken_rows.contains(&row) {
            return Err(anyhow!("sheets api returned 503"));
        }
        let mut grid = self.grid.borrow_mut();
        while grid.len() < row {
            grid.push(vec![]);
        }
        let r = &mut grid[row - 1];
        while r.len() < col {
            r.push(String::new());
        }
        r[col - 1] = value.to_string();
        self.writes.borrow_mut().push((row, col, value.to_string()));
        Ok(())
    }
}

/// Serves a fixed page for every url. Urls containing "broken" fail to load and
/// urls containing "gone" answer 404.
#[derive(Clone, Default)]
struct FakeLoader {
    visited: Rc<RefCell<Vec<String>>>,
}

#[async_trait(?Send)]
impl PageLoader for FakeLoader {
    async fn load(&self, url: &str) -> Result<LoadedPage> {
        self.visited.borrow_mut().push(url.to_string());
        if url.contains("broken") {
            return Err(anyhow!("net::ERR_NAME_NOT_RESOLVED"));
        }
        if url.contains("gone") {
            check_status(404)?;
        }
        Ok(LoadedPage {
            url: url.into(),
            title: format!("Listing at {}", url),
            html: "<html><body>Cook wanted</body></html>".into(),
            text: "Cook wanted".into(),
        })
    }
}

fn options(start: Option<usize>, max: Option<usize>) -> RunnerOptions {
    RunnerOptions::default_builder()
        .start_row(start)
        .max_rows(max)
        .delay(Duration::ZERO)
        .build()
        .unwrap()
}

fn link(n: usize) -> String {
    format!("https://sfbay.craigslist.org/d/{}.html", n)
}

#[test]
fn empty_link_row_is_left_alone() {
    // rows 2, 3, 4, 6 have links, row 5 does not
    let sheet = MemorySheet::with_links(&[&link(2), &link(3), &link(4), "", &link(6)]);
    let loader = FakeLoader::default();
    let runner = Runner::new(sheet, loader.clone(), TitleExtractor, options(None, None));

    let summary = aw!(runner.run()).unwrap();

    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 0);
    let sheet = runner.store();
    assert_eq!(sheet.rows_written(), vec![2, 3, 4, 6]);
    assert_eq!(sheet.cell(5, RESULT_COLUMN), "");
    assert_eq!(sheet.cell(5, PROCESSED_COLUMN), "");
    assert_eq!(sheet.cell(6, PROCESSED_COLUMN), "✓");
    assert!(sheet
        .cell(6, RESULT_COLUMN)
        .starts_with("Title: Listing at https://sfbay.craigslist.org/d/6.html"));
}

#[test]
fn failing_row_is_marked_and_loop_continues() {
    let sheet = MemorySheet::with_links(&[&link(2), "https://broken.example/d/3.html", &link(4)]);
    let loader = FakeLoader::default();
    let runner = Runner::new(sheet, loader.clone(), TitleExtractor, options(None, None));

    let summary = aw!(runner.run()).unwrap();

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    let sheet = runner.store();
    assert_eq!(sheet.cell(3, PROCESSED_COLUMN), "❌");
    assert!(sheet.cell(3, RESULT_COLUMN).starts_with("Error: "));
    assert!(sheet.cell(3, RESULT_COLUMN).contains("ERR_NAME_NOT_RESOLVED"));
    assert_eq!(sheet.cell(4, PROCESSED_COLUMN), "✓");
    assert_eq!(loader.visited.borrow().len(), 3);
}

#[test]
fn extraction_error_is_a_row_failure() {
    let sheet = MemorySheet::with_links(&[&link(2), &link(3)]);
    let picky = |p: &LoadedPage| -> Result<String> {
        if p.url.ends_with("/2.html") {
            Err(anyhow!("main_content not found"))
        } else {
            Ok(p.text.clone())
        }
    };
    let runner = Runner::new(sheet, FakeLoader::default(), picky, options(None, None));

    let summary = aw!(runner.run()).unwrap();

    assert_eq!((summary.succeeded, summary.failed), (1, 1));
    let sheet = runner.store();
    assert_eq!(sheet.cell(2, RESULT_COLUMN), "Error: main_content not found");
    assert_eq!(sheet.cell(2, PROCESSED_COLUMN), "❌");
    assert_eq!(sheet.cell(3, RESULT_COLUMN), "Cook wanted");
}

#[test]
fn start_and_max_pick_a_window() {
    let links: Vec<String> = (2..=25).map(link).collect();
    let refs: Vec<&str> = links.iter().map(|s| s.as_str()).collect();
    let sheet = MemorySheet::with_links(&refs);
    let loader = FakeLoader::default();
    let runner = Runner::new(sheet, loader.clone(), TitleExtractor, options(Some(10), Some(3)));

    let summary = aw!(runner.run()).unwrap();

    assert_eq!(summary.attempted, 3);
    assert_eq!(*loader.visited.borrow(), vec![link(10), link(11), link(12)]);
    assert_eq!(runner.store().rows_written(), vec![10, 11, 12]);
}

#[test]
fn rerun_skips_processed_rows() {
    let sheet = MemorySheet::with_links(&[&link(2), "https://broken.example/3", &link(4)]);
    let loader = FakeLoader::default();
    let runner = Runner::new(sheet, loader.clone(), TitleExtractor, options(None, None));

    aw!(runner.run()).unwrap();
    let writes_after_first = runner.store().writes.borrow().len();

    let second = aw!(runner.run()).unwrap();

    assert_eq!(second.eligible, 0);
    assert_eq!(second.attempted, 0);
    assert_eq!(runner.store().writes.borrow().len(), writes_after_first);
    assert_eq!(loader.visited.borrow().len(), 3);
}

#[test]
fn write_back_failure_counts_as_failed() {
    let mut sheet = MemorySheet::with_links(&[&link(2), &link(3)]);
    sheet.broken_rows.insert(2);
    let runner = Runner::new(sheet, FakeLoader::default(), TitleExtractor, options(None, None));

    let summary = aw!(runner.run()).unwrap();

    assert_eq!((summary.succeeded, summary.failed), (1, 1));
    assert_eq!(runner.store().cell(3, PROCESSED_COLUMN), "✓");
}

#[test]
fn termination_flag_stops_before_next_row() {
    let sheet = MemorySheet::with_links(&[&link(2), &link(3)]);
    let loader = FakeLoader::default();
    let runner = Runner::new(sheet, loader.clone(), TitleExtractor, options(None, None))
        .with_termination_flag(Arc::new(AtomicBool::new(true)));

    let summary = aw!(runner.run()).unwrap();

    assert_eq!(summary.eligible, 2);
    assert_eq!(summary.attempted, 0);
    assert!(loader.visited.borrow().is_empty());
}

#[test]
fn termination_during_pause_skips_next_row() {
    let sheet = MemorySheet::with_links(&[&link(2), &link(3)]);
    let loader = FakeLoader::default();
    let flag = Arc::new(AtomicBool::new(false));
    let opts = RunnerOptions::default_builder()
        .delay(Duration::from_millis(400))
        .build()
        .unwrap();
    let runner = Runner::new(sheet, loader.clone(), TitleExtractor, opts)
        .with_termination_flag(flag.clone());

    // lands while the runner waits between row 2 and row 3
    let signal = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        flag.store(true, Ordering::Relaxed);
    });
    let summary = aw!(runner.run()).unwrap();
    signal.join().unwrap();

    assert_eq!(summary.attempted, 1);
    assert_eq!(*loader.visited.borrow(), vec![link(2)]);
    assert_eq!(runner.store().rows_written(), vec![2]);
}

#[test]
fn error_status_page_is_a_row_failure() {
    let sheet = MemorySheet::with_links(&["https://sfbay.craigslist.org/gone/2.html", &link(3)]);
    let runner = Runner::new(sheet, FakeLoader::default(), TitleExtractor, options(None, None));

    let summary = aw!(runner.run()).unwrap();

    assert_eq!((summary.succeeded, summary.failed), (1, 1));
    let sheet = runner.store();
    assert_eq!(sheet.cell(2, RESULT_COLUMN), "Error: HTTP 404");
    assert_eq!(sheet.cell(2, PROCESSED_COLUMN), "❌");
    assert_eq!(sheet.cell(3, PROCESSED_COLUMN), "✓");
}

#[test]
fn process_row_does_not_write() {
    let sheet = MemorySheet::with_links(&["https://broken.example/2"]);
    let runner = Runner::new(sheet, FakeLoader::default(), TitleExtractor, options(None, None));
    let rows = aw!(runner.pending_rows()).unwrap();

    let outcome = aw!(runner.process_row(&rows[0]));

    assert!(!outcome.is_success());
    assert!(runner.store().writes.borrow().is_empty());
}

#[test]
fn headers_added_when_missing() {
    let sheet = MemorySheet::with_links(&[]);
    let headers = vec!["ID".to_string(), "Company".to_string()];

    aw!(ensure_result_headers(&sheet, &headers)).unwrap();

    assert_eq!(sheet.cell(1, RESULT_COLUMN), "Scraped Data");
    assert_eq!(sheet.cell(1, PROCESSED_COLUMN), "Processed");
}

#[test]
fn headers_kept_when_present() {
    let sheet = MemorySheet::with_links(&[]);
    let headers: Vec<String> = (1..=PROCESSED_COLUMN).map(|i| format!("h{}", i)).collect();

    aw!(ensure_result_headers(&sheet, &headers)).unwrap();

    assert!(sheet.writes.borrow().is_empty());
}

#[test]
fn custom_extractor_sees_loaded_page() {
    struct Upper;

    #[async_trait(?Send)]
    impl PageExtractor for Upper {
        async fn extract(&self, page: &LoadedPage) -> Result<String> {
            Ok(page.text.to_uppercase())
        }
    }

    let sheet = MemorySheet::with_links(&[&link(2)]);
    let runner = Runner::new(sheet, FakeLoader::default(), Upper, options(None, None));

    aw!(runner.run()).unwrap();

    assert_eq!(runner.store().cell(2, RESULT_COLUMN), "COOK WANTED");
}

/*
RUST_LOG=debug cargo test --test process_rows -- browse_real_page --exact --ignored
 */
#[test]
#[ignore = "browser"]
fn browse_real_page() -> Result<()> {
    use listing_scraper::browser_controller::{BrowserController, BrowserOptions};

    let _ = env_logger::try_init();
    let browser = BrowserController::new(
        BrowserOptions::default_builder()
            .min_wait_after_navigation(0u64)
            .max_wait_after_navigation(1u64)
            .build()?,
    )?;
    let page = aw!(browser.load("https://example.com/"))?;
    let text = aw!(TitleExtractor.extract(&page))?;
    println!("{text}");
    assert!(text.starts_with("Title: Example Domain"));
    Ok(())
}
