// fetches a search results page and keeps the listing links it finds.
use std::{fs, path::Path, path::PathBuf, time::Duration};

use reqwest::{blocking::Client, Url};
use scraper::{Html, Selector};

use crate::{
    types::ScraperError,
    utils::{EXPECTED_DOMAIN, LISTINGS_FILE, LISTING_SELECTOR, MAX_LISTINGS, USER_AGENT},
};

pub struct ListingExtractor {
    client: Client,
    selector: Selector,
    options: ExtractorOptions,
}

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct ExtractorOptions {
    // css selector for the listing anchors
    #[builder(default = "self.default_selector()")]
    selector: String,
    // maximum number of matched anchors to keep
    #[builder(default = "MAX_LISTINGS")]
    limit: usize,
    // where the json array is written
    #[builder(default = "self.default_output()")]
    output: PathBuf,
    // substring every accepted search url must contain
    #[builder(default = "self.default_domain()")]
    domain: String,
    // request timeout in seconds
    #[builder(default = "30")]
    timeout: u64,
}

impl ExtractorOptions {
    pub fn default_builder() -> ExtractorOptionsBuilder {
        ExtractorOptionsBuilder::default()
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl ExtractorOptionsBuilder {
    fn default_selector(&self) -> String {
        LISTING_SELECTOR.into()
    }
    fn default_output(&self) -> PathBuf {
        PathBuf::from(LISTINGS_FILE)
    }
    fn default_domain(&self) -> String {
        EXPECTED_DOMAIN.into()
    }
}

impl ListingExtractor {
    pub fn new(options: ExtractorOptions) -> Result<Self, ScraperError> {
        let selector = parse_selector(&options.selector)?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(options.timeout))
            .build()
            .map_err(|e| ScraperError::Fetch(format!("could not build http client: {}", e)))?;

        Ok(ListingExtractor {
            client,
            selector,
            options,
        })
    }

    pub fn options(&self) -> &ExtractorOptions {
        &self.options
    }

    pub fn validate(&self, input: &str) -> Result<Url, ScraperError> {
        validate_search_url(input, &self.options.domain)
    }

    /// Fetches `url`, extracts the listing links and writes them to the output
    /// file. Nothing is written if the fetch fails.
    pub fn run(&self, url: &Url) -> Result<Vec<String>, ScraperError> {
        info!("fetching {}", url);
        let html = fetch_page(&self.client, url)?;

        let urls = extract_listing_urls(&html, &self.selector, self.options.limit);
        info!("found {} listing urls", urls.len());

        write_listings(&self.options.output, &urls)?;
        debug!("wrote {:?}", self.options.output);

        Ok(urls)
    }
}

pub fn parse_selector(selector: &str) -> Result<Selector, ScraperError> {
    Selector::parse(selector)
        .map_err(|e| ScraperError::Validation(format!("bad selector {}: {:?}", selector, e)))
}

pub fn validate_search_url(input: &str, domain: &str) -> Result<Url, ScraperError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ScraperError::Validation("no URL provided".into()));
    }
    if !input.contains(domain) {
        return Err(ScraperError::Validation(format!(
            "{} is not a {} url",
            input, domain
        )));
    }
    let url = Url::parse(input)
        .map_err(|e| ScraperError::Validation(format!("{} is not a valid url: {}", input, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        s => Err(ScraperError::Validation(format!(
            "unsupported scheme {} in {}",
            s, input
        ))),
    }
}

pub fn fetch_page(client: &Client, url: &Url) -> Result<String, ScraperError> {
    let res = client
        .get(url.as_str())
        .send()
        .map_err(|e| ScraperError::Fetch(format!("could not fetch {}: {}", url, e)))?;

    let status = res.status();
    if !status.is_success() {
        return Err(ScraperError::Fetch(format!("{} returned {}", url, status)));
    }

    res.text()
        .map_err(|e| ScraperError::Fetch(format!("could not read body of {}: {}", url, e)))
}

/// Takes the first `limit` elements matching `selector` in document order and
/// returns their `href`s. Matches without an `href` are dropped but still count
/// against the limit.
pub fn extract_listing_urls(html: &str, selector: &Selector, limit: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .take(limit)
        .filter_map(|a| a.value().attr("href").map(|h| h.to_string()))
        .collect()
}

pub fn write_listings(path: &Path, urls: &[String]) -> Result<(), ScraperError> {
    let json = serde_json::to_string_pretty(urls)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn read_listings(path: &Path) -> Result<Vec<String>, ScraperError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod test {
    use super::*;

    fn listing_page(n: usize) -> String {
        let items: String = (0..n)
            .map(|i| {
                format!(
                    r#"<li class="cl-search-result"><a class="cl-app-anchor text-only posting-title" href="https://sfbay.craigslist.org/d/{i}.html">Post {i}</a></li>"#
                )
            })
            .collect();
        format!("<html><body><ol>{}</ol></body></html>", items)
    }

    fn selector() -> Selector {
        parse_selector(LISTING_SELECTOR).unwrap()
    }

    #[test]
    fn keeps_all_when_under_limit() {
        let urls = extract_listing_urls(&listing_page(7), &selector(), MAX_LISTINGS);
        assert_eq!(urls.len(), 7);
        assert_eq!(urls[0], "https://sfbay.craigslist.org/d/0.html");
        assert_eq!(urls[6], "https://sfbay.craigslist.org/d/6.html");
    }

    #[test]
    fn caps_at_first_twenty() {
        let urls = extract_listing_urls(&listing_page(35), &selector(), MAX_LISTINGS);
        assert_eq!(urls.len(), 20);
        assert_eq!(urls[19], "https://sfbay.craigslist.org/d/19.html");
    }

    #[test]
    fn skips_anchor_without_href() {
        let html = r#"<html><body>
            <a class="posting-title" href="/d/1.html">one</a>
            <a class="posting-title">no link</a>
            <a class="posting-title" href="/d/3.html">three</a>
            <a class="other" href="/d/4.html">not a listing</a>
        </body></html>"#;
        let urls = extract_listing_urls(html, &selector(), MAX_LISTINGS);
        assert_eq!(urls, vec!["/d/1.html".to_string(), "/d/3.html".to_string()]);
    }

    #[test]
    fn empty_page_yields_nothing() {
        let urls = extract_listing_urls("<html></html>", &selector(), MAX_LISTINGS);
        assert!(urls.is_empty());
    }

    #[test]
    fn listings_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LISTINGS_FILE);
        let urls = extract_listing_urls(&listing_page(3), &selector(), MAX_LISTINGS);

        write_listings(&path, &urls).unwrap();
        assert_eq!(read_listings(&path).unwrap(), urls);

        // pretty printed, one url per line
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("[\n"));
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LISTINGS_FILE);
        write_listings(&path, &["a".to_string(), "b".to_string()]).unwrap();
        write_listings(&path, &["c".to_string()]).unwrap();
        assert_eq!(read_listings(&path).unwrap(), vec!["c".to_string()]);
    }

    #[test]
    fn rejects_empty_url() {
        let res = validate_search_url("   ", EXPECTED_DOMAIN);
        assert!(matches!(res, Err(ScraperError::Validation(_))));
    }

    #[test]
    fn rejects_other_domains() {
        let res = validate_search_url("https://example.com/search/jjj", EXPECTED_DOMAIN);
        assert!(matches!(res, Err(ScraperError::Validation(_))));
    }

    #[test]
    fn accepts_search_url() {
        let u = validate_search_url(
            " https://newyork.craigslist.org/search/jjj?query=cashier#search=2~thumb~0 ",
            EXPECTED_DOMAIN,
        )
        .unwrap();
        assert_eq!(u.host_str(), Some("newyork.craigslist.org"));
    }

    #[test]
    fn rejects_bad_selector() {
        let res = ExtractorOptions::default_builder()
            .selector("a[")
            .build()
            .map_err(anyhow::Error::from)
            .and_then(|o| ListingExtractor::new(o).map_err(anyhow::Error::from));
        assert!(res.is_err());
    }
}
