use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::Tab;
use headless_chrome::{browser::default_executable, Browser, LaunchOptions};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};
use tokio::time::sleep;

use crate::{types::LoadedPage, utils::is_docker};

const BODY_TEXT_SCRIPT: &str = "document.body ? document.body.innerText : ''";
// 0 when chrome does not report the status of the main document
const NAVIGATION_STATUS_SCRIPT: &str = "(() => { \
    const nav = performance.getEntriesByType('navigation')[0]; \
    return nav && nav.responseStatus ? nav.responseStatus : 0; })()";

/// Anything that can turn a url into a loaded page.
#[async_trait(?Send)]
pub trait PageLoader {
    async fn load(&self, url: &str) -> Result<LoadedPage>;
}

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct BrowserOptions {
    #[builder(default = "true")]
    headless: bool,
    // seconds the browser may sit idle before chrome gives up on it
    #[builder(default = "45")]
    timeout: u64,
    // minimum seconds to let a page settle after navigation
    #[builder(default = "2")]
    min_wait_after_navigation: u64,
    // maximum seconds to let a page settle after navigation
    #[builder(default = "3")]
    max_wait_after_navigation: u64,
}

impl BrowserOptions {
    pub fn default_builder() -> BrowserOptionsBuilder {
        BrowserOptionsBuilder::default()
    }
}

pub struct BrowserController {
    browser: Browser,
    tab: Arc<Tab>,
    options: BrowserOptions,
}

impl BrowserController {
    pub fn new(options: BrowserOptions) -> Result<Self> {
        let path = default_executable().map_err(|e| anyhow!(e))?;
        let launch = LaunchOptions::default_builder()
            .path(Some(path))
            .headless(options.headless)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(Duration::from_secs(options.timeout))
            // warning only do this if in docker env
            .sandbox(!is_docker())
            .build()
            .map_err(|e| anyhow!("invalid chrome launch options: {}", e))?;
        let browser = Browser::new(launch).context("browser launching error")?;
        let tab = browser.new_tab().context("could not create new tab")?;
        tab.set_default_timeout(Duration::from_secs(options.timeout));

        Ok(BrowserController {
            browser,
            tab,
            options,
        })
    }

    pub async fn browse(&self, url: &str) -> Result<LoadedPage> {
        self.tab
            .navigate_to(url)
            .with_context(|| format!("could not navigate to {}", url))?
            .wait_until_navigated()
            .with_context(|| format!("navigation to {} did not complete", url))?;

        let status = self
            .tab
            .evaluate(NAVIGATION_STATUS_SCRIPT, false)
            .ok()
            .and_then(|obj| obj.value)
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        debug!("{} answered with status {}", url, status);
        check_status(status)?;

        let wait = self.settle_secs();
        debug!("sleeping for {} seconds", wait);
        sleep(Duration::from_secs(wait)).await;

        let title = self.tab.get_title().context("could not read page title")?;
        let html = self.tab.get_content().context("could not read page content")?;
        let text = match self.tab.evaluate(BODY_TEXT_SCRIPT, false) {
            Ok(obj) => obj
                .value
                .and_then(|v| v.as_str().map(|s| s.to_string()))
                .unwrap_or_default(),
            Err(e) => {
                warn!("could not read body text for {}: {}", url, e);
                String::new()
            }
        };

        Ok(LoadedPage {
            url: self.tab.get_url(),
            title,
            html,
            text,
        })
    }

    fn settle_secs(&self) -> u64 {
        let min = self.options.min_wait_after_navigation;
        let max = self.options.max_wait_after_navigation;
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    pub fn kill(&self) -> bool {
        let pid = match self.browser.get_process_id() {
            Some(pid) => Pid::from_u32(pid),
            None => return false,
        };
        let mut s = System::new();
        if !s.refresh_process(pid) {
            return false;
        }
        if let Some(process) = s.process(pid) {
            debug!("killing process with id {}", pid);
            process.kill();
            return true;
        }
        false
    }
}

/// Error statuses fail the navigation, so the page is never handed to an extractor.
pub fn check_status(status: u64) -> Result<()> {
    if status >= 400 {
        return Err(anyhow!("HTTP {}", status));
    }
    Ok(())
}

#[async_trait(?Send)]
impl PageLoader for BrowserController {
    async fn load(&self, url: &str) -> Result<LoadedPage> {
        self.browse(url).await
    }
}

impl Drop for BrowserController {
    fn drop(&mut self) {
        debug!("killing browser process...");
        self.kill();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_statuses_fail_navigation() {
        assert_eq!(check_status(404).unwrap_err().to_string(), "HTTP 404");
        assert_eq!(check_status(500).unwrap_err().to_string(), "HTTP 500");
    }

    #[test]
    fn ok_and_unknown_statuses_pass() {
        assert!(check_status(200).is_ok());
        assert!(check_status(304).is_ok());
        assert!(check_status(0).is_ok());
    }
}
