//! Page fetching and visible-text extraction.
//!
//! Scraping never fails past this module: a page that cannot be fetched or decoded becomes a
//! `ScrapedPage` with no text.

use std::io::Read;
use std::time::Duration;

use crv_core::error::AppError;
use crv_core::text::collapse_whitespace;
use rayon::prelude::*;
use rayon::ThreadPool;
use scraper::{Html, Node};

/// Bodies past this size are cut off before parsing.
pub const MAX_PAGE_BYTES: u64 = 8 * 1024 * 1024;

/// Text under these parents is never rendered.
const HIDDEN_PARENTS: [&str; 5] = ["style", "script", "head", "title", "meta"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: Vec<u8>,
}

pub trait PageFetcher: Send + Sync {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, AppError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            max_bytes: MAX_PAGE_BYTES,
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, AppError> {
        let resp = match ureq::get(url).timeout(timeout).call() {
            Ok(r) => r,
            Err(ureq::Error::Status(status, _)) => return Ok(FetchedPage { status, body: Vec::new() }),
            Err(e) => {
                return Err(AppError::new("SCRAPE_FAILED", "Failed to fetch page")
                    .with_details(format!("url={url}; err={e}"))
                    .with_retryable(true))
            }
        };
        let status = resp.status();
        let mut body = Vec::new();
        resp.into_reader()
            .take(self.max_bytes)
            .read_to_end(&mut body)
            .map_err(|e| {
                AppError::new("SCRAPE_FAILED", "Failed to read page body")
                    .with_details(format!("url={url}; err={e}"))
            })?;
        Ok(FetchedPage { status, body })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedPage {
    pub url: String,
    pub text: Option<String>,
}

/// Visible text of an HTML document, fragments joined by single spaces.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut fragments: Vec<&str> = Vec::new();
    for node in document.tree.root().descendants() {
        // Comments are their own node kind, so only text nodes are considered.
        let Node::Text(text) = node.value() else {
            continue;
        };
        let visible = match node.parent().map(|p| p.value()) {
            Some(Node::Element(el)) => !HIDDEN_PARENTS.contains(&el.name()),
            _ => false,
        };
        if visible {
            let t = text.trim();
            if !t.is_empty() {
                fragments.push(t);
            }
        }
    }
    collapse_whitespace(&fragments.join(" "))
}

fn decode_body(url: &str, body: Vec<u8>) -> String {
    match String::from_utf8(body) {
        Ok(s) => s,
        Err(e) => {
            log::debug!("scrape: {url} is not valid utf-8; decoding lossily");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

pub fn scrape_url(fetcher: &dyn PageFetcher, url: &str, timeout: Duration) -> ScrapedPage {
    let text = match fetcher.fetch(url, timeout) {
        Ok(page) if (200..300).contains(&page.status) => {
            Some(visible_text(&decode_body(url, page.body)))
        }
        Ok(page) => {
            log::debug!("scrape: {url} returned status {}", page.status);
            None
        }
        Err(e) => {
            log::debug!("scrape: {url} failed: {e}");
            None
        }
    };
    ScrapedPage {
        url: url.to_string(),
        text,
    }
}

/// Scrape every URL on `pool`, one task per URL. Output order follows `urls`.
pub fn scrape_all(
    pool: &ThreadPool,
    fetcher: &dyn PageFetcher,
    urls: &[String],
    timeout: Duration,
) -> Vec<ScrapedPage> {
    pool.install(|| {
        urls.par_iter()
            .map(|url| scrape_url(fetcher, url, timeout))
            .collect()
    })
}
