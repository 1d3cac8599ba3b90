use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crv_ai::retrieve::scorer::{RelevanceScorer, TermOverlapScorer};
use crv_ai::retrieve::{RetrievalOptions, Retriever};
use crv_ai::retry::RetryPolicy;
use crv_ai::scrape::{FetchedPage, PageFetcher};
use crv_ai::search::SearchEngine;
use crv_core::error::AppError;
use pretty_assertions::assert_eq;

struct StaticSearch {
    urls: Vec<String>,
    calls: AtomicUsize,
}

impl StaticSearch {
    fn new(urls: &[&str]) -> Self {
        Self {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl SearchEngine for StaticSearch {
    fn search(&self, _query: &str) -> Result<Vec<String>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.urls.clone())
    }
}

struct DownSearch;

impl SearchEngine for DownSearch {
    fn search(&self, _query: &str) -> Result<Vec<String>, AppError> {
        Err(AppError::new("SEARCH_FAILED", "unavailable").with_retryable(true))
    }
}

/// Serves fixed HTML per URL; unknown URLs fail like a dead host.
struct MapFetcher {
    pages: BTreeMap<String, (u16, String)>,
}

impl MapFetcher {
    fn new(pages: &[(&str, u16, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(u, s, b)| (u.to_string(), (*s, b.to_string())))
                .collect(),
        }
    }
}

impl PageFetcher for MapFetcher {
    fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedPage, AppError> {
        match self.pages.get(url) {
            Some((status, body)) => Ok(FetchedPage {
                status: *status,
                body: body.as_bytes().to_vec(),
            }),
            None => Err(AppError::new("SCRAPE_FAILED", "connection refused").with_retryable(true)),
        }
    }
}

struct FailingScorer;

impl RelevanceScorer for FailingScorer {
    fn score(&self, _query: &str, _passages: &[String]) -> Result<Vec<f32>, AppError> {
        Err(AppError::new("SCORER_FAILED", "model not loaded"))
    }
}

fn pool() -> rayon::ThreadPool {
    rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .expect("pool")
}

fn options() -> RetrievalOptions {
    RetrievalOptions {
        max_search_results_per_query: 3,
        max_passages_per_search_result_to_score: 30,
        max_passages_per_search_result: 1,
        max_sentences_per_passage: 1,
        sliding_distance: 1,
        filter_sentence_len: 250,
        randomize_num_sentences: false,
        seed: None,
        scrape_timeout: Duration::from_millis(100),
    }
}

const BULLS: &str = "<html><body><p>Jordan played basketball for the Chicago Bulls. He won six titles.</p></body></html>";
const LAKERS: &str = "<html><body><p>The Lakers play in Los Angeles. Jordan never played for them.</p></body></html>";
const NOISE: &str = "<html><body><p>Weather is mild today.</p></body></html>";

#[test]
fn scores_normalize_and_rank_across_results() {
    let search = StaticSearch::new(&["https://a", "https://b", "https://c"]);
    let fetcher = MapFetcher::new(&[
        ("https://a", 200, NOISE),
        ("https://b", 200, BULLS),
        ("https://c", 200, LAKERS),
    ]);
    let pool = pool();
    let retriever = Retriever {
        search: &search,
        fetcher: &fetcher,
        scorer: &TermOverlapScorer,
        pool: &pool,
        retry: RetryPolicy::immediate(1),
        options: options(),
    };

    let got = retriever.retrieve("Which team did Jordan play basketball for?");
    assert_eq!(got.len(), 3, "one passage per search result");
    assert_eq!(got[0].text, "Jordan played basketball for the Chicago Bulls.");
    assert_eq!(got[0].url, "https://b");
    assert_eq!(got[2].url, "https://a");

    let total: f32 = got.iter().map(|p| p.score).sum();
    assert!((total - 1.0).abs() < 1e-5, "scores sum to {total}");
    for pair in got.windows(2) {
        assert!(pair[0].retrieval_score >= pair[1].retrieval_score);
        assert!(pair[0].score >= pair[1].score);
    }
    assert!(got.iter().all(|p| p.sents_per_passage == 1));
    assert_eq!(search.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn drops_failed_scrapes_pdfs_and_error_statuses_before_capping() {
    let search = StaticSearch::new(&[
        "https://dead",
        "https://x/file.pdf",
        "https://gone",
        "https://a",
        "https://b",
        "https://c",
    ]);
    let fetcher = MapFetcher::new(&[
        ("https://x/file.pdf", 200, BULLS),
        ("https://gone", 404, BULLS),
        ("https://a", 200, BULLS),
        ("https://b", 200, LAKERS),
        ("https://c", 200, NOISE),
    ]);
    let pool = pool();
    let retriever = Retriever {
        search: &search,
        fetcher: &fetcher,
        scorer: &TermOverlapScorer,
        pool: &pool,
        retry: RetryPolicy::immediate(1),
        options: RetrievalOptions {
            max_search_results_per_query: 2,
            ..options()
        },
    };

    let got = retriever.retrieve("Jordan");
    let mut urls: Vec<&str> = got.iter().map(|p| p.url.as_str()).collect();
    urls.sort();
    assert_eq!(urls, vec!["https://a", "https://b"]);
}

#[test]
fn keeps_top_passages_per_result() {
    let search = StaticSearch::new(&["https://b"]);
    let fetcher = MapFetcher::new(&[("https://b", 200, BULLS)]);
    let pool = pool();
    let retriever = Retriever {
        search: &search,
        fetcher: &fetcher,
        scorer: &TermOverlapScorer,
        pool: &pool,
        retry: RetryPolicy::immediate(1),
        options: RetrievalOptions {
            max_passages_per_search_result: 5,
            ..options()
        },
    };

    let got = retriever.retrieve("Chicago Bulls");
    assert_eq!(got.len(), 2);
    assert_eq!(got[0].text, "Jordan played basketball for the Chicago Bulls.");
    assert_eq!(got[1].text, "He won six titles.");
}

#[test]
fn backend_failures_degrade_to_empty() {
    let fetcher = MapFetcher::new(&[("https://b", 200, BULLS)]);
    let pool = pool();

    let down = Retriever {
        search: &DownSearch,
        fetcher: &fetcher,
        scorer: &TermOverlapScorer,
        pool: &pool,
        retry: RetryPolicy::immediate(2),
        options: options(),
    };
    assert!(down.retrieve("Bulls").is_empty());

    let search = StaticSearch::new(&["https://b"]);
    let unscored = Retriever {
        search: &search,
        fetcher: &fetcher,
        scorer: &FailingScorer,
        pool: &pool,
        retry: RetryPolicy::immediate(1),
        options: options(),
    };
    assert!(unscored.retrieve("Bulls").is_empty());
}

#[test]
fn seeded_randomization_is_reproducible() {
    let search = StaticSearch::new(&["https://b", "https://c"]);
    let fetcher = MapFetcher::new(&[("https://b", 200, BULLS), ("https://c", 200, LAKERS)]);
    let pool = pool();
    let retriever = Retriever {
        search: &search,
        fetcher: &fetcher,
        scorer: &TermOverlapScorer,
        pool: &pool,
        retry: RetryPolicy::immediate(1),
        options: RetrievalOptions {
            max_sentences_per_passage: 3,
            randomize_num_sentences: true,
            seed: Some(7),
            ..options()
        },
    };

    let first = retriever.retrieve("Jordan");
    let second = retriever.retrieve("Jordan");
    assert_eq!(first, second);
    assert!(first
        .iter()
        .all(|p| (1..=3).contains(&p.sents_per_passage)));
}
