//! Query to ranked passages: search, scrape in parallel, chunk, score, normalize.

use std::cmp::Ordering;
use std::time::Duration;

use crv_core::config::PipelineConfig;
use crv_core::domain::Passage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::ThreadPool;
use sha2::{Digest, Sha256};

use crate::evidence::chunk_text;
use crate::retry::RetryPolicy;
use crate::scrape::{scrape_all, PageFetcher, ScrapedPage};
use crate::search::SearchEngine;

pub mod scorer;
pub mod similarity;

use scorer::RelevanceScorer;

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOptions {
    pub max_search_results_per_query: usize,
    pub max_passages_per_search_result_to_score: usize,
    pub max_passages_per_search_result: usize,
    pub max_sentences_per_passage: usize,
    pub sliding_distance: usize,
    pub filter_sentence_len: usize,
    pub randomize_num_sentences: bool,
    pub seed: Option<u64>,
    pub scrape_timeout: Duration,
}

impl RetrievalOptions {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            max_search_results_per_query: cfg.max_search_results_per_query,
            max_passages_per_search_result_to_score: cfg.max_passages_per_search_result_to_score,
            max_passages_per_search_result: cfg.max_passages_per_search_result,
            max_sentences_per_passage: cfg.max_sentences_per_passage,
            sliding_distance: cfg.sliding_distance,
            filter_sentence_len: cfg.filter_sentence_len,
            randomize_num_sentences: cfg.randomize_num_sentences,
            seed: cfg.seed,
            scrape_timeout: Duration::from_millis(cfg.scrape_timeout_ms),
        }
    }
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

pub struct Retriever<'a> {
    pub search: &'a dyn SearchEngine,
    pub fetcher: &'a dyn PageFetcher,
    pub scorer: &'a dyn RelevanceScorer,
    pub pool: &'a ThreadPool,
    pub retry: RetryPolicy,
    pub options: RetrievalOptions,
}

impl<'a> Retriever<'a> {
    /// Ranked passages for `query`, most relevant first, with softmax-normalized `score`s.
    ///
    /// Nothing here fails the caller: search, scrape and scoring problems shrink the result,
    /// possibly to empty.
    pub fn retrieve(&self, query: &str) -> Vec<Passage> {
        let urls = match self.retry.run("search", || self.search.search(query)) {
            Ok(urls) => urls,
            Err(e) => {
                log::warn!("search failed for {query:?}; continuing without evidence: {e}");
                return Vec::new();
            }
        };
        if urls.is_empty() {
            return Vec::new();
        }

        let pages = scrape_all(self.pool, self.fetcher, &urls, self.options.scrape_timeout);
        self.rank_pages(query, pages)
    }

    /// Chunk, score and normalize already-scraped pages.
    pub fn rank_pages(&self, query: &str, pages: Vec<ScrapedPage>) -> Vec<Passage> {
        let opts = &self.options;
        let usable = pages
            .into_iter()
            .filter_map(|p| match p.text {
                Some(text) if !text.is_empty() && !p.url.contains(".pdf") => Some((p.url, text)),
                _ => None,
            })
            .take(opts.max_search_results_per_query);

        let mut kept: Vec<Passage> = Vec::new();
        for (url, text) in usable {
            let sents_per_passage = self.sentences_for(query, &url);
            let mut passages = chunk_text(
                &text,
                sents_per_passage,
                opts.filter_sentence_len,
                Some(opts.sliding_distance),
            );
            passages.truncate(opts.max_passages_per_search_result_to_score);
            if passages.is_empty() {
                continue;
            }

            let scores = match self.scorer.score(query, &passages) {
                Ok(s) if s.len() == passages.len() => s,
                Ok(s) => {
                    log::warn!(
                        "scorer returned {} scores for {} passages of {url}; skipping",
                        s.len(),
                        passages.len()
                    );
                    continue;
                }
                Err(e) => {
                    log::warn!("scoring failed for {url}; skipping: {e}");
                    continue;
                }
            };

            let mut scored: Vec<(String, f32)> = passages
                .into_iter()
                .zip(scores)
                .filter(|(_, s)| s.is_finite())
                .collect();
            sort_desc(&mut scored, |(_, s)| *s);
            kept.extend(
                scored
                    .into_iter()
                    .take(opts.max_passages_per_search_result)
                    .map(|(text, retrieval_score)| Passage {
                        text,
                        url: url.clone(),
                        query: query.to_string(),
                        sents_per_passage,
                        retrieval_score,
                        score: 0.0,
                    }),
            );
        }

        sort_desc(&mut kept, |p| p.retrieval_score);
        let raw: Vec<f32> = kept.iter().map(|p| p.retrieval_score).collect();
        for (p, prob) in kept.iter_mut().zip(similarity::softmax(&raw)) {
            p.score = prob;
        }
        log::debug!("retrieved {} passages for {query:?}", kept.len());
        kept
    }

    fn sentences_for(&self, query: &str, url: &str) -> usize {
        let max = self.options.max_sentences_per_passage.max(1);
        if !self.options.randomize_num_sentences {
            return max;
        }
        match self.options.seed {
            Some(seed) => {
                let digest = Sha256::digest(format!("{query}\n{url}").as_bytes());
                let mut salt = [0u8; 8];
                salt.copy_from_slice(&digest[..8]);
                StdRng::seed_from_u64(seed ^ u64::from_le_bytes(salt)).gen_range(1..=max)
            }
            None => rand::thread_rng().gen_range(1..=max),
        }
    }
}

/// Stable descending sort on a finite score.
fn sort_desc<T>(items: &mut [T], key: impl Fn(&T) -> f32) {
    items.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
}
