use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Upper bound on the attribution set size. Evidence selection enumerates every subset up to this
/// size, so the bound keeps it tractable.
pub const MAX_SELECTABLE_EVIDENCES: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSourceKind {
    /// Web search, scrape, chunk and rank.
    Search,
    /// One completion-written paragraph per question.
    Hallucinated,
}

/// Every tunable of one pipeline run. Persisted next to the output as the run-arguments file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub model: String,
    pub temperature_qgen: f32,
    pub num_rounds_qgen: u32,

    pub max_search_results_per_query: usize,
    pub max_passages_per_search_result_to_score: usize,
    pub max_passages_per_search_result: usize,
    pub max_sentences_per_passage: usize,
    pub sliding_distance: usize,
    pub filter_sentence_len: usize,
    pub randomize_num_sentences: bool,
    pub seed: Option<u64>,
    pub scrape_timeout_ms: u64,
    pub scrape_workers: usize,

    pub max_evidences_per_question: usize,
    pub max_edit_ratio: f64,
    pub max_selected_evidences: usize,
    pub prefer_fewer: bool,
    pub evidence_source: EvidenceSourceKind,

    pub retry_max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: "text-davinci-003".to_string(),
            temperature_qgen: 0.7,
            num_rounds_qgen: 3,
            max_search_results_per_query: 3,
            max_passages_per_search_result_to_score: 30,
            max_passages_per_search_result: 1,
            max_sentences_per_passage: 5,
            sliding_distance: 1,
            filter_sentence_len: 250,
            randomize_num_sentences: false,
            seed: None,
            scrape_timeout_ms: 3000,
            scrape_workers: 8,
            max_evidences_per_question: 1,
            // Effectively unbounded: the edit-ratio guard is opt-in.
            max_edit_ratio: 100.0,
            max_selected_evidences: MAX_SELECTABLE_EVIDENCES,
            prefer_fewer: false,
            evidence_source: EvidenceSourceKind::Search,
            retry_max_attempts: 5,
            retry_backoff_ms: 2000,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new("CONFIG_READ_FAILED", "Failed to read config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        let cfg: Self = serde_json::from_str(&raw).map_err(|e| {
            AppError::new("CONFIG_INVALID", "Failed to decode config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Every rule violation, in field order. Empty means the config is usable.
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();

        if self.model.trim().is_empty() {
            out.push("model must not be empty".to_string());
        }
        if self.temperature_qgen.is_nan() || self.temperature_qgen < 0.0 {
            out.push(format!(
                "temperature_qgen must be >= 0 (got {})",
                self.temperature_qgen
            ));
        }
        for (field, value) in [
            ("num_rounds_qgen", self.num_rounds_qgen as usize),
            ("max_sentences_per_passage", self.max_sentences_per_passage),
            ("sliding_distance", self.sliding_distance),
            ("filter_sentence_len", self.filter_sentence_len),
            ("scrape_workers", self.scrape_workers),
            ("retry_max_attempts", self.retry_max_attempts as usize),
        ] {
            if value == 0 {
                out.push(format!("{field} must be >= 1"));
            }
        }
        if self.max_edit_ratio.is_nan() || self.max_edit_ratio < 0.0 {
            out.push(format!(
                "max_edit_ratio must be >= 0 (got {})",
                self.max_edit_ratio
            ));
        }
        if self.max_selected_evidences == 0 || self.max_selected_evidences > MAX_SELECTABLE_EVIDENCES {
            out.push(format!(
                "max_selected_evidences must be within 1..={MAX_SELECTABLE_EVIDENCES} (got {})",
                self.max_selected_evidences
            ));
        }

        out
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let problems = self.problems();
        if problems.is_empty() {
            return Ok(());
        }
        Err(AppError::new("CONFIG_INVALID", "Pipeline config is invalid").with_details(problems.join("; ")))
    }
}
