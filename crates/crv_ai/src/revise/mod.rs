//! Per-claim orchestration: questions, evidence per question, then the sequential gate/edit loop
//! and attribution selection.

use crv_core::config::{EvidenceSourceKind, PipelineConfig};
use crv_core::domain::{Evidence, RevisionRecord, RevisionResult, RevisionStats, RevisionStep};
use crv_core::error::AppError;
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::editor::{accept_edit, Editor};
use crate::evidence::select_evidences;
use crate::gate::AgreementChecker;
use crate::hallucinate::Hallucinator;
use crate::llm::Completer;
use crate::questions::QuestionGenerator;
use crate::retrieve::scorer::RelevanceScorer;
use crate::retrieve::{RetrievalOptions, Retriever};
use crate::retry::RetryPolicy;
use crate::scrape::PageFetcher;
use crate::search::SearchEngine;

pub mod cache;

pub use cache::{gate_cache_key, CachedInputs};

/// External collaborators, owned by the reviser.
pub struct Services {
    pub completer: Box<dyn Completer>,
    pub search: Box<dyn SearchEngine>,
    pub fetcher: Box<dyn PageFetcher>,
    pub scorer: Box<dyn RelevanceScorer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RevisionOutcome {
    pub result: RevisionResult,
    pub stats: RevisionStats,
}

pub struct Reviser {
    services: Services,
    config: PipelineConfig,
    retry: RetryPolicy,
    pool: ThreadPool,
}

impl Reviser {
    pub fn new(services: Services, config: PipelineConfig) -> Result<Self, AppError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.scrape_workers)
            .thread_name(|i| format!("crv-scrape-{i}"))
            .build()
            .map_err(|e| {
                AppError::new("CONFIG_INVALID", "Failed to build scrape worker pool")
                    .with_details(format!("workers={}; err={e}", config.scrape_workers))
            })?;
        Ok(Self {
            services,
            retry: RetryPolicy::from_config(&config),
            config,
            pool,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Revise one claim.
    ///
    /// Only completion failures that outlast the retry policy (gate, editor, hallucination) and
    /// invalid input end the run early. Every other failure degrades to fewer questions, less
    /// evidence or an unchanged claim.
    pub fn run(
        &self,
        claim: &str,
        context: Option<&str>,
        cached: &CachedInputs,
    ) -> Result<RevisionOutcome, AppError> {
        if claim.trim().is_empty() {
            return Err(AppError::new("CLAIM_EMPTY", "Claim must not be empty"));
        }
        let cfg = &self.config;
        let completer = self.services.completer.as_ref();
        let mut stats = RevisionStats::default();

        let questions = match &cached.questions {
            Some(q) => q.clone(),
            None => {
                let generated = QuestionGenerator::new(completer, self.retry, &cfg.model).generate(
                    claim,
                    context,
                    cfg.temperature_qgen,
                    cfg.num_rounds_qgen,
                );
                stats.qgen_rounds_failed = generated.rounds_failed;
                stats.qgen_parse_empty_rounds = generated.rounds_empty;
                generated.questions
            }
        };

        let evidences_for_questions = match &cached.evidences_for_questions {
            Some(evs) if evs.len() == questions.len() => evs.clone(),
            Some(evs) => {
                return Err(AppError::new(
                    "CLAIM_CACHE_INVALID",
                    "Cached evidence does not line up with the questions",
                )
                .with_details(format!(
                    "questions={}; evidence_lists={}",
                    questions.len(),
                    evs.len()
                )))
            }
            None => self.gather_evidence(&questions)?,
        };

        let used: Vec<Evidence> = evidences_for_questions
            .iter()
            .flat_map(|evs| evs.iter().take(cfg.max_evidences_per_question).cloned())
            .collect();

        let record = self.revise_sequentially(claim, context, used, cached, &mut stats)?;

        let selected_evidences = match select_evidences(
            &questions,
            &record.evidences,
            self.services.scorer.as_ref(),
            cfg.max_selected_evidences,
            cfg.prefer_fewer,
        ) {
            Ok(selected) => selected,
            Err(e) => {
                log::warn!("evidence selection failed; no attribution for this claim: {e}");
                Vec::new()
            }
        };

        log::info!(
            "revised claim: questions={} evidences={} gates_opened={} edits_applied={} selected={}",
            questions.len(),
            record.evidences.len(),
            stats.gates_opened,
            stats.edits_applied,
            selected_evidences.len()
        );

        Ok(RevisionOutcome {
            result: RevisionResult {
                text: claim.to_string(),
                questions,
                evidences_for_questions,
                revisions: vec![record],
                selected_evidences,
            },
            stats,
        })
    }

    fn gather_evidence(&self, questions: &[String]) -> Result<Vec<Vec<Evidence>>, AppError> {
        match self.config.evidence_source {
            EvidenceSourceKind::Search => {
                let retriever = Retriever {
                    search: self.services.search.as_ref(),
                    fetcher: self.services.fetcher.as_ref(),
                    scorer: self.services.scorer.as_ref(),
                    pool: &self.pool,
                    retry: self.retry,
                    options: RetrievalOptions::from_config(&self.config),
                };
                // Queries share no state, so they are retrieved concurrently; order follows `questions`.
                Ok(self.pool.install(|| {
                    questions
                        .par_iter()
                        .map(|q| {
                            retriever
                                .retrieve(q)
                                .into_iter()
                                .map(Evidence::from)
                                .collect::<Vec<_>>()
                        })
                        .collect()
                }))
            }
            EvidenceSourceKind::Hallucinated => {
                let hallucinator = Hallucinator::new(
                    self.services.completer.as_ref(),
                    self.retry,
                    &self.config.model,
                );
                questions
                    .iter()
                    .map(|q| hallucinator.hallucinate(q).map(|ev| vec![ev]))
                    .collect()
            }
        }
    }

    /// The gate/edit loop. Strictly in order: each step sees the claim the previous one produced.
    fn revise_sequentially(
        &self,
        original: &str,
        context: Option<&str>,
        evidences: Vec<Evidence>,
        cached: &CachedInputs,
        stats: &mut RevisionStats,
    ) -> Result<RevisionRecord, AppError> {
        let cfg = &self.config;
        let completer = self.services.completer.as_ref();
        let checker = AgreementChecker::new(completer, self.retry, &cfg.model);
        let editor = Editor::new(completer, self.retry, &cfg.model);

        let mut claim = original.to_string();
        let mut agreement_gates = Vec::with_capacity(evidences.len());
        let mut revision_steps = Vec::with_capacity(evidences.len());

        for ev in &evidences {
            let gate = match cached.gate(&claim, &ev.query, &ev.text) {
                Some(g) => {
                    stats.gate_cache_hits += 1;
                    g.clone()
                }
                None => checker.check(&claim, &ev.query, &ev.text, context)?,
            };
            if gate.is_parse_failure() {
                stats.gate_parse_failures += 1;
            }

            if gate.is_open {
                stats.gates_opened += 1;
                match editor.edit(&claim, &ev.query, &ev.text, context)? {
                    Some(edit) if accept_edit(&claim, &edit, cfg.max_edit_ratio) => {
                        stats.edits_applied += 1;
                        claim = edit;
                    }
                    Some(_) => {
                        log::info!(
                            "edit rejected: change ratio above {} for query {:?}",
                            cfg.max_edit_ratio,
                            ev.query
                        );
                        stats.edits_rejected_by_ratio += 1;
                    }
                    None => stats.editor_parse_failures += 1,
                }
            }

            agreement_gates.push(gate);
            revision_steps.push(RevisionStep { text: claim.clone() });
        }

        Ok(RevisionRecord {
            original_text: original.to_string(),
            revised_text: claim,
            evidences,
            agreement_gates,
            revision_steps,
        })
    }
}
