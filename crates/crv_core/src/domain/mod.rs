use serde::{Deserialize, Serialize};

/// A scored excerpt of a scraped page, produced by the retriever for one query.
///
/// `retrieval_score` is the raw relevance score; `score` is the softmax-normalized value over all
/// passages returned for the same query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passage {
    pub text: String,
    pub url: String,
    pub query: String,
    pub sents_per_passage: usize,
    pub retrieval_score: f32,
    #[serde(default)]
    pub score: f32,
}

/// Evidence consumed by the revision loop.
///
/// Retrieved evidence keeps the passage metadata; hallucinated evidence only has `text` and `query`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evidence {
    pub text: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sents_per_passage: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Evidence {
    pub fn new(text: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            query: query.into(),
            url: None,
            sents_per_passage: None,
            retrieval_score: None,
            score: None,
        }
    }
}

impl From<Passage> for Evidence {
    fn from(p: Passage) -> Self {
        Self {
            text: p.text,
            query: p.query,
            url: Some(p.url),
            sents_per_passage: Some(p.sents_per_passage),
            retrieval_score: Some(p.retrieval_score),
            score: Some(p.score),
        }
    }
}

/// Evidence kept in the final attribution set. The query is intentionally dropped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectedEvidence {
    pub text: String,
}

/// Outcome of checking one (claim, query, evidence) triple.
///
/// Invariant: `is_open` holds exactly when the parsed decision line says "disagrees".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgreementGate {
    pub is_open: bool,
    pub reason: String,
    pub decision: Option<String>,
}

impl AgreementGate {
    pub const PARSE_FAILURE_REASON: &'static str = "Failed to parse.";

    /// Closed gate recorded when the completion could not be parsed.
    pub fn parse_failure() -> Self {
        Self {
            is_open: false,
            reason: Self::PARSE_FAILURE_REASON.to_string(),
            decision: None,
        }
    }

    pub fn is_parse_failure(&self) -> bool {
        self.decision.is_none() && self.reason == Self::PARSE_FAILURE_REASON
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevisionStep {
    pub text: String,
}

/// One pass of the gate/edit loop. `evidences`, `agreement_gates` and `revision_steps` are index aligned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevisionRecord {
    pub original_text: String,
    pub revised_text: String,
    pub evidences: Vec<Evidence>,
    pub agreement_gates: Vec<AgreementGate>,
    pub revision_steps: Vec<RevisionStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevisionResult {
    pub text: String,
    pub questions: Vec<String>,
    pub evidences_for_questions: Vec<Vec<Evidence>>,
    pub revisions: Vec<RevisionRecord>,
    pub selected_evidences: Vec<SelectedEvidence>,
}

impl RevisionResult {
    /// Revised text of the last revision pass, or the original claim when there was none.
    pub fn revised_text(&self) -> &str {
        self.revisions
            .last()
            .map(|r| r.revised_text.as_str())
            .unwrap_or(self.text.as_str())
    }
}

/// Counters for local recoveries that would otherwise be silent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevisionStats {
    pub qgen_rounds_failed: u32,
    pub qgen_parse_empty_rounds: u32,
    pub gate_parse_failures: u32,
    pub gate_cache_hits: u32,
    pub gates_opened: u32,
    pub editor_parse_failures: u32,
    pub edits_rejected_by_ratio: u32,
    pub edits_applied: u32,
}

impl RevisionStats {
    /// Add another claim's counters to these, for run totals.
    pub fn merge(&mut self, other: &RevisionStats) {
        self.qgen_rounds_failed += other.qgen_rounds_failed;
        self.qgen_parse_empty_rounds += other.qgen_parse_empty_rounds;
        self.gate_parse_failures += other.gate_parse_failures;
        self.gate_cache_hits += other.gate_cache_hits;
        self.gates_opened += other.gates_opened;
        self.editor_parse_failures += other.editor_parse_failures;
        self.edits_rejected_by_ratio += other.edits_rejected_by_ratio;
        self.edits_applied += other.edits_applied;
    }

    /// Number of parse fallbacks and guard rejections, i.e. places where a response was ignored.
    pub fn fallbacks(&self) -> u32 {
        self.qgen_parse_empty_rounds
            + self.gate_parse_failures
            + self.editor_parse_failures
            + self.edits_rejected_by_ratio
    }
}
