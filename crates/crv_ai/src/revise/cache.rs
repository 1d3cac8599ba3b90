//! Pre-computed inputs that stand in for external calls when a claim is re-run.

use std::collections::BTreeMap;

use crv_core::domain::{AgreementGate, Evidence, RevisionResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Key of a cached agreement gate: SHA-256 over the length-prefixed claim, query and evidence,
/// so that shifting text between fields cannot collide.
pub fn gate_cache_key(claim: &str, query: &str, evidence: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [claim, query, evidence] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CachedInputs {
    pub questions: Option<Vec<String>>,
    /// Aligned with `questions`; replaces retrieval entirely.
    pub evidences_for_questions: Option<Vec<Vec<Evidence>>>,
    /// Keyed by `gate_cache_key`.
    pub agreement_gates: BTreeMap<String, AgreementGate>,
}

impl CachedInputs {
    /// Everything a finished result can replay: its questions, evidence and every gate decision.
    pub fn from_result(result: &RevisionResult) -> Self {
        let mut agreement_gates = BTreeMap::new();
        for rev in &result.revisions {
            let mut claim = rev.original_text.as_str();
            for ((evidence, gate), step) in rev
                .evidences
                .iter()
                .zip(&rev.agreement_gates)
                .zip(&rev.revision_steps)
            {
                agreement_gates.insert(
                    gate_cache_key(claim, &evidence.query, &evidence.text),
                    gate.clone(),
                );
                claim = step.text.as_str();
            }
        }
        Self {
            questions: Some(result.questions.clone()),
            evidences_for_questions: Some(result.evidences_for_questions.clone()),
            agreement_gates,
        }
    }

    pub fn gate(&self, claim: &str, query: &str, evidence: &str) -> Option<&AgreementGate> {
        if self.agreement_gates.is_empty() {
            return None;
        }
        self.agreement_gates
            .get(&gate_cache_key(claim, query, evidence))
    }
}
