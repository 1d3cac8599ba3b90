//! Attribution-set selection.
//!
//! Picks the evidence subset that maximizes question coverage: the sum over questions of the best
//! score any selected evidence achieves for it. The search is exhaustive over every subset of the
//! allowed sizes, which is `O(sum_k C(n, k))` objective evaluations. It is only tractable because
//! the size cap is bounded by `MAX_SELECTABLE_EVIDENCES`.

use std::collections::BTreeSet;

use crv_core::domain::{Evidence, SelectedEvidence};
use crv_core::error::AppError;

use crate::retrieve::scorer::RelevanceScorer;

/// Index combinations of `k` out of `n`, in lexicographic order.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    indices: Vec<usize>,
    first: bool,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            first: true,
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.first {
            self.first = false;
            return Some(self.indices.clone());
        }
        let k = self.indices.len();
        // Rightmost position that can still move right.
        let Some(i) = (0..k).rev().find(|&i| self.indices[i] != i + self.n - k) else {
            self.done = true;
            return None;
        };
        self.indices[i] += 1;
        for j in i + 1..k {
            self.indices[j] = self.indices[j - 1] + 1;
        }
        Some(self.indices.clone())
    }
}

/// `sum over questions of max over selected evidences`, for a `questions x evidences` matrix.
pub fn coverage_objective(score_matrix: &[Vec<f32>], selected: &[usize]) -> f64 {
    score_matrix
        .iter()
        .map(|row| {
            selected
                .iter()
                .map(|&j| f64::from(row[j]))
                .fold(f64::NEG_INFINITY, f64::max)
        })
        .sum()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub indices: Vec<usize>,
    pub objective: f64,
}

/// Best subset of the `num_evidences` columns.
///
/// Sizes run from `min_selected` up to `min(max_selected, num_evidences)`, where `min_selected`
/// is 1 with `prefer_fewer` and the upper bound otherwise. Within a size, combinations are tried
/// in index order and only a strictly better objective replaces the incumbent, so ties go to the
/// first subset found (and so to smaller subsets under `prefer_fewer`).
pub fn best_subset(
    score_matrix: &[Vec<f32>],
    num_evidences: usize,
    max_selected: usize,
    prefer_fewer: bool,
) -> Option<Selection> {
    if num_evidences == 0 || max_selected == 0 {
        return None;
    }
    let max_selected = max_selected.min(num_evidences);
    let min_selected = if prefer_fewer { 1 } else { max_selected };

    let mut best: Option<Selection> = None;
    for size in min_selected..=max_selected {
        for combo in Combinations::new(num_evidences, size) {
            let objective = coverage_objective(score_matrix, &combo);
            let better = match &best {
                Some(b) => objective > b.objective,
                None => !objective.is_nan(),
            };
            if better {
                best = Some(Selection {
                    indices: combo,
                    objective,
                });
            }
        }
    }
    best
}

/// Distill the evidence pool into an attribution set.
///
/// Questions and evidence texts are de-duplicated and sorted before scoring. The result follows
/// the sorted pool order.
pub fn select_evidences(
    questions: &[String],
    evidences: &[Evidence],
    scorer: &dyn RelevanceScorer,
    max_selected: usize,
    prefer_fewer: bool,
) -> Result<Vec<SelectedEvidence>, AppError> {
    let questions: Vec<String> = questions
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let pool: Vec<String> = evidences
        .iter()
        .map(|e| e.text.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if pool.is_empty() {
        return Ok(Vec::new());
    }

    let mut matrix = Vec::with_capacity(questions.len());
    for q in &questions {
        let row = scorer.score(q, &pool)?;
        if row.len() != pool.len() {
            return Err(AppError::new("SCORER_FAILED", "Scorer returned wrong number of scores")
                .with_details(format!("expected={}; got={}", pool.len(), row.len())));
        }
        matrix.push(row);
    }

    let Some(best) = best_subset(&matrix, pool.len(), max_selected, prefer_fewer) else {
        return Ok(Vec::new());
    };
    log::debug!(
        "selected {} of {} evidences (objective {:.4})",
        best.indices.len(),
        pool.len(),
        best.objective
    );
    Ok(best
        .indices
        .into_iter()
        .map(|i| SelectedEvidence {
            text: pool[i].clone(),
        })
        .collect())
}
