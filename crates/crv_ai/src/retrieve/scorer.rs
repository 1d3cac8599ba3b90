use std::collections::BTreeSet;

use crv_core::error::AppError;

use super::similarity::{cosine_similarity, l2_norm};
use crate::embeddings::Embedder;

/// Relevance of passages to a query; one score per passage, higher is more relevant.
pub trait RelevanceScorer: Send + Sync {
    fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, AppError>;
}

fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Offline scorer: share of distinct query terms that appear in the passage.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermOverlapScorer;

impl RelevanceScorer for TermOverlapScorer {
    fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, AppError> {
        let q = terms(query);
        if q.is_empty() {
            return Ok(vec![0.0; passages.len()]);
        }
        Ok(passages
            .iter()
            .map(|p| {
                let p = terms(p);
                q.intersection(&p).count() as f32 / q.len() as f32
            })
            .collect())
    }
}

/// Cosine similarity between query and passage embeddings.
pub struct EmbeddingScorer<E: Embedder> {
    embedder: E,
    model: String,
}

impl<E: Embedder> EmbeddingScorer<E> {
    pub fn new(embedder: E, model: impl Into<String>) -> Self {
        Self {
            embedder,
            model: model.into(),
        }
    }
}

impl<E: Embedder> RelevanceScorer for EmbeddingScorer<E> {
    fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, AppError> {
        let qv = self.embedder.embed(&self.model, query)?;
        let qnorm = l2_norm(&qv);
        if qnorm == 0.0 {
            return Err(AppError::new("SCORER_FAILED", "Query embedding norm is zero"));
        }

        let mut out = Vec::with_capacity(passages.len());
        for p in passages {
            let v = self.embedder.embed(&self.model, p)?;
            if v.len() != qv.len() {
                return Err(AppError::new("SCORER_FAILED", "Embedding dims mismatch")
                    .with_details(format!("query_dims={}; passage_dims={}", qv.len(), v.len())));
            }
            let vnorm = l2_norm(&v);
            out.push(if vnorm == 0.0 {
                0.0
            } else {
                cosine_similarity(&qv, &v, qnorm, vnorm)
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockEmbedder;

    impl Embedder for MockEmbedder {
        fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
            if input.contains("bulls") {
                Ok(vec![1.0, 0.0])
            } else if input.is_empty() {
                Ok(vec![0.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }
    }

    #[test]
    fn term_overlap_is_case_insensitive_fraction() {
        let scores = TermOverlapScorer
            .score(
                "Who plays for the Bulls?",
                &["The BULLS play in Chicago.".to_string(), "Unrelated.".to_string()],
            )
            .expect("score");
        // Query terms: who, plays, for, the, bulls. Matches: the, bulls.
        assert_eq!(scores, vec![0.4, 0.0]);
    }

    #[test]
    fn embedding_scorer_ranks_by_cosine() {
        let scorer = EmbeddingScorer::new(MockEmbedder, "m");
        let scores = scorer
            .score("bulls", &["bulls roster".to_string(), "lakers".to_string(), String::new()])
            .expect("score");
        assert_eq!(scores, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn embedding_scorer_rejects_zero_query() {
        let scorer = EmbeddingScorer::new(MockEmbedder, "m");
        let err = scorer.score("", &["x".to_string()]).expect_err("zero norm");
        assert_eq!(err.code, "SCORER_FAILED");
    }
}
