use std::collections::BTreeSet;

use crate::llm::{Completer, CompletionRequest};
use crate::prompts::{question_prompt, QUESTION_MARKER};
use crate::retry::RetryPolicy;

const QGEN_MAX_TOKENS: u32 = 256;

/// Questions from every line carrying the `I googled:` marker, in response order.
/// Lines that leave nothing after the marker are ignored.
pub fn parse_questions(response: &str) -> Vec<String> {
    response
        .split('\n')
        .filter_map(|line| line.split(QUESTION_MARKER).nth(1))
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedQuestions {
    /// De-duplicated and sorted.
    pub questions: Vec<String>,
    pub rounds_failed: u32,
    pub rounds_empty: u32,
}

pub struct QuestionGenerator<'a> {
    completer: &'a dyn Completer,
    retry: RetryPolicy,
    model: &'a str,
}

impl<'a> QuestionGenerator<'a> {
    pub fn new(completer: &'a dyn Completer, retry: RetryPolicy, model: &'a str) -> Self {
        Self {
            completer,
            retry,
            model,
        }
    }

    /// Sample `num_rounds` completions and pool their questions.
    ///
    /// A round whose retries are exhausted contributes nothing; it is counted and logged but does
    /// not fail the call.
    pub fn generate(
        &self,
        claim: &str,
        context: Option<&str>,
        temperature: f32,
        num_rounds: u32,
    ) -> GeneratedQuestions {
        let prompt = question_prompt(claim, context);
        let req = CompletionRequest::new(self.model, &prompt)
            .temperature(temperature)
            .max_tokens(QGEN_MAX_TOKENS);

        let mut pooled: BTreeSet<String> = BTreeSet::new();
        let mut out = GeneratedQuestions::default();
        for round in 1..=num_rounds {
            match self.retry.run("question generation", || self.completer.complete(&req)) {
                Ok(text) => {
                    let parsed = parse_questions(text.trim());
                    if parsed.is_empty() {
                        log::warn!("question generation round {round} produced no parseable questions");
                        out.rounds_empty += 1;
                    }
                    pooled.extend(parsed);
                }
                Err(e) => {
                    log::warn!("question generation round {round} dropped: {e}");
                    out.rounds_failed += 1;
                }
            }
        }
        out.questions = pooled.into_iter().collect();
        out
    }
}
