use crv_core::domain::Evidence;
use crv_core::error::AppError;

use crate::llm::{Completer, CompletionRequest};
use crate::prompts::hallucination_prompt;
use crate::retry::RetryPolicy;

const HALLUCINATION_MAX_TOKENS: u32 = 256;
const HALLUCINATION_STOP: &[&str] = &["\n", "\n\n"];

/// Writes a plausible answer paragraph for a question, standing in for web evidence.
pub struct Hallucinator<'a> {
    completer: &'a dyn Completer,
    retry: RetryPolicy,
    model: &'a str,
}

impl<'a> Hallucinator<'a> {
    pub fn new(completer: &'a dyn Completer, retry: RetryPolicy, model: &'a str) -> Self {
        Self {
            completer,
            retry,
            model,
        }
    }

    pub fn hallucinate(&self, query: &str) -> Result<Evidence, AppError> {
        let prompt = hallucination_prompt(query);
        let req = CompletionRequest::new(self.model, &prompt)
            .temperature(0.0)
            .max_tokens(HALLUCINATION_MAX_TOKENS)
            .stop(HALLUCINATION_STOP);
        let text = self
            .retry
            .run("evidence hallucination", || self.completer.complete(&req))?;
        Ok(Evidence::new(text.trim(), query))
    }
}
