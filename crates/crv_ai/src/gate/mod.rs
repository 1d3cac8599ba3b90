use crv_core::domain::AgreementGate;
use crv_core::error::AppError;

use crate::llm::{Completer, CompletionRequest};
use crate::prompts::{agreement_gate_prompt, DECISION_MARKER};
use crate::retry::RetryPolicy;

const GATE_MAX_TOKENS: u32 = 256;
const GATE_STOP: &[&str] = &["\n\n"];
/// GPT end-of-text token; banned so the gate always writes a decision line.
const END_OF_TEXT_TOKEN: &str = "50256";

/// Reasoning on the first line, decision after `Therefore:` on the second.
/// Fewer than two lines gives the closed parse-failure gate.
pub fn parse_gate_response(response: &str) -> AgreementGate {
    let lines: Vec<&str> = response.trim().split('\n').collect();
    if lines.len() < 2 {
        return AgreementGate::parse_failure();
    }
    let decision_line = lines[1];
    let decision = decision_line
        .rsplit(DECISION_MARKER)
        .next()
        .unwrap_or(decision_line)
        .trim();
    AgreementGate {
        is_open: decision_line.contains("disagrees"),
        reason: lines[0].to_string(),
        decision: Some(decision.to_string()),
    }
}

pub struct AgreementChecker<'a> {
    completer: &'a dyn Completer,
    retry: RetryPolicy,
    model: &'a str,
}

impl<'a> AgreementChecker<'a> {
    pub fn new(completer: &'a dyn Completer, retry: RetryPolicy, model: &'a str) -> Self {
        Self {
            completer,
            retry,
            model,
        }
    }

    /// Does `evidence`, found for `query`, contradict `claim`? Retry exhaustion is returned as an
    /// error; an unparseable answer is not.
    pub fn check(
        &self,
        claim: &str,
        query: &str,
        evidence: &str,
        context: Option<&str>,
    ) -> Result<AgreementGate, AppError> {
        let prompt = agreement_gate_prompt(claim, query, evidence, context);
        let req = CompletionRequest::new(self.model, &prompt)
            .temperature(0.0)
            .max_tokens(GATE_MAX_TOKENS)
            .stop(GATE_STOP)
            .bias(END_OF_TEXT_TOKEN, -100);
        let text = self
            .retry
            .run("agreement gate", || self.completer.complete(&req))?;

        let gate = parse_gate_response(&text);
        if gate.is_parse_failure() {
            log::warn!("agreement gate response could not be parsed; treating gate as closed");
        }
        Ok(gate)
    }
}
