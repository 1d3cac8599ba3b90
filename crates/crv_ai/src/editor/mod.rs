use crv_core::error::AppError;
use crv_core::text::edit_ratio;

use crate::llm::{Completer, CompletionRequest};
use crate::prompts::{editor_prompt, FIX_MARKER};
use crate::retry::RetryPolicy;

const EDITOR_MAX_TOKENS: u32 = 512;
const EDITOR_STOP: &[&str] = &["\n\n"];

/// The revised claim after `My fix:` on the second line, or `None` when there is no second line
/// or it is empty.
pub fn parse_editor_response(response: &str) -> Option<String> {
    let lines: Vec<&str> = response.trim().split('\n').collect();
    if lines.len() < 2 {
        return None;
    }
    let fix = lines[1].rsplit(FIX_MARKER).next().unwrap_or(lines[1]).trim();
    (!fix.is_empty()).then(|| fix.to_string())
}

/// Accept `candidate` when its edit distance from `prior`, divided by the length of `prior`, is at
/// most `max_edit_ratio`.
pub fn accept_edit(prior: &str, candidate: &str, max_edit_ratio: f64) -> bool {
    edit_ratio(prior, candidate) <= max_edit_ratio
}

pub struct Editor<'a> {
    completer: &'a dyn Completer,
    retry: RetryPolicy,
    model: &'a str,
}

impl<'a> Editor<'a> {
    pub fn new(completer: &'a dyn Completer, retry: RetryPolicy, model: &'a str) -> Self {
        Self {
            completer,
            retry,
            model,
        }
    }

    /// Candidate rewrite of `claim` that agrees with `evidence`. `Ok(None)` means the answer could
    /// not be parsed and the claim should stay as it is.
    pub fn edit(
        &self,
        claim: &str,
        query: &str,
        evidence: &str,
        context: Option<&str>,
    ) -> Result<Option<String>, AppError> {
        let prompt = editor_prompt(claim, query, evidence, context);
        let req = CompletionRequest::new(self.model, &prompt)
            .temperature(0.0)
            .max_tokens(EDITOR_MAX_TOKENS)
            .stop(EDITOR_STOP);
        let text = self.retry.run("editor", || self.completer.complete(&req))?;

        let edit = parse_editor_response(&text);
        if edit.is_none() {
            log::warn!("editor response could not be parsed; keeping the claim");
        }
        Ok(edit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_fix_from_second_line() {
        let got = parse_editor_response(
            " the team in your statement is wrong.\n5. My fix: Michael Jordan played for the Chicago Bulls.",
        );
        assert_eq!(
            got.as_deref(),
            Some("Michael Jordan played for the Chicago Bulls.")
        );
    }

    #[test]
    fn short_or_empty_fix_is_none() {
        assert_eq!(parse_editor_response("only one line"), None);
        assert_eq!(parse_editor_response("reason\n5. My fix:   "), None);
    }

    #[test]
    fn guard_boundary_is_inclusive() {
        // One substitution over four chars.
        assert!(accept_edit("abcd", "abcx", 0.25));
        assert!(!accept_edit("abcd", "abcx", 0.24));
        assert!(accept_edit("abcd", "wxyz", 100.0));
    }
}
