use std::collections::BTreeMap;
use std::time::Duration;

use crv_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::{Completer, CompletionRequest};
use crate::client::{http_error, ApiClient};

#[derive(Debug, Clone)]
pub struct OpenAiCompleter {
    client: ApiClient,
    timeout: Duration,
}

impl OpenAiCompleter {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "no_stop")]
    stop: &'a [&'a str],
    #[serde(skip_serializing_if = "no_bias")]
    logit_bias: &'a BTreeMap<String, i32>,
}

fn no_stop(stop: &&[&str]) -> bool {
    stop.is_empty()
}

fn no_bias(bias: &&BTreeMap<String, i32>) -> bool {
    bias.is_empty()
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

impl Completer for OpenAiCompleter {
    fn complete(&self, req: &CompletionRequest<'_>) -> Result<String, AppError> {
        let body = CompletionBody {
            model: req.model,
            prompt: req.prompt,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            stop: req.stop,
            logit_bias: &req.token_bias,
        };
        let payload = serde_json::to_value(&body).map_err(|e| {
            AppError::new("COMPLETION_FAILED", "Failed to encode completion request")
                .with_details(e.to_string())
        })?;

        let http = ureq::post(&self.client.endpoint("completions")).timeout(self.timeout);
        let resp = self
            .client
            .authorize(http)
            .send_json(payload)
            .map_err(|e| http_error("COMPLETION_FAILED", "Completion request failed", e))?;

        let v: CompletionResponse = resp.into_json().map_err(|e| {
            AppError::new("COMPLETION_FAILED", "Failed to decode completion response")
                .with_details(e.to_string())
                .with_retryable(true)
        })?;
        // An empty completion is a valid answer; callers treat it as unparseable.
        v.choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| {
                AppError::new("COMPLETION_FAILED", "Completion response had no choices")
                    .with_retryable(true)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_omits_empty_stop_and_bias() {
        let bias = BTreeMap::new();
        let body = CompletionBody {
            model: "m",
            prompt: "p",
            temperature: 0.0,
            max_tokens: 256,
            stop: &[],
            logit_bias: &bias,
        };
        let v = serde_json::to_value(&body).expect("encode");
        assert!(v.get("stop").is_none());
        assert!(v.get("logit_bias").is_none());
    }

    #[test]
    fn body_carries_gate_settings() {
        let req = CompletionRequest::new("m", "p")
            .stop(&["\n\n"])
            .bias("50256", -100);
        let body = CompletionBody {
            model: req.model,
            prompt: req.prompt,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            stop: req.stop,
            logit_bias: &req.token_bias,
        };
        let v = serde_json::to_value(&body).expect("encode");
        assert_eq!(v["stop"][0], "\n\n");
        assert_eq!(v["logit_bias"]["50256"], -100);
        assert_eq!(v["max_tokens"], 256);
    }

    #[test]
    fn missing_choice_text_decodes_as_empty() {
        let v: CompletionResponse =
            serde_json::from_str(r#"{"choices":[{"index":0}]}"#).expect("decode");
        assert_eq!(v.choices[0].text, "");
    }
}
