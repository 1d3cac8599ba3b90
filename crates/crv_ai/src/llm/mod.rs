use std::collections::BTreeMap;

use crv_core::error::AppError;

/// One text-completion call. `token_bias` maps token ids to logit offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: &'a [&'a str],
    pub token_bias: BTreeMap<String, i32>,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(model: &'a str, prompt: &'a str) -> Self {
        Self {
            model,
            prompt,
            temperature: 0.0,
            max_tokens: 256,
            stop: &[],
            token_bias: BTreeMap::new(),
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn stop(mut self, stop: &'a [&'a str]) -> Self {
        self.stop = stop;
        self
    }

    pub fn bias(mut self, token: &str, offset: i32) -> Self {
        self.token_bias.insert(token.to_string(), offset);
        self
    }
}

pub trait Completer: Send + Sync {
    fn complete(&self, req: &CompletionRequest<'_>) -> Result<String, AppError>;
}

pub mod openai_llm;
