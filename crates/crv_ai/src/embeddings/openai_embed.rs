use std::time::Duration;

use crv_core::error::AppError;
use crv_core::text::truncate_bytes;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::client::{http_error, ApiClient};

/// Inputs past this many bytes are cut at the nearest char boundary below it.
pub const MAX_EMBED_INPUT_BYTES: usize = 12_000;

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: ApiClient,
}

impl OpenAiEmbedder {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let input = truncate_bytes(input, MAX_EMBED_INPUT_BYTES);
        let req = EmbeddingsRequest { model, input };
        let payload = serde_json::to_value(req).map_err(|e| {
            AppError::new("EMBEDDINGS_FAILED", "Failed to encode embeddings request")
                .with_details(e.to_string())
        })?;

        let http = ureq::post(&self.client.endpoint("embeddings")).timeout(Duration::from_secs(10));
        let resp = self
            .client
            .authorize(http)
            .send_json(payload)
            .map_err(|e| http_error("EMBEDDINGS_FAILED", "Failed to call embeddings endpoint", e))?;

        let v: EmbeddingsResponse = resp.into_json().map_err(|e| {
            AppError::new("EMBEDDINGS_FAILED", "Failed to decode embeddings response")
                .with_details(e.to_string())
        })?;
        match v.data.into_iter().next() {
            Some(item) if !item.embedding.is_empty() => Ok(item.embedding),
            _ => Err(AppError::new(
                "EMBEDDINGS_FAILED",
                "Embeddings response was empty",
            )),
        }
    }
}
