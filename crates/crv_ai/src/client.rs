use std::time::Duration;

use crv_core::error::AppError;

/// Connection details for an OpenAI-compatible HTTP API (completions, embeddings).
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    api_key: Option<String>,
}

impl ApiClient {
    /// Accepts `http(s)://host[:port]` with an optional `/v1` path. The stored base always ends
    /// in `/v1`.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, AppError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let invalid = |why: &str| {
            AppError::new("COMPLETION_CONFIG_INVALID", "API base URL is invalid")
                .with_details(format!("base_url={trimmed}; reason={why}"))
        };

        let rest = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .ok_or_else(|| invalid("scheme must be http or https"))?;
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(invalid("missing host"));
        }
        // Reject userinfo so `https://api.example.com@evil.com` cannot slip through.
        if authority.contains('@') {
            return Err(invalid("userinfo is not allowed"));
        }
        if let Some((host, port)) = authority.rsplit_once(':') {
            if host.is_empty() {
                return Err(invalid("missing host"));
            }
            match port.parse::<u16>() {
                Ok(p) if p > 0 => {}
                _ => return Err(invalid("port must be within 1..=65535")),
            }
        }
        if !path.is_empty() && path != "/v1" {
            return Err(invalid("path must be empty or /v1"));
        }

        let scheme_len = trimmed.len() - rest.len();
        Ok(Self {
            base_url: format!("{}{}/v1", &trimmed[..scheme_len], authority),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn authorize(&self, req: ureq::Request) -> ureq::Request {
        match self.api_key.as_deref() {
            Some(key) => req.set("Authorization", &format!("Bearer {key}")),
            None => req,
        }
    }

    pub fn health_check(&self) -> Result<(), AppError> {
        let req = ureq::get(&self.endpoint("models")).timeout(Duration::from_secs(5));
        match self.authorize(req).call() {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(status, _)) => Err(AppError::new(
                "COMPLETION_UNHEALTHY",
                "Completion API health check failed",
            )
            .with_details(format!("status={status}"))
            .with_retryable(AppError::status_is_transient(status))),
            Err(e) => Err(AppError::new(
                "COMPLETION_UNREACHABLE",
                "Failed to reach completion API",
            )
            .with_details(e.to_string())
            .with_retryable(true)),
        }
    }
}

/// Map a ureq failure onto the crate error shape. Transport errors and transient statuses retry.
pub(crate) fn http_error(code: &str, message: &str, err: ureq::Error) -> AppError {
    match err {
        ureq::Error::Status(status, resp) => {
            let body = resp.into_string().unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            AppError::new(code, message)
                .with_details(format!("status={status}; body={snippet}"))
                .with_retryable(AppError::status_is_transient(status))
        }
        ureq::Error::Transport(t) => AppError::new(code, message)
            .with_details(t.to_string())
            .with_retryable(true),
    }
}
