pub mod client;
pub mod editor;
pub mod embeddings;
pub mod evidence;
pub mod gate;
pub mod hallucinate;
pub mod llm;
pub mod prompts;
pub mod questions;
pub mod retrieve;
pub mod retry;
pub mod revise;
pub mod scrape;
pub mod search;

#[cfg(test)]
mod tests {
    use super::client::ApiClient;

    #[test]
    fn api_base_url_is_normalized_to_v1() {
        let c = ApiClient::new("https://api.openai.com", None).expect("client");
        assert_eq!(c.base_url(), "https://api.openai.com/v1");
        let c = ApiClient::new("http://127.0.0.1:8080/v1/", Some("k".into())).expect("client");
        assert_eq!(c.base_url(), "http://127.0.0.1:8080/v1");
    }

    #[test]
    fn api_base_url_rejects_unsafe_forms() {
        assert!(ApiClient::new("ftp://example.com", None).is_err());
        assert!(ApiClient::new("https://", None).is_err());
        // Userinfo could redirect credentials to another host.
        assert!(ApiClient::new("https://api.openai.com@evil.com", None).is_err());
        assert!(ApiClient::new("http://127.0.0.1:", None).is_err());
        assert!(ApiClient::new("http://127.0.0.1:0", None).is_err());
        assert!(ApiClient::new("http://127.0.0.1:99999", None).is_err());
        assert!(ApiClient::new("https://api.openai.com/v2", None).is_err());
    }
}
