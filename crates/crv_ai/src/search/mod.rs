use crv_core::error::AppError;

/// Web search: ranked result URLs for a query.
pub trait SearchEngine: Send + Sync {
    fn search(&self, query: &str) -> Result<Vec<String>, AppError>;
}

pub mod bing;
