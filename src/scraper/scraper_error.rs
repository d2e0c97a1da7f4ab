use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Renderer API error (status {status}): {message}")]
    Render { status: u16, message: String },

    #[error("Navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("Malformed card: {0}")]
    MalformedCard(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for ScraperError {
    fn from(err: reqwest::Error) -> Self {
        ScraperError::Network(err.to_string())
    }
}
