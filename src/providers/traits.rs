use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{api} request failed: {source}")]
    Request {
        api: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{api} returned HTTP {status}: {body}")]
    Status {
        api: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{api} returned an unexpected response: {detail}")]
    UnexpectedResponse { api: &'static str, detail: String },

    #[error("invalid {api} endpoint '{url}'")]
    InvalidEndpoint { api: &'static str, url: String },
}

/// Third-party content APIs the relay forwards commands to.
///
/// Each method is a single request/response call. `Ok(None)` means the API
/// answered but had nothing usable; transport and decoding problems are
/// errors.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Free-text question answering.
    async fn ask(&self, sender: &str, query: &str) -> Result<String, ProviderError>;

    /// Answer `prompt` about the image at `image_url`.
    async fn analyze_image(
        &self,
        sender: &str,
        prompt: &str,
        image_url: &str,
    ) -> Result<Option<String>, ProviderError>;

    /// Look up a song and return a downloadable audio URL.
    async fn search_song(&self, query: &str) -> Result<Option<String>, ProviderError>;

    /// URL of an image generated from `prompt`.
    async fn generate_image(&self, prompt: &str) -> Result<String, ProviderError>;
}
