use super::traits::{ContentProvider, ProviderError};
use crate::config::ProvidersConfig;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

const QA_API: &str = "text Q&A";
const VISION_API: &str = "vision";
const SONG_API: &str = "song search";
const IMAGINE_API: &str = "image generation";

/// `ContentProvider` over plain HTTP GET endpoints returning JSON.
#[derive(Clone)]
pub struct HttpContentProvider {
    client: reqwest::Client,
    endpoints: ProvidersConfig,
}

impl HttpContentProvider {
    pub fn new(client: reqwest::Client, endpoints: ProvidersConfig) -> Self {
        Self { client, endpoints }
    }

    fn endpoint(api: &'static str, base: &str, params: &[(&str, &str)]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(base.trim()).map_err(|_| ProviderError::InvalidEndpoint {
            api,
            url: base.to_string(),
        })?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    async fn get_json(&self, api: &'static str, url: Url) -> Result<Value, ProviderError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ProviderError::Request { api, source })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                api,
                status,
                body: crate::util::truncate_with_ellipsis(body.trim(), 200),
            });
        }
        resp.json::<Value>()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse {
                api,
                detail: e.to_string(),
            })
    }
}

/// The `response` field of a `{ "response": ... }` reply, stringified when it
/// is not already a string. Missing, null, and empty values yield `None`.
fn response_text(body: &Value) -> Option<String> {
    match body.get("response")? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl ContentProvider for HttpContentProvider {
    async fn ask(&self, sender: &str, query: &str) -> Result<String, ProviderError> {
        let url = Self::endpoint(QA_API, &self.endpoints.qa_url, &[("q", query), ("uid", sender)])?;
        let body = self.get_json(QA_API, url).await?;
        response_text(&body).ok_or_else(|| ProviderError::UnexpectedResponse {
            api: QA_API,
            detail: "missing 'response' field".to_string(),
        })
    }

    async fn analyze_image(
        &self,
        sender: &str,
        prompt: &str,
        image_url: &str,
    ) -> Result<Option<String>, ProviderError> {
        let url = Self::endpoint(
            VISION_API,
            &self.endpoints.vision_url,
            &[("q", prompt), ("uid", sender), ("imageUrl", image_url)],
        )?;
        let body = self.get_json(VISION_API, url).await?;
        Ok(response_text(&body))
    }

    async fn search_song(&self, query: &str) -> Result<Option<String>, ProviderError> {
        let url = Self::endpoint(SONG_API, &self.endpoints.song_search_url, &[("search", query)])?;
        let body = self.get_json(SONG_API, url).await?;
        Ok(body
            .get(0)
            .and_then(|first| first.get("download"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|link| !link.is_empty())
            .map(ToOwned::to_owned))
    }

    async fn generate_image(&self, prompt: &str) -> Result<String, ProviderError> {
        // The endpoint renders the image itself; the platform fetches it by URL.
        let url = Self::endpoint(IMAGINE_API, &self.endpoints.imagine_url, &[("prompt", prompt)])?;
        Ok(url.to_string())
    }
}
