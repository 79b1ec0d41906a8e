//! Runtime configuration.
//!
//! Layers, lowest precedence first: built-in defaults, an optional TOML file,
//! environment variables, then CLI flags (applied by `main`).

use crate::chunker::DEFAULT_MAX_MESSAGE_CHARS;
use crate::delivery::DEFAULT_CHUNK_INTERVAL_MS;
use crate::session::SESSION_CAPACITY_DEFAULT;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_GRAPH_API_URL: &str = "https://graph.facebook.com/v21.0";
pub const DEFAULT_QA_URL: &str = "https://kaiz-apis.gleeze.com/api/gpt-4o";
pub const DEFAULT_VISION_URL: &str = "https://kaiz-apis.gleeze.com/api/gemini-vision";
pub const DEFAULT_SONG_SEARCH_URL: &str = "https://hiroshi-api.onrender.com/tiktok/spotify";
pub const DEFAULT_IMAGINE_URL: &str = "https://kaiz-apis.gleeze.com/api/imagine";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PUBLIC_DIR: &str = "public";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub messenger: MessengerConfig,
    pub providers: ProvidersConfig,
    pub delivery: DeliveryConfig,
    pub session: SessionConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Directory served for any path the webhook routes don't claim.
    pub public_dir: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct MessengerConfig {
    /// Shared secret echoed back by the platform during webhook verification.
    pub verify_token: String,
    pub page_access_token: String,
    pub graph_api_url: String,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            verify_token: String::new(),
            page_access_token: String::new(),
            graph_api_url: DEFAULT_GRAPH_API_URL.to_string(),
        }
    }
}

impl fmt::Debug for MessengerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessengerConfig")
            .field("verify_token", &redact(&self.verify_token))
            .field("page_access_token", &redact(&self.page_access_token))
            .field("graph_api_url", &self.graph_api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub qa_url: String,
    pub vision_url: String,
    pub song_search_url: String,
    pub imagine_url: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            qa_url: DEFAULT_QA_URL.to_string(),
            vision_url: DEFAULT_VISION_URL.to_string(),
            song_search_url: DEFAULT_SONG_SEARCH_URL.to_string(),
            imagine_url: DEFAULT_IMAGINE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub max_message_chars: usize,
    pub chunk_interval_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            chunk_interval_ms: DEFAULT_CHUNK_INTERVAL_MS,
        }
    }
}

impl DeliveryConfig {
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub capacity: usize,
    /// Zero disables expiry.
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: SESSION_CAPACITY_DEFAULT,
            ttl_secs: 0,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout for every outbound request, in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Defaults, then `path` (if any), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply overrides from a key lookup. Blank values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("PAGERELAY_HOST") {
            self.gateway.host = v;
        }
        if let Some(v) = parse_value(&get, "PORT") {
            self.gateway.port = v;
        }
        if let Some(v) = get("PAGERELAY_PUBLIC_DIR") {
            self.gateway.public_dir = PathBuf::from(v);
        }

        if let Some(v) = get("VERIFY_TOKEN") {
            self.messenger.verify_token = v;
        }
        if let Some(v) = get("PAGE_ACCESS_TOKEN") {
            self.messenger.page_access_token = v;
        }
        if let Some(v) = get("PAGERELAY_GRAPH_API_URL") {
            self.messenger.graph_api_url = v;
        }

        if let Some(v) = get("PAGERELAY_QA_URL") {
            self.providers.qa_url = v;
        }
        if let Some(v) = get("PAGERELAY_VISION_URL") {
            self.providers.vision_url = v;
        }
        if let Some(v) = get("PAGERELAY_SONG_SEARCH_URL") {
            self.providers.song_search_url = v;
        }
        if let Some(v) = get("PAGERELAY_IMAGINE_URL") {
            self.providers.imagine_url = v;
        }

        if let Some(v) = parse_value(&get, "PAGERELAY_MAX_MESSAGE_CHARS") {
            self.delivery.max_message_chars = v;
        }
        if let Some(v) = parse_value(&get, "PAGERELAY_CHUNK_INTERVAL_MS") {
            self.delivery.chunk_interval_ms = v;
        }
        if let Some(v) = parse_value(&get, "PAGERELAY_SESSION_CAPACITY") {
            self.session.capacity = v;
        }
        if let Some(v) = parse_value(&get, "PAGERELAY_SESSION_TTL_SECS") {
            self.session.ttl_secs = v;
        }
        if let Some(v) = parse_value(&get, "PAGERELAY_HTTP_TIMEOUT_SECS") {
            self.http.timeout_secs = v;
        }
    }

    /// Reject configurations the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.messenger.verify_token.trim().is_empty() {
            anyhow::bail!("VERIFY_TOKEN is not set; webhook verification would always fail");
        }
        if self.messenger.page_access_token.trim().is_empty() {
            anyhow::bail!("PAGE_ACCESS_TOKEN is not set; replies cannot be delivered");
        }
        if self.delivery.max_message_chars == 0 {
            anyhow::bail!("max_message_chars must be greater than zero");
        }
        Ok(())
    }

    /// Human-readable summary with secrets redacted.
    pub fn summary(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(out, "listen:            {}:{}", self.gateway.host, self.gateway.port);
        let _ = writeln!(out, "public dir:        {}", self.gateway.public_dir.display());
        let _ = writeln!(out, "graph api:         {}", self.messenger.graph_api_url);
        let _ = writeln!(out, "verify token:      {}", redact(&self.messenger.verify_token));
        let _ = writeln!(out, "page access token: {}", redact(&self.messenger.page_access_token));
        let _ = writeln!(out, "q&a endpoint:      {}", self.providers.qa_url);
        let _ = writeln!(out, "vision endpoint:   {}", self.providers.vision_url);
        let _ = writeln!(out, "song endpoint:     {}", self.providers.song_search_url);
        let _ = writeln!(out, "imagine endpoint:  {}", self.providers.imagine_url);
        let _ = writeln!(
            out,
            "delivery:          {} chars/message, {} ms between segments",
            self.delivery.max_message_chars, self.delivery.chunk_interval_ms
        );
        let ttl = match self.session.ttl() {
            Some(ttl) => format!("{}s ttl", ttl.as_secs()),
            None => "no expiry".to_string(),
        };
        let _ = writeln!(out, "sessions:          {} senders, {ttl}", self.session.capacity);
        let _ = write!(out, "http timeout:      {}s", self.http.timeout_secs);
        out
    }
}

fn parse_value<T, G>(get: &G, key: &str) -> Option<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    let raw = get(key)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring {key}={raw:?}: not a valid number");
            None
        }
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "(unset)"
    } else {
        "****"
    }
}
