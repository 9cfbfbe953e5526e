use crate::channel::Backoff;
use crate::session::Credential;
use marketchat_messaging::ListingId;
use std::env;
use std::time::Duration;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid url: {source}")]
    InvalidUrl {
        var: &'static str,
        source: url::ParseError,
    },
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("cannot derive a websocket url from {0}")]
    UnsupportedScheme(Url),
}

/// Runtime configuration for the chat client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base url of the REST API.
    pub api_url: Url,
    /// Base url of the real-time endpoint.
    pub ws_url: Url,
    pub backoff: Backoff,
    /// Two messages from the same sender with the same text this close
    /// together are treated as one exchange.
    pub dedupe_window: Duration,
    pub http_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_url: Url) -> Result<Self, ConfigError> {
        Ok(Self {
            ws_url: websocket_url(&api_url)?,
            api_url,
            backoff: Backoff::default(),
            dedupe_window: Duration::from_millis(1000),
            http_timeout: Duration::from_secs(10),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_api = env::var("MARKETCHAT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let mut config = Self::new(parse_url("MARKETCHAT_API_URL", &raw_api)?)?;

        if let Ok(raw) = env::var("MARKETCHAT_WS_URL") {
            config.ws_url = parse_url("MARKETCHAT_WS_URL", &raw)?;
        }
        config.backoff = Backoff {
            base: millis_var("MARKETCHAT_BACKOFF_BASE_MS", config.backoff.base)?,
            cap: millis_var("MARKETCHAT_BACKOFF_CAP_MS", config.backoff.cap)?,
        };
        config.dedupe_window = millis_var("MARKETCHAT_DEDUPE_WINDOW_MS", config.dedupe_window)?;
        if let Some(secs) = number_var("MARKETCHAT_HTTP_TIMEOUT_SECS")? {
            config.http_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_dedupe_window(mut self, window: Duration) -> Self {
        self.dedupe_window = window;
        self
    }

    /// `GET {api}/chat/{listing}`
    pub fn history_url(&self, listing_id: ListingId) -> Url {
        join(&self.api_url, &["chat", &listing_id.to_string()])
    }

    /// `GET {api}/chat/messages`
    pub fn inbox_url(&self) -> Url {
        join(&self.api_url, &["chat", "messages"])
    }

    /// `{ws}/chat/ws/{listing}?token=...`
    pub fn channel_url(&self, listing_id: ListingId, credential: &Credential) -> Url {
        let mut url = join(&self.ws_url, &["chat", "ws", &listing_id.to_string()]);
        url.query_pairs_mut().append_pair("token", credential.expose());
        url
    }
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { var, source })
}

fn websocket_url(api_url: &Url) -> Result<Url, ConfigError> {
    let scheme = match api_url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(ConfigError::UnsupportedScheme(api_url.clone())),
    };
    let mut ws_url = api_url.clone();
    ws_url
        .set_scheme(scheme)
        .map_err(|_| ConfigError::UnsupportedScheme(api_url.clone()))?;
    Ok(ws_url)
}

fn join(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn number_var(var: &'static str) -> Result<Option<u64>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .map(Some)
            .ok_or(ConfigError::InvalidNumber { var, value }),
        Err(_) => Ok(None),
    }
}

fn millis_var(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    Ok(number_var(var)?.map(Duration::from_millis).unwrap_or(default))
}
