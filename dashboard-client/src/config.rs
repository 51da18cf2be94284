use error_stack::{Report, ResultExt};
use std::time::Duration;
use sync_engine::config::env_parse;
use tracing::info;

pub type ClientConfigResult<T> = Result<T, Report<MissingClientProperty>>;

#[derive(Debug, thiserror::Error)]
#[error("{0} client property not specified or invalid")]
pub struct MissingClientProperty(&'static str);

const DASHBOARD_API_URL: &str = "DASHBOARD_API_URL";
const DASHBOARD_API_TOKEN: &str = "DASHBOARD_API_TOKEN";
const DASHBOARD_REQUEST_TIMEOUT_MS: &str = "DASHBOARD_REQUEST_TIMEOUT_MS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Root of the REST api, e.g. `http://localhost:3001`. Resource paths are appended to it.
    pub api_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_token: None,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn from_env() -> ClientConfigResult<Self> {
        Ok(Self {
            api_url: std::env::var(DASHBOARD_API_URL)
                .change_context(MissingClientProperty(DASHBOARD_API_URL))?,
            api_token: std::env::var(DASHBOARD_API_TOKEN).ok().or_else(|| {
                info!("{DASHBOARD_API_TOKEN} not specified, requests go out unauthenticated");
                None
            }),
            request_timeout: env_parse::<u64>(DASHBOARD_REQUEST_TIMEOUT_MS)
                .change_context(MissingClientProperty(DASHBOARD_REQUEST_TIMEOUT_MS))?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TIMEOUT),
        })
    }
}
