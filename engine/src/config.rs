use error_stack::{Report, ResultExt};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub type ConfigResult<T> = Result<T, Report<InvalidConfig>>;

#[derive(Debug, thiserror::Error)]
#[error("{0} has an invalid value")]
pub struct InvalidConfig(pub &'static str);

const REQUEST_TIMEOUT_MS: &str = "DASHBOARD_REQUEST_TIMEOUT_MS";
const IDLE_GRACE_MS: &str = "DASHBOARD_IDLE_GRACE_MS";
const SWEEP_INTERVAL_MS: &str = "DASHBOARD_SWEEP_INTERVAL_MS";
const DEFAULT_PAGE_SIZE: &str = "DASHBOARD_DEFAULT_PAGE_SIZE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// How long a single network call may take before its entry turns into an error.
    pub request_timeout: Duration,
    /// How long an entry with no subscribers survives before [`crate::cache::RemoteCache::sweep`]
    /// may evict it.
    pub idle_grace: Duration,
    /// Interval of the background sweeper, if one is spawned.
    pub sweep_interval: Duration,
    pub default_page_size: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            idle_grace: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(30),
            default_page_size: 10,
        }
    }
}

impl SyncConfig {
    /// Reads overrides from the environment. Unset variables keep their defaults,
    /// set but unparsable ones are an error.
    pub fn from_env() -> ConfigResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            request_timeout: env_millis(REQUEST_TIMEOUT_MS)?.unwrap_or(defaults.request_timeout),
            idle_grace: env_millis(IDLE_GRACE_MS)?.unwrap_or(defaults.idle_grace),
            sweep_interval: env_millis(SWEEP_INTERVAL_MS)?.unwrap_or(defaults.sweep_interval),
            default_page_size: env_parse::<u64>(DEFAULT_PAGE_SIZE)?
                .filter(|size| *size > 0)
                .unwrap_or(defaults.default_page_size),
        })
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_idle_grace(mut self, idle_grace: Duration) -> Self {
        self.idle_grace = idle_grace;
        self
    }

    pub fn with_default_page_size(mut self, default_page_size: u64) -> Self {
        self.default_page_size = default_page_size;
        self
    }
}

fn env_millis(name: &'static str) -> ConfigResult<Option<Duration>> {
    Ok(env_parse::<u64>(name)?.map(Duration::from_millis))
}

pub fn env_parse<T>(name: &'static str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .change_context(InvalidConfig(name))
            .attach_with(|| format!("received '{raw}'"))
            .map(Some),
        Err(_) => {
            debug!("{name} not specified, going with default");
            Ok(None)
        }
    }
}
