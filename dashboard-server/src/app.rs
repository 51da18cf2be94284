use crate::error::ServerError;
use crate::routes;
use crate::service::ResourceService;
use crate::state::ServerState;
use crate::store::Store;
use axum::Router;
use axum::response::Response;
use error_stack::{Report, ResultExt};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;
use sync_engine::config::{ConfigResult, InvalidConfig, env_parse};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{Span, debug, info};
use tracing_subscriber::EnvFilter;

const PORT: &str = "DASHBOARD_PORT";
const METRICS: &str = "DASHBOARD_METRICS";
const SEED: &str = "DASHBOARD_SEED";
const TOKEN: &str = "DASHBOARD_API_TOKEN";
const PROTECTED: &str = "DASHBOARD_PROTECTED";
pub const LOG: &str = "DASHBOARD_LOG";

const DEFAULT_PORT: u16 = 3001;

pub type AppResult<T> = Result<T, Report<ServerError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProperties {
    pub port: u16,
    pub metrics_enabled: bool,
    /// JSON file of `{ "<resource>": [records] }` loaded at startup.
    pub seed: Option<PathBuf>,
    pub token: Option<String>,
    /// `(resource, id)` pairs whose deletion fails with a conflict.
    pub protected: Vec<(String, String)>,
}

impl Default for ServerProperties {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            metrics_enabled: false,
            seed: None,
            token: None,
            protected: Vec::new(),
        }
    }
}

impl ServerProperties {
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            port: env_parse(PORT)?.unwrap_or(DEFAULT_PORT),
            metrics_enabled: env_parse(METRICS)?.unwrap_or(false),
            seed: std::env::var(SEED).ok().map(PathBuf::from),
            token: std::env::var(TOKEN).ok().filter(|t| !t.trim().is_empty()),
            protected: match std::env::var(PROTECTED) {
                Ok(raw) => parse_protected(&raw)?,
                Err(_) => Vec::new(),
            },
        })
    }
}

/// Loads `.env` (the one at `dotenv_path`, or the nearest one), then builds the log filter
/// from `log_var`. A failed `.env` load is handed back for logging once logging exists.
pub fn load_environment(
    dotenv_path: Option<&Path>,
    log_var: &str,
) -> (EnvFilter, Option<dotenv::Error>) {
    let loaded = match dotenv_path {
        Some(path) => dotenv::from_path(path),
        None => dotenv::dotenv().map(|_| ()),
    };
    (EnvFilter::from_env(log_var), loaded.err())
}

/// `pipelines:5,tickets:2`
fn parse_protected(raw: &str) -> ConfigResult<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once(':') {
            Some((resource, id)) if !resource.is_empty() && !id.is_empty() => {
                Ok((resource.to_string(), id.to_string()))
            }
            _ => Err(Report::new(InvalidConfig(PROTECTED))
                .attach(format!("expected 'resource:id', received '{pair}'"))),
        })
        .collect()
}

/// Builds the store from `properties` and the routes around it.
pub async fn build_routes(properties: &ServerProperties) -> AppResult<Router> {
    let mut store = Store::new();

    if let Some(seed) = &properties.seed {
        let raw = tokio::fs::read(seed)
            .await
            .change_context(ServerError)
            .attach_with(|| format!("reading seed file {}", seed.display()))?;
        let data: serde_json::Value = serde_json::from_slice(&raw)
            .change_context(ServerError)
            .attach_with(|| format!("parsing seed file {}", seed.display()))?;
        let loaded = store.seed(data).change_context(ServerError)?;
        info!("seeded {loaded} records from {}", seed.display());
    }

    for (resource, id) in &properties.protected {
        store.protect(resource, id).change_context(ServerError)?;
    }

    let service = ResourceService::new(store);
    let mut state = if properties.metrics_enabled {
        ServerState::new_with_metrics(service)
    } else {
        ServerState::new_without_metrics(service)
    };
    if let Some(token) = &properties.token {
        state = state.with_token(token.as_str());
    }

    debug!("building routes..");
    routes::build(state).inspect(|_| debug!("routes built"))
}

pub async fn run(routes: Router, properties: &ServerProperties) -> AppResult<()> {
    let listener = build_listener(properties.port).await?;

    info!(
        "starting up dashboard development server on port {}",
        listener.local_addr().change_context(ServerError)?.port()
    );

    serve_on(listener, routes).await
}

pub fn with_tracing(routes: Router) -> Router {
    routes.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http().on_response(
        |res: &Response, latency: Duration, _span: &Span| {
            info!("returned {} in {}ms", res.status(), latency.as_millis());
        },
    )))
}

pub async fn serve_on(listener: TcpListener, routes: Router) -> AppResult<()> {
    axum::serve(listener, with_tracing(routes))
        .await
        .change_context(ServerError)
}

async fn build_listener(port: u16) -> AppResult<TcpListener> {
    TcpListener::bind(std::net::SocketAddr::V4(SocketAddrV4::new(
        Ipv4Addr::UNSPECIFIED,
        port,
    )))
    .await
    .change_context(ServerError)
}
