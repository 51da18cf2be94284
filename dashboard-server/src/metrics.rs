use crate::error::ServerError;
use axum::extract::{MatchedPath, Request};
use axum::http::header::CONTENT_LENGTH;
use axum::middleware::Next;
use axum::response::IntoResponse;
use error_stack::{Report, ResultExt};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tokio::time::Instant;

const RECORDS_LISTED_METRIC_NAME: &str = "dev_records_listed";
const RECORDS_CREATED_METRIC_NAME: &str = "dev_records_created";
const RECORDS_UPDATED_METRIC_NAME: &str = "dev_records_updated";
const RECORDS_DELETED_METRIC_NAME: &str = "dev_records_deleted";

const REQUESTS_TOTAL_METRIC_NAME: &str = "http_requests_total";
const REQUEST_DURATION_METRIC_NAME: &str = "http_requests_duration_seconds";
const REQUEST_SIZE_METRIC_NAME: &str = "http_request_size";

pub const METRICS_ROUTE: &str = "/metrics";

/// Installs the global Prometheus recorder. Only one can exist per process.
pub fn setup_recorder() -> Result<PrometheusHandle, Report<ServerError>> {
    const EXPONENTIAL_SECONDS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

    const REQ_RES_BUCKETS: &[f64] = &[128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0, 8192.0, 16384.0];

    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_METRIC_NAME.to_string()),
            EXPONENTIAL_SECONDS,
        )
        .change_context(ServerError)?
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_SIZE_METRIC_NAME.to_string()),
            REQ_RES_BUCKETS,
        )
        .change_context(ServerError)?
        .install_recorder()
        .change_context(ServerError)
        .attach("a metrics recorder is already installed")
}

/// Records count and latency per request, labelled with the resource the request addressed.
pub async fn track_http(req: Request, next: Next) -> impl IntoResponse {
    let Some(route) = req.extensions().get::<MatchedPath>().map(|p| p.as_str().to_owned()) else {
        return next.run(req).await;
    };
    if route == METRICS_ROUTE {
        return next.run(req).await;
    }

    // `/{resource}` routes collapse every resource into one label otherwise
    let resource = req
        .uri()
        .path()
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
        .to_owned();
    let method = req.method().to_string();

    if let Some(size) = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<f64>().ok())
    {
        metrics::histogram!(REQUEST_SIZE_METRIC_NAME, "resource" => resource.clone()).record(size);
    }

    let start = Instant::now();
    let response = next.run(req).await;

    let labels = [
        ("method", method),
        ("route", route),
        ("resource", resource),
        ("status", response.status().as_u16().to_string()),
    ];
    metrics::counter!(REQUESTS_TOTAL_METRIC_NAME, &labels).increment(1);
    metrics::histogram!(REQUEST_DURATION_METRIC_NAME, &labels).record(start.elapsed().as_secs_f64());
    response
}

#[inline]
pub fn increment_records_listed_by(amt: usize) {
    metrics::counter!(RECORDS_LISTED_METRIC_NAME).increment(u64::try_from(amt).unwrap_or(u64::MAX));
}

#[inline]
pub fn increment_records_created() {
    metrics::counter!(RECORDS_CREATED_METRIC_NAME).increment(1);
}

#[inline]
pub fn increment_records_updated() {
    metrics::counter!(RECORDS_UPDATED_METRIC_NAME).increment(1);
}

#[inline]
pub fn increment_records_deleted() {
    metrics::counter!(RECORDS_DELETED_METRIC_NAME).increment(1);
}
