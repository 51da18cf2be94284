use crate::auth;
use crate::error::{ServerError, ServiceError};
use crate::metrics;
use crate::service::ResourceService;
use crate::state::ServerState;
use crate::store::ListQuery;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response, Result};
use axum::routing::get;
use axum::{Json, Router};
use const_format::formatcp;
use dashboard_core::catalogue;
use error_stack::Report;
use responses::{Envelope, ErrorResponse};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, instrument};

pub mod responses;

const COLLECTION_PATH: &str = "/{resource}";
const RECORD_PATH: &str = formatcp!("{COLLECTION_PATH}/{{id}}");

pub fn build(state: ServerState) -> Result<Router, Report<ServerError>> {
    let main_router = Router::new()
        .route(COLLECTION_PATH, get(list_records).post(create_record))
        .route(
            RECORD_PATH,
            get(get_record).put(update_record).delete(delete_record),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    let router = if state.metrics_enabled {
        info!("metrics enabled, setting up metrics handler");
        let metrics_recorder = metrics::setup_recorder()?;
        main_router
            .route(metrics::METRICS_ROUTE, get(|| async move { metrics_recorder.render() }))
            .route_layer(middleware::from_fn(metrics::track_http))
    } else {
        info!("metrics not enabled, setting up service unavailable metrics handler");
        main_router.route(
            metrics::METRICS_ROUTE,
            get(|| async {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Metrics endpoint is disabled. Metrics must be enabled and the server restarted",
                )
            }),
        )
    };

    for path in catalogue::paths() {
        info!("serving /{path}");
    }

    Ok(router.fallback(unknown_route).with_state(state))
}

async fn unknown_route() -> ErrorResponse {
    ErrorResponse::new(StatusCode::NOT_FOUND, "no such route")
}

fn parse_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ErrorResponse> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ErrorResponse::bad_request(rejection.body_text()))
}

fn label_of(resource: &str) -> &'static str {
    catalogue::find(resource)
        .map(|e| e.descriptor().label())
        .unwrap_or("Record")
}

#[instrument(skip(service, params))]
async fn list_records(
    State(service): State<ResourceService>,
    Path(resource): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ServiceError> {
    let query = ListQuery::from_pairs(params)?;
    let page = service.list(&resource, query).await?;
    Ok(Envelope::page(page).into_response())
}

#[instrument(skip(service))]
async fn get_record(
    State(service): State<ResourceService>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Response, ServiceError> {
    let entity = service.get(&resource, &id).await?;
    Ok(Envelope::ok(entity).into_response())
}

#[instrument(skip(service, body))]
async fn create_record(
    State(service): State<ResourceService>,
    Path(resource): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    let entity = service.create(&resource, body).await?;
    Ok(Envelope::created(entity, label_of(&resource)).into_response())
}

#[instrument(skip(service, body))]
async fn update_record(
    State(service): State<ResourceService>,
    Path((resource, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = match parse_body(body) {
        Ok(body) => body,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    let entity = service.update(&resource, &id, body).await?;
    Ok(Envelope::updated(entity, label_of(&resource)).into_response())
}

#[instrument(skip(service))]
async fn delete_record(
    State(service): State<ResourceService>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Response, ServiceError> {
    let entity = service.delete(&resource, &id).await?;
    Ok(Envelope::deleted(entity, label_of(&resource)).into_response())
}
