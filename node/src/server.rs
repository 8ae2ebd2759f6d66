// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::extract::{Path, Request as AxumRequest, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::{DeleteResponse, HealthResponse, PutResponse};
use crate::errors::EngineError;
use crate::events::TransactionLogger;
use crate::service::KvService;

pub type SharedService<L> = Arc<KvService<L>>;

async fn auth_guard(
    State(token): State<Arc<String>>,
    req: AxumRequest,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.strip_prefix("Bearer "));

    match provided {
        Some(provided) if provided == token.as_str() => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

pub fn build_router<L: TransactionLogger>(
    service: SharedService<L>,
    auth_token: Option<String>,
) -> Router {
    let mut app = Router::new()
        .route(
            "/v1/key/:key",
            get(get_key::<L>).put(put_key::<L>).delete(delete_key::<L>),
        )
        .route("/v1/health", get(health::<L>))
        // Observability
        .route("/metrics", get(metrics_handler))
        .with_state(service);

    if let Some(token) = auth_token {
        tracing::info!("Auth Enabled: Bearer token required");
        app = app.layer(from_fn_with_state(Arc::new(token), auth_guard));
    } else {
        tracing::warn!("Auth Disabled: No token configured");
    }

    app.layer(TraceLayer::new_for_http())
}

async fn put_key<L: TransactionLogger>(
    State(service): State<SharedService<L>>,
    Path(key): Path<String>,
    value: String,
) -> Result<(StatusCode, Json<PutResponse>), EngineError> {
    service.put(&key, &value).await?;
    Ok((StatusCode::CREATED, Json(PutResponse { key, success: true })))
}

async fn get_key<L: TransactionLogger>(
    State(service): State<SharedService<L>>,
    Path(key): Path<String>,
) -> Result<String, EngineError> {
    service.get(&key)
}

async fn delete_key<L: TransactionLogger>(
    State(service): State<SharedService<L>>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>, EngineError> {
    service.delete(&key).await?;
    Ok(Json(DeleteResponse { key, success: true }))
}

async fn health<L: TransactionLogger>(State(service): State<SharedService<L>>) -> Response {
    let degraded = service.is_degraded();
    let body = Json(HealthResponse {
        status: if degraded { "degraded" } else { "ok" }.to_string(),
        last_sequence: service.logger().last_sequence(),
        keys: service.store().len(),
    });

    let status = if degraded {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, body).into_response()
}

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}
