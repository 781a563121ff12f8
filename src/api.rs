//! HTTP boundary

mod live;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{
    config::ServerConfig,
    errors::RescueRadarError,
    export::{Report, ReportRenderer},
    models::{ReadingPayload, UpsertOutcome},
    notify::Broadcaster,
    service::ReadingService,
};

/// Header carrying the shared write secret
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared application state, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub service: ReadingService,
    pub write_key: Arc<str>,
    pub notifier: Option<Broadcaster>,
    pub renderer: Option<Arc<dyn ReportRenderer>>,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(rename = "error")]
    pub message: String,
    #[serde(skip)]
    pub status: StatusCode,
}

impl From<RescueRadarError> for ApiError {
    fn from(err: RescueRadarError) -> Self {
        let status = match &err {
            RescueRadarError::ValidationError(_) => StatusCode::BAD_REQUEST,
            RescueRadarError::AuthError => StatusCode::UNAUTHORIZED,
            RescueRadarError::NotFound(_) => StatusCode::NOT_FOUND,
            RescueRadarError::FeatureUnavailableError(_) => StatusCode::SERVICE_UNAVAILABLE,
            RescueRadarError::RenderError(_) => {
                error!("Report export failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RescueRadarError::DatabaseError(e) => {
                error!("Database operation failed: {:?}", e);
                return ApiError {
                    message: "database error".to_string(),
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                };
            }
            _ => {
                error!("Request failed: {:?}", err);
                return ApiError {
                    message: "internal error".to_string(),
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                };
            }
        };

        ApiError {
            message: err.to_string(),
            status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct UpsertResponse {
    status: &'static str,
    #[serde(flatten)]
    outcome: UpsertOutcome,
}

/// Build the router with every route and layer
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    let protected = Router::new()
        .route("/api/v1/readings", post(create_reading))
        .route("/api/v1/readings/export/pdf", get(export_report))
        .route("/admin/init-db", post(init_db))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_write_key,
        ));

    Router::new()
        .route("/", get(home))
        .route("/api/v1/readings/all", get(all_readings))
        .route("/api/v1/readings/:victim_id", get(reading_by_victim))
        .route("/ws", get(live::live_updates))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<(), RescueRadarError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| RescueRadarError::ConfigurationError {
            message: format!("Invalid listen address: {}", e),
        })?;

    let listener = TcpListener::bind(addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

async fn require_write_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if provided != Some(state.write_key.as_ref()) {
        warn!(
            "Rejected {} {}: missing or wrong {}",
            request.method(),
            request.uri().path(),
            API_KEY_HEADER
        );
        return Err(RescueRadarError::AuthError.into());
    }

    Ok(next.run(request).await)
}

async fn home(State(state): State<AppState>) -> ApiResult<Html<String>> {
    let page = match state.service.latest().await? {
        None => "<h2>Rescue Radar API</h2><p>No readings yet.</p>".to_string(),
        Some(latest) => format!(
            "<h2>Rescue Radar API</h2><p>Latest distance: {:.1} cm</p><p>Victim: {} @ {} UTC</p>",
            latest.distance_cm,
            escape_html(&latest.victim_id),
            latest.timestamp.format("%Y-%m-%d %H:%M:%S%.6f")
        ),
    };
    Ok(Html(page))
}

async fn create_reading(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<UpsertResponse>> {
    let payload = ReadingPayload::from_slice(&body);
    let outcome = state.service.record(payload).await?;
    Ok(Json(UpsertResponse {
        status: "ok",
        outcome,
    }))
}

async fn all_readings(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let readings = state.service.recent().await?;
    Ok(Json(json!({ "readings": readings })))
}

async fn reading_by_victim(
    State(state): State<AppState>,
    Path(victim_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let reading = state.service.find(&victim_id).await?;
    Ok(Json(json!({ "reading": reading })))
}

async fn export_report(State(state): State<AppState>) -> ApiResult<Response> {
    let renderer = state.renderer.clone().ok_or_else(|| {
        RescueRadarError::FeatureUnavailableError("PDF export not available".to_string())
    })?;

    let readings = state.service.recent().await?;
    let report = Report::from_readings(&readings, Utc::now());
    let blocking_renderer = Arc::clone(&renderer);
    let document = tokio::task::spawn_blocking(move || blocking_renderer.render(&report))
        .await
        .map_err(|e| RescueRadarError::RenderError(e.to_string()))??;

    info!("Exported report with {} readings", readings.len());

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(renderer.content_type()),
    );
    let disposition = format!("attachment; filename={}", renderer.file_name());
    headers.insert(
        header::CONTENT_DISPOSITION,
        header::HeaderValue::from_str(&disposition)
            .map_err(|e| RescueRadarError::RenderError(e.to_string()))?,
    );
    Ok((headers, document).into_response())
}

async fn init_db(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.service.database().init_schema().await?;
    Ok(Json(json!({ "status": "ok" })))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
