//! Axum-based HTTP server with OpenAPI (utoipa) and Swagger UI
//!
//! Every report endpoint fetches the full sample set and recomputes its view;
//! the live status comes from the poller through a watch channel.

use crate::aggregate::HourlyMetric;
use crate::config::Config;
use crate::error::ChargeError;
use crate::report::{ReportAssembler, ReportOptions, owner_sessions};
use crate::sample::{SampleBatch, parse_samples};
use crate::source::SampleSource;
use crate::status::{LiveStatus, refine_for_viewer};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{IntoParams, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub samples: Arc<dyn SampleSource>,
    pub assembler: Arc<ReportAssembler>,
    pub status_rx: watch::Receiver<LiveStatus>,
}

impl AppState {
    async fn load_samples(&self) -> Result<SampleBatch, ApiError> {
        let document = self.samples.fetch_samples().await?;
        Ok(parse_samples(&document, self.assembler.tz())?)
    }
}

/// Error body `{"error": ...}`; failures to obtain samples answer 502
pub struct ApiError(ChargeError);

impl From<ChargeError> for ApiError {
    fn from(err: ChargeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            ref e if e.is_transport() => StatusCode::BAD_GATEWAY,
            ChargeError::Serialization { .. } => StatusCode::BAD_GATEWAY,
            ChargeError::Validation { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        crate::logging::get_logger("web").warn(&format!("Request failed ({}): {}", status, self.0));
        (status, Json(serde_json::json!({"error": self.0.to_string()}))).into_response()
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ReportParams {
    /// Scope the view to one owner (resident view)
    pub owner: Option<String>,
    /// Reference year for the hourly histogram and usage summary
    pub year: Option<i32>,
    /// Hourly histogram metric
    pub metric: Option<HourlyMetric>,
}

impl ReportParams {
    fn owner(&self) -> Option<&str> {
        self.owner.as_deref().filter(|o| !o.trim().is_empty())
    }

    fn options(&self) -> ReportOptions {
        ReportOptions {
            owner: self.owner().map(str::to_string),
            year: self.year,
            metric: self.metric.unwrap_or_default(),
            now: chrono::Utc::now(),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct StatusParams {
    /// Viewing resident; omit for the admin view
    pub owner: Option<String>,
}

#[utoipa::path(get, path = "/api/health", responses(
    (status = 200, description = "Service is healthy")
))]
pub(crate) async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "version": env!("APP_VERSION")}))
}

#[utoipa::path(get, path = "/api/report", params(ReportParams), responses(
    (status = 200, description = "Full report"),
    (status = 502, description = "Sample store unavailable")
))]
pub(crate) async fn report(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse, ApiError> {
    let batch = state.load_samples().await?;
    Ok(Json(state.assembler.assemble(&batch, &params.options())))
}

#[utoipa::path(get, path = "/api/report/monthly", params(ReportParams), responses(
    (status = 200, description = "Monthly buckets"),
    (status = 502, description = "Sample store unavailable")
))]
pub(crate) async fn report_monthly(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse, ApiError> {
    let batch = state.load_samples().await?;
    Ok(Json(state.assembler.monthly(&batch, params.owner())))
}

#[utoipa::path(get, path = "/api/report/yearly", params(ReportParams), responses(
    (status = 200, description = "Yearly buckets"),
    (status = 502, description = "Sample store unavailable")
))]
pub(crate) async fn report_yearly(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse, ApiError> {
    let batch = state.load_samples().await?;
    Ok(Json(state.assembler.yearly(&batch, params.owner())))
}

#[utoipa::path(get, path = "/api/report/hourly", params(ReportParams), responses(
    (status = 200, description = "Hour-of-day histogram"),
    (status = 502, description = "Sample store unavailable")
))]
pub(crate) async fn report_hourly(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse, ApiError> {
    let batch = state.load_samples().await?;
    Ok(Json(state.assembler.hourly(&batch, &params.options())))
}

#[utoipa::path(get, path = "/api/report/usage", params(ReportParams), responses(
    (status = 200, description = "Usage analytics"),
    (status = 502, description = "Sample store unavailable")
))]
pub(crate) async fn report_usage(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse, ApiError> {
    let batch = state.load_samples().await?;
    Ok(Json(state.assembler.usage(&batch, &params.options())))
}

#[utoipa::path(get, path = "/api/sessions", params(ReportParams), responses(
    (status = 200, description = "Measured sessions, newest first"),
    (status = 502, description = "Sample store unavailable")
))]
pub(crate) async fn sessions(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse, ApiError> {
    let batch = state.load_samples().await?;
    Ok(Json(state.assembler.sessions(&batch, params.owner())))
}

#[utoipa::path(get, path = "/api/sessions/{id}",
    params(("id" = String, Path, description = "Session identifier"), ReportParams),
    responses(
        (status = 200, description = "Session samples in time order with the session totals"),
        (status = 404, description = "No such session for this viewer"),
        (status = 502, description = "Sample store unavailable")
    )
)]
pub(crate) async fn session_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ReportParams>,
) -> Result<Response, ApiError> {
    let batch = state.load_samples().await?;
    match state.assembler.session_detail(&batch, &id, params.owner()) {
        Some(series) => Ok(Json(series).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("Session {} not found", id)})),
        )
            .into_response()),
    }
}

#[utoipa::path(get, path = "/api/status", params(StatusParams), responses(
    (status = 200, description = "Live station status")
))]
pub(crate) async fn status(
    State(state): State<AppState>,
    Query(params): Query<StatusParams>,
) -> impl IntoResponse {
    let current = state.status_rx.borrow().clone();
    let Some(owner) = params.owner.as_deref().filter(|o| !o.trim().is_empty()) else {
        return Json(current);
    };

    match state.load_samples().await {
        Ok(batch) => {
            let mine = owner_sessions(&batch.samples, owner);
            Json(refine_for_viewer(&current, Some(&mine)))
        }
        // Without the owner's sessions, fall back to the admin view
        Err(_) => Json(current),
    }
}

#[utoipa::path(get, path = "/api/events", responses(
    (status = 200, description = "Status updates (SSE)")
))]
pub(crate) async fn events(State(state): State<AppState>) -> impl IntoResponse {
    let stream = WatchStream::new(state.status_rx.clone())
        .map(|status| Event::default().event("status").json_data(status));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[utoipa::path(get, path = "/api/config", responses((status = 200)))]
pub(crate) async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(
        serde_json::to_value(&*state.config)
            .unwrap_or(serde_json::json!({"error":"serialization"})),
    )
}

#[utoipa::path(get, path = "/api/config/schema", responses((status = 200)))]
pub(crate) async fn get_config_schema() -> impl IntoResponse {
    let schema = schemars::schema_for!(crate::config::Config);
    Json(serde_json::to_value(&schema).unwrap_or(serde_json::json!({"error":"schema"})))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health, report, report_monthly, report_yearly, report_hourly, report_usage,
        sessions, session_detail, status, events, get_config, get_config_schema,
    ),
    components(schemas(HourlyMetric)),
    tags((name = "chargeapt", description = "Charge APT reporting API"))
)]
pub struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let openapi = ApiDoc::openapi();

    let router = Router::new()
        .route("/", get(|| async { Redirect::to("/docs") }))
        .route("/api/health", get(health))
        .route("/api/report", get(report))
        .route("/api/report/monthly", get(report_monthly))
        .route("/api/report/yearly", get(report_yearly))
        .route("/api/report/hourly", get(report_hourly))
        .route("/api/report/usage", get(report_usage))
        .route("/api/sessions", get(sessions))
        .route("/api/sessions/{id}", get(session_detail))
        .route("/api/status", get(status))
        .route("/api/events", get(events))
        .route("/api/config", get(get_config))
        .route("/api/config/schema", get(get_config_schema))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", openapi))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    #[cfg(feature = "compression")]
    let router = router.layer(tower_http::compression::CompressionLayer::new());

    router
}

/// Bind and serve until `shutdown` resolves
pub async fn serve<F>(state: AppState, host: &str, port: u16, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(state);

    let logger = crate::logging::get_logger("web");
    logger.info(&format!(
        "Starting web server; requested host={}, port={}",
        host, port
    ));

    let addr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
            ([127, 0, 0, 1], port).into()
        }
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{} (API /api, docs /docs)",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    logger.info("Web server stopped");
    Ok(())
}
