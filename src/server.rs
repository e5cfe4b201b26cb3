use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::evaluation::history::{record_from_recommendation, summarize_timeline};
use crate::evaluation::{
    EvaluationRecord, MissingJobsPolicy, Scorecard, ThresholdConfig, TrainingModule,
};
use crate::metrics::collector::{apply_overrides, MetricOverrides};
use crate::metrics::normalize::normalize;
use crate::metrics::sessions::SessionInference;
use crate::metrics::TechnicianMetrics;
use crate::notify::{
    build_sinks, dispatch, event_for_assignment, events_for_recommendation, NotificationEvent,
};
use crate::reports::snapshot::{snapshot_for, TechnicianSnapshot};
use crate::reports::{build_report, JobReport, ReportFilter};
use crate::roster::{sort_by_display_name, Technician};
use crate::source::export::ExportSource;
use crate::source::DashboardSource;
use crate::storage::ScorecardStore;
use crate::training::{
    assign_training, list_trainings, update_status, TrainingAssignment, TrainingError,
    TrainingStatus,
};

#[derive(Clone)]
struct ApiState {
    config: Config,
    db_path: PathBuf,
    export_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<TrainingError> for ApiError {
    fn from(error: TrainingError) -> Self {
        match error {
            TrainingError::NotNeeded | TrainingError::MissingAssigner => {
                Self::bad_request(error.to_string())
            }
            TrainingError::Store(inner) => Self::internal(inner),
        }
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Clone, Default, Deserialize)]
struct NormalizeRequest {
    daily: Option<Value>,
    fallback: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EvaluateRequest {
    technician: Option<String>,
    metrics: Option<TechnicianMetrics>,
    #[serde(default)]
    overrides: MetricOverrides,
    thresholds: Option<ThresholdConfig>,
    missing_jobs: Option<MissingJobsPolicy>,
    infer_from_sessions: Option<bool>,
    #[serde(default)]
    record: bool,
    #[serde(default)]
    notify: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TechnicianQuery {
    search: Option<String>,
    sort: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AssignRequest {
    technician: String,
    assigned_by: Option<String>,
    #[serde(default)]
    overrides: MetricOverrides,
}

#[derive(Debug, Clone, Deserialize)]
struct StatusUpdateRequest {
    status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
    module: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct StatusUpdateResponse {
    id: i64,
    status: TrainingStatus,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    summary: String,
    records: Vec<EvaluationRecord>,
}

#[derive(Debug, Serialize)]
struct ReportResponse {
    report: JobReport,
    snapshot: TechnicianSnapshot,
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let state = ApiState {
        db_path: config.resolved_db_path(),
        export_path: config.resolved_export_path(),
        config,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/config", get(show_config))
        .route("/v1/normalize", post(normalize_metrics))
        .route("/v1/evaluate", post(evaluate))
        .route("/v1/technicians", get(technicians))
        .route("/v1/technicians/:uid/scorecard", get(scorecard))
        .route("/v1/trainings", post(assign))
        .route("/v1/trainings/:uid", get(trainings))
        .route("/v1/assignments/:id/status", post(training_status))
        .route("/v1/history/:uid", get(history))
        .route("/v1/report", post(report))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse { status: "ok" })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config.redacted())
}

async fn normalize_metrics(Json(request): Json<NormalizeRequest>) -> ApiResult<TechnicianMetrics> {
    Ok(ok(normalize(
        request.daily.as_ref(),
        request.fallback.as_ref(),
    )))
}

async fn evaluate(
    State(state): State<ApiState>,
    Json(request): Json<EvaluateRequest>,
) -> ApiResult<Scorecard> {
    let thresholds = resolve_thresholds(&state.config, &request);
    let card = match request.technician.as_deref().map(str::trim) {
        Some(uid) if !uid.is_empty() => {
            let source = open_source(&state)?;
            let inference = resolve_inference(&state.config, request.infer_from_sessions);
            Scorecard::collect(
                &source,
                uid,
                &thresholds,
                inference.as_ref(),
                &request.overrides,
            )
            .await
            .map_err(ApiError::internal)?
        }
        _ => {
            if request.metrics.is_none() && request.overrides.is_empty() {
                return Err(ApiError::bad_request(
                    "either technician or metrics is required",
                ));
            }
            let mut metrics = request.metrics.clone().unwrap_or_default();
            apply_overrides(&mut metrics, &request.overrides);
            Scorecard::build(None, None, metrics, &thresholds)
        }
    };

    if request.record {
        let Some(uid) = card.technician_uid.as_deref() else {
            return Err(ApiError::bad_request(
                "recording an evaluation requires a technician",
            ));
        };
        let store = open_store(&state)?;
        store
            .insert_evaluation(&record_from_recommendation(uid, &card.recommendation))
            .map_err(ApiError::internal)?;
    }
    if request.notify {
        let events = events_for_recommendation(
            card.label(),
            &card.recommendation,
            &state.config.notifications.rules,
        );
        notify(&state, &events).await;
    }

    Ok(ok(card))
}

async fn technicians(
    State(state): State<ApiState>,
    Query(query): Query<TechnicianQuery>,
) -> ApiResult<Vec<Technician>> {
    let source = open_source(&state)?;
    let mut roster = source.technicians().await.map_err(ApiError::internal)?;
    if let Some(search) = query.search.as_deref() {
        roster.retain(|tech| tech.matches_search(search));
    }
    if query
        .sort
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("name"))
    {
        sort_by_display_name(&mut roster);
    }
    Ok(ok(roster))
}

async fn scorecard(
    State(state): State<ApiState>,
    Path(uid): Path<String>,
) -> ApiResult<Scorecard> {
    let source = open_source(&state)?;
    let card = Scorecard::collect(
        &source,
        &uid,
        &state.config.thresholds,
        state.config.session_inference().as_ref(),
        &MetricOverrides::default(),
    )
    .await
    .map_err(ApiError::internal)?;
    Ok(ok(card))
}

async fn assign(
    State(state): State<ApiState>,
    Json(request): Json<AssignRequest>,
) -> ApiResult<TrainingAssignment> {
    let uid = request.technician.trim();
    if uid.is_empty() {
        return Err(ApiError::bad_request("technician is required"));
    }
    let source = open_source(&state)?;
    let card = Scorecard::collect(
        &source,
        uid,
        &state.config.thresholds,
        state.config.session_inference().as_ref(),
        &request.overrides,
    )
    .await
    .map_err(ApiError::internal)?;

    let assigned_by = request
        .assigned_by
        .unwrap_or_else(|| state.config.operator.uid.clone());
    let store = open_store(&state)?;
    let assignment = assign_training(&store, uid, &assigned_by, &card.recommendation)?;

    let events: Vec<NotificationEvent> =
        event_for_assignment(card.label(), &assignment, &state.config.notifications.rules)
            .into_iter()
            .collect();
    notify(&state, &events).await;

    Ok(ok(assignment))
}

async fn trainings(
    State(state): State<ApiState>,
    Path(uid): Path<String>,
) -> ApiResult<Vec<TrainingAssignment>> {
    let store = open_store(&state)?;
    let items = list_trainings(&store, &uid).map_err(ApiError::internal)?;
    Ok(ok(items))
}

async fn training_status(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(request): Json<StatusUpdateRequest>,
) -> ApiResult<StatusUpdateResponse> {
    let status = request
        .status
        .parse::<TrainingStatus>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let store = open_store(&state)?;
    if !update_status(&store, id, status).map_err(ApiError::internal)? {
        return Err(ApiError::not_found(format!("training {id} not found")));
    }
    Ok(ok(StatusUpdateResponse { id, status }))
}

async fn history(
    State(state): State<ApiState>,
    Path(uid): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let module = parse_module_filter(query.module.as_deref())?;
    let limit = query.limit.unwrap_or(50).max(1);
    let store = open_store(&state)?;
    let records = store
        .load_evaluations(&uid, limit)
        .map_err(ApiError::internal)?;
    let summary = summarize_timeline(&records, module);
    Ok(ok(HistoryResponse { summary, records }))
}

async fn report(
    State(state): State<ApiState>,
    Json(filter): Json<ReportFilter>,
) -> ApiResult<ReportResponse> {
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if from > to {
            return Err(ApiError::bad_request(format!("from {from} is after to {to}")));
        }
    }
    let source = open_source(&state)?;
    let jobs = source.jobs().await.map_err(ApiError::internal)?;
    let report = build_report(&jobs, &filter);
    let snapshot = snapshot_for(&source, &report)
        .await
        .map_err(ApiError::internal)?;
    Ok(ok(ReportResponse { report, snapshot }))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

fn open_store(state: &ApiState) -> std::result::Result<ScorecardStore, ApiError> {
    ScorecardStore::open(&state.db_path).map_err(ApiError::internal)
}

fn open_source(state: &ApiState) -> std::result::Result<ExportSource, ApiError> {
    ExportSource::open(&state.export_path).map_err(ApiError::internal)
}

fn resolve_thresholds(config: &Config, request: &EvaluateRequest) -> ThresholdConfig {
    let mut thresholds = request
        .thresholds
        .clone()
        .unwrap_or_else(|| config.thresholds.clone());
    if let Some(policy) = request.missing_jobs {
        thresholds.missing_jobs = policy;
    }
    thresholds
}

fn resolve_inference(config: &Config, requested: Option<bool>) -> Option<SessionInference> {
    match requested {
        Some(true) => Some(SessionInference::new(config.evaluation.shift_minutes)),
        Some(false) => None,
        None => config.session_inference(),
    }
}

fn parse_module_filter(
    raw: Option<&str>,
) -> std::result::Result<Option<TrainingModule>, ApiError> {
    raw.map(str::parse::<TrainingModule>)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

async fn notify(state: &ApiState, events: &[NotificationEvent]) {
    if events.is_empty() {
        return;
    }
    match build_sinks(&state.config.notifications) {
        Ok(sinks) => dispatch(&sinks, events).await,
        Err(err) => warn!("failed building notification sinks: {err}"),
    }
}
