// =============================================================================
// HTTP Front Door — Axum 0.7
// =============================================================================
//
// Routes:
//   GET  /          home page
//   GET  /login     redirect to the broker's hosted login
//   GET  /callback  broker redirect target; exchanges the request token
//   GET  /symbols   symbol autocomplete (JSON)
//   POST /analyse   candles → completion model → rendered result page
//   GET  /health    liveness + session summary (JSON)
//
// Business failures on `/analyse` are rendered inline with a 200 status. The
// callback answers failures with a bare JSON `{"error": ...}` object.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Form, Json, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::analysis;
use crate::api::auth::{CallbackRejection, RequestToken};
use crate::api::pages::{IndexView, ResultBody};
use crate::app_state::AppState;
use crate::error::AnalysisError;
use crate::types::Interval;

const FORM_DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Router construction
// =============================================================================

/// Build the full router with request tracing and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/symbols", get(symbols))
        .route("/analyse", post(analyse))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Home
// =============================================================================

async fn index(State(state): State<Arc<AppState>>) -> Response {
    state.pages.index(IndexView {
        app_name: &state.config.app_name,
        auth_state: state.session.auth_state(),
        exchange: state.directory.exchange(),
        instruments: state.directory.len(),
    })
}

// =============================================================================
// Login flow
// =============================================================================

async fn login(State(state): State<Arc<AppState>>) -> Redirect {
    state.session.begin_login();
    info!("redirecting to broker login");
    Redirect::temporary(&state.broker.login_url())
}

async fn callback(
    State(state): State<Arc<AppState>>,
    request_token: Result<RequestToken, CallbackRejection>,
) -> Response {
    let request_token = match request_token {
        Ok(RequestToken(token)) => token,
        Err(rejection) => {
            state.session.fail_login();
            return rejection.into_response();
        }
    };

    let access_token = match state.broker.exchange(&request_token).await {
        Ok(token) => token,
        Err(e) => {
            state.session.fail_login();
            let err = AnalysisError::RemoteAuth(e);
            warn!(error = %err, "request token exchange failed");
            return callback_error(err.to_string());
        }
    };

    state.session.set(access_token);

    // Instruments are reloaded with the new token before leaving the callback,
    // so `/symbols` is populated by the time the home page loads.
    if let Err(e) = state.refresh_instruments().await {
        warn!(error = %e, "instrument refresh after login failed");
        return callback_error(e.to_string());
    }

    Redirect::temporary("/").into_response()
}

fn callback_error(message: String) -> Response {
    Json(serde_json::json!({ "error": message })).into_response()
}

// =============================================================================
// Symbol search
// =============================================================================

#[derive(Deserialize)]
struct SymbolQuery {
    #[serde(default)]
    q: String,
}

async fn symbols(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SymbolQuery>,
) -> Json<Vec<String>> {
    Json(state.directory.search(&query.q))
}

// =============================================================================
// Analysis
// =============================================================================

/// Form posted by the home page. Fields are optional here so a missing one
/// is reported inline instead of as an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyseForm {
    #[serde(default)]
    pub stock: Option<String>,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

async fn analyse(State(state): State<Arc<AppState>>, Form(form): Form<AnalyseForm>) -> Response {
    let stock = form.stock.clone().unwrap_or_default();

    let body = match run_analysis(&state, form).await {
        Ok(html) => {
            info!(stock = %stock, "analysis rendered");
            ResultBody::Analysis(html)
        }
        Err(e) => {
            match &e {
                AnalysisError::RemoteAuth(_)
                | AnalysisError::RemoteData(_)
                | AnalysisError::RemoteCompletion(_) => {
                    warn!(stock = %stock, error = %e, "analysis failed")
                }
                _ => info!(stock = %stock, error = %e, "analysis request rejected"),
            }
            ResultBody::Error(e.user_message())
        }
    };

    state.pages.result(&state.config.app_name, &stock, body)
}

fn required(value: Option<String>, field: &'static str) -> Result<String, AnalysisError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AnalysisError::MissingField(field))
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, AnalysisError> {
    NaiveDate::parse_from_str(value, FORM_DATE_FORMAT).map_err(|_| AnalysisError::DateParse {
        field,
        value: value.to_string(),
    })
}

/// Inclusive day range as broker query bounds: start of `from`, end of `to`.
fn day_bounds(from: NaiveDate, to: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = from.and_time(NaiveTime::MIN);
    let end = to
        .and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| to.and_time(NaiveTime::MIN));
    (start, end)
}

/// Each step returns early with its own error kind; nothing reaches the
/// broker before the session and the symbol have been checked.
pub async fn run_analysis(state: &AppState, form: AnalyseForm) -> Result<String, AnalysisError> {
    let access_token = state.session.current_token()?;

    let stock = required(form.stock, "stock")?;
    let timeframe = required(form.timeframe, "timeframe")?;
    let start_date = required(form.start_date, "start_date")?;
    let end_date = required(form.end_date, "end_date")?;

    let instrument_token = state
        .directory
        .lookup(&stock)
        .ok_or_else(|| AnalysisError::InvalidSymbol(stock.clone()))?;

    let from = parse_date("start_date", &start_date)?;
    let to = parse_date("end_date", &end_date)?;
    if to < from {
        return Err(AnalysisError::InvalidDateRange {
            start: start_date,
            end: end_date,
        });
    }

    let interval: Interval = timeframe
        .parse()
        .map_err(|_| AnalysisError::InvalidTimeframe(timeframe.clone()))?;

    let (from, to) = day_bounds(from, to);
    let candles = state
        .broker
        .historical_data(&access_token, instrument_token, from, to, interval)
        .await
        .map_err(AnalysisError::RemoteData)?;

    if candles.is_empty() {
        return Err(AnalysisError::NoHistoricalData);
    }

    analysis::analyse(state.completion.as_ref(), &candles).await
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    auth_state: String,
    authenticated: bool,
    exchange: String,
    instruments: usize,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        auth_state: state.session.auth_state().to_string(),
        authenticated: state.session.has_session(),
        exchange: state.directory.exchange().to_string(),
        instruments: state.directory.len(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Tests
// =============================================================================
