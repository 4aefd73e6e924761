// HTTP request handlers
use crate::application::animation::GaugeReadout;
use crate::application::error::SessionError;
use crate::application::transport::TransportMode;
use crate::domain::command::Command;
use crate::domain::gauge::{GaugeChannel, GaugeLevel, GaugeRanges};
use crate::domain::history::{HistoryBuffer, HistoryPoint};
use crate::domain::session::{Banner, ConnectionStatus};
use crate::domain::telemetry::EngineState;
use crate::presentation::app_state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub struct GaugeView {
    pub channel: GaugeChannel,
    pub value: f64,
    /// Smoothed position in [0,1]
    pub position: f64,
    pub level: GaugeLevel,
}

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub mode: Option<TransportMode>,
    pub status: ConnectionStatus,
    pub status_label: String,
    pub banner: Option<Banner>,
    pub state: EngineState,
    pub gauges: Vec<GaugeView>,
    pub latest: Option<HistoryPoint>,
}

impl DashboardView {
    fn build(
        mode: Option<TransportMode>,
        status: ConnectionStatus,
        state: EngineState,
        readout: &GaugeReadout,
        ranges: &GaugeRanges,
        history: &HistoryBuffer,
    ) -> Self {
        let gauges = GaugeChannel::ALL
            .iter()
            .map(|&channel| GaugeView {
                channel,
                value: GaugeRanges::raw_value(channel, &state.primary),
                position: readout.get(&channel).map(|v| v.position).unwrap_or_default(),
                level: ranges.level(channel, &state.primary),
            })
            .collect();

        Self {
            mode,
            status,
            status_label: status.to_string(),
            banner: status.banner(),
            state,
            gauges,
            latest: history.latest().cloned(),
        }
    }
}

/// Current engine state, connection status and gauge readout
pub async fn dashboard(State(state): State<Arc<AppState>>) -> Json<DashboardView> {
    let coordinator = &state.coordinator;
    Json(DashboardView::build(
        coordinator.mode(),
        coordinator.connection_status(),
        coordinator.current_state(),
        &coordinator.gauges(),
        coordinator.gauge_ranges(),
        &coordinator.history_buffer(),
    ))
}

#[derive(Debug, Serialize)]
pub struct HistoryView {
    pub capacity: usize,
    pub len: usize,
    pub points: Vec<HistoryPoint>,
}

/// Rolling chart history, oldest first
pub async fn history(State(state): State<Arc<AppState>>) -> Json<HistoryView> {
    let buffer = state.coordinator.history_buffer();
    if buffer.is_empty() {
        tracing::debug!("History requested before the first primary sample");
    }
    Json(HistoryView {
        capacity: buffer.capacity(),
        len: buffer.len(),
        points: buffer.to_vec(),
    })
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn error_response(error: SessionError) -> Response {
    let status = match &error {
        SessionError::NotConnected
        | SessionError::NotRunning
        | SessionError::TransportUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::CommandRejected(_) => StatusCode::BAD_GATEWAY,
        SessionError::MalformedMessage(_) => StatusCode::BAD_REQUEST,
        SessionError::ConfigurationUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_body(status, error.to_string())
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// An empty body means no payload; anything else must be a JSON object
/// sent as JSON.
fn command_payload(headers: &HeaderMap, body: &[u8]) -> Result<Map<String, Value>, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    if !is_json_content_type(headers) {
        return Err(error_body(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "expected request with `Content-Type: application/json`",
        ));
    }

    match Json::<Value>::from_bytes(body) {
        Ok(Json(Value::Object(payload))) => Ok(payload),
        Ok(Json(Value::Null)) => Ok(Map::new()),
        Ok(_) => Err(error_body(
            StatusCode::BAD_REQUEST,
            "command payload must be a JSON object",
        )),
        Err(rejection) => Err(error_body(rejection.status(), rejection.body_text())),
    }
}

/// Forward an operator command. Known commands have their payload checked
/// before anything reaches the session.
pub async fn send_command(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload = match command_payload(&headers, &body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    let command = match Command::parse(&name, payload) {
        Ok(command) => command,
        Err(e) => return error_body(StatusCode::BAD_REQUEST, e.to_string()),
    };

    tracing::info!("Dispatching command {}", command.name);
    match state.coordinator.dispatch(command).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            tracing::warn!("Command failed: {}", e);
            error_response(e)
        }
    }
}

/// Manual reconnect after the session gave up
pub async fn retry_session(State(state): State<Arc<AppState>>) -> Response {
    match state.coordinator.retry().await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::coordinator::{SessionCoordinator, SessionSettings};
    use crate::domain::smoothing::SmoothedValue;
    use crate::domain::telemetry::{AuxiliarySnapshot, PrimarySample};

    fn app_state() -> Arc<AppState> {
        Arc::new(AppState {
            coordinator: Arc::new(SessionCoordinator::new(SessionSettings::default())),
        })
    }

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        headers
    }

    async fn post_command(name: &str, headers: HeaderMap, body: &'static str) -> StatusCode {
        send_command(
            Path(name.to_string()),
            State(app_state()),
            headers,
            Bytes::from_static(body.as_bytes()),
        )
        .await
        .status()
    }

    #[test]
    fn test_dashboard_view_reports_levels_and_banner() {
        let state = EngineState {
            primary: PrimarySample {
                temperature: 88.0,
                load: 50.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut readout = GaugeReadout::new();
        readout.insert(GaugeChannel::Temperature, SmoothedValue::at(0.5));
        let mut history = HistoryBuffer::default();
        history.append_primary(&state.primary, &AuxiliarySnapshot::default());

        let view = DashboardView::build(
            Some(TransportMode::Streaming),
            ConnectionStatus::Failed,
            state,
            &readout,
            &GaugeRanges::default(),
            &history,
        );

        let temperature = &view.gauges[1];
        assert_eq!(temperature.channel, GaugeChannel::Temperature);
        assert_eq!(temperature.value, 88.0);
        assert_eq!(temperature.position, 0.5);
        assert_eq!(temperature.level, GaugeLevel::Critical);
        assert_eq!(view.gauges[3].level, GaugeLevel::Normal);
        assert_eq!(view.status_label, "failed");
        assert!(view.banner.is_some());
        assert_eq!(view.latest.map(|p| p.temperature), Some(88.0));
    }

    #[tokio::test]
    async fn test_command_without_session_is_unavailable() {
        assert_eq!(
            post_command("start_engine", HeaderMap::new(), "").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            post_command("set_mode", json_headers(), r#"{"mode":"AUTO"}"#).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_invalid_json_payload_is_rejected_before_dispatch() {
        assert_eq!(
            post_command("set_mode", json_headers(), r#"{"mode":"#).await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_payload_without_json_content_type_is_rejected() {
        assert_eq!(
            post_command("set_mode", HeaderMap::new(), r#"{"mode":"AUTO"}"#).await,
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }

    #[tokio::test]
    async fn test_non_object_or_incomplete_payload_is_bad_request() {
        assert_eq!(
            post_command("set_mode", json_headers(), r#"["AUTO"]"#).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            post_command("set_setpoint", json_headers(), r#"{"parameter":"rpm"}"#).await,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_json_content_type_variants() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            "Application/JSON; charset=utf-8".parse().unwrap(),
        );
        assert!(is_json_content_type(&headers));
        headers.insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
        assert!(!is_json_content_type(&headers));
    }

    #[tokio::test]
    async fn test_history_starts_empty() {
        let Json(view) = history(State(app_state())).await;
        assert!(view.points.is_empty());
        assert_eq!(view.len, 0);
        assert_eq!(view.capacity, 50);
        assert_eq!(health_check().await, "ok");
    }

    #[tokio::test]
    async fn test_retry_without_session_is_unavailable() {
        assert_eq!(
            retry_session(State(app_state())).await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
