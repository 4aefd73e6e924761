// HTTP polling transport
use crate::application::error::SessionError;
use crate::application::transport::{
    EventSender, TransportConnector, TransportEvent, TransportMode, TransportSession,
    TransportState,
};
use crate::domain::command::{Command, START_ENGINE, STOP_ENGINE};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const STATUS_PATH: &str = "/api/status";
const COMMANDS_PATH: &str = "/api/commands";

/// Where each command is posted. The engine bridge serves start and stop on
/// dedicated routes; any other command goes to `/api/commands/{name}`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRoutes {
    paths: BTreeMap<String, String>,
}

impl Default for CommandRoutes {
    fn default() -> Self {
        let paths = [
            (START_ENGINE, "/api/engine/start"),
            (STOP_ENGINE, "/api/engine/stop"),
        ];
        Self {
            paths: paths
                .into_iter()
                .map(|(name, path)| (name.to_string(), path.to_string()))
                .collect(),
        }
    }
}

impl CommandRoutes {
    /// Configured paths win over the built-in ones
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, String>) -> Self {
        self.paths
            .extend(overrides.iter().map(|(name, path)| (name.clone(), path.clone())));
        self
    }

    pub fn path(&self, command: &str) -> String {
        match self.paths.get(command) {
            Some(path) => path.clone(),
            None => format!("{}/{}", COMMANDS_PATH, urlencoding::encode(command)),
        }
    }
}

pub struct PollingConnector {
    client: reqwest::Client,
    base_url: String,
    interval: Duration,
    routes: CommandRoutes,
}

impl PollingConnector {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        interval: Duration,
        routes: CommandRoutes,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            interval,
            routes,
        }
    }
}

impl TransportConnector for PollingConnector {
    fn mode(&self) -> TransportMode {
        TransportMode::Polling
    }

    fn open_session(&self) -> Arc<dyn TransportSession> {
        Arc::new(
            PollingSession::new(self.client.clone(), self.base_url.clone(), self.interval)
                .with_routes(self.routes.clone()),
        )
    }
}

/// Status endpoint body. Only the engine block is required; PLC and sensor
/// blocks are forwarded when the backend includes them.
#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(default, alias = "engine")]
    primary: Option<Value>,
    #[serde(default)]
    plc: Option<Value>,
    #[serde(default)]
    auxiliary: Option<Value>,
    #[serde(default, alias = "mqtt_sensors")]
    sensors: Option<Value>,
}

impl StatusBody {
    /// Rebuild the frames a streaming backend would have pushed.
    fn into_frames(self) -> Vec<String> {
        let mut frames = Vec::with_capacity(2);
        if let Some(primary) = self.primary {
            let mut frame = json!({ "type": "primary", "primary": primary });
            if let Some(plc) = self.plc {
                frame["plc"] = plc;
            }
            frames.push(frame.to_string());
        }
        match (self.auxiliary, self.sensors) {
            (Some(auxiliary), _) => {
                frames.push(json!({ "type": "auxiliary", "auxiliary": auxiliary }).to_string());
            }
            (None, Some(sensors)) => {
                frames.push(json!({ "type": "auxiliary", "sensors": sensors }).to_string());
            }
            (None, None) => {}
        }
        frames
    }
}

pub struct PollingSession {
    client: reqwest::Client,
    base_url: String,
    interval: Duration,
    routes: CommandRoutes,
    state: Mutex<TransportState>,
    poll_now: Arc<Notify>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl PollingSession {
    pub fn new(client: reqwest::Client, base_url: String, interval: Duration) -> Self {
        Self {
            client,
            base_url,
            interval,
            routes: CommandRoutes::default(),
            state: Mutex::new(TransportState::Idle),
            poll_now: Arc::new(Notify::new()),
            poller: Mutex::new(None),
        }
    }

    pub fn with_routes(mut self, routes: CommandRoutes) -> Self {
        self.routes = routes;
        self
    }

    fn command_url(&self, command: &Command) -> String {
        format!("{}{}", self.base_url, self.routes.path(&command.name))
    }
}

async fn fetch_status(client: &reqwest::Client, url: &str) -> Result<Vec<String>, SessionError> {
    let unavailable = |e: reqwest::Error| SessionError::TransportUnavailable(e.to_string());

    let response = client.get(url).send().await.map_err(unavailable)?;
    if !response.status().is_success() {
        return Err(SessionError::TransportUnavailable(format!(
            "status endpoint returned {}",
            response.status()
        )));
    }
    let body = response
        .json::<StatusBody>()
        .await
        .map_err(|e| SessionError::MalformedMessage(e.to_string()))?;
    Ok(body.into_frames())
}

async fn poll_loop(
    client: reqwest::Client,
    status_url: String,
    interval: Duration,
    poll_now: Arc<Notify>,
    events: EventSender,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut healthy = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = poll_now.notified() => ticker.reset(),
        }

        let event_results = match fetch_status(&client, &status_url).await {
            Ok(frames) => {
                let mut events_out = Vec::with_capacity(frames.len() + 1);
                if !healthy {
                    healthy = true;
                    events_out.push(TransportEvent::Recovered);
                }
                events_out.extend(frames.into_iter().map(TransportEvent::Frame));
                events_out
            }
            Err(SessionError::MalformedMessage(reason)) => {
                tracing::warn!("Dropping malformed status response: {}", reason);
                Vec::new()
            }
            Err(e) => {
                if healthy {
                    healthy = false;
                    vec![TransportEvent::Degraded(e.to_string())]
                } else {
                    tracing::debug!("Status poll still failing: {}", e);
                    Vec::new()
                }
            }
        };

        for event in event_results {
            if events.send(event).await.is_err() {
                return;
            }
        }
    }
}

#[async_trait]
impl TransportSession for PollingSession {
    fn mode(&self) -> TransportMode {
        TransportMode::Polling
    }

    fn state(&self) -> TransportState {
        *self.state.lock()
    }

    /// Polling has no connection to establish; the session is open as soon
    /// as the poll loop runs. The first poll fires immediately.
    async fn connect(&self, events: EventSender) -> Result<(), SessionError> {
        let status_url = format!("{}{}", self.base_url, STATUS_PATH);
        tracing::info!("Polling {} every {:?}", status_url, self.interval);

        let poller = tokio::spawn(poll_loop(
            self.client.clone(),
            status_url,
            self.interval,
            self.poll_now.clone(),
            events,
        ));
        if let Some(previous) = self.poller.lock().replace(poller) {
            previous.abort();
        }
        *self.state.lock() = TransportState::Open;
        Ok(())
    }

    async fn send(&self, command: &Command) -> Result<(), SessionError> {
        let rejected = |e: reqwest::Error| SessionError::CommandRejected(e.to_string());

        let response = self
            .client
            .post(self.command_url(command))
            .json(&command.body())
            .send()
            .await
            .map_err(rejected)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let reason = format!("{} {}", status, body).trim().to_string();
            return Err(SessionError::CommandRejected(reason));
        }

        // Show the command's effect without waiting out the interval
        self.poll_now.notify_one();
        Ok(())
    }

    async fn close(&self) {
        *self.state.lock() = TransportState::Closed;
        if let Some(poller) = self.poller.lock().take() {
            poller.abort();
        }
    }
}
