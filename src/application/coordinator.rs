// Session coordinator - owns the live transport and reconciles telemetry
use crate::application::animation::{GaugeAnimator, GaugeReadout, SmoothingSettings};
use crate::application::envelope::decode_frame;
use crate::application::error::SessionError;
use crate::application::reconnect::{ReconnectDecision, ReconnectPolicy, ReconnectSettings};
use crate::application::transport::{
    TransportConnector, TransportEvent, TransportMode, TransportSession, TransportState,
};
use crate::domain::command::Command;
use crate::domain::gauge::GaugeRanges;
use crate::domain::history::{HistoryBuffer, DEFAULT_HISTORY_CAPACITY};
use crate::domain::session::ConnectionStatus;
use crate::domain::telemetry::{AuxiliaryUpdate, EngineState, Inbound, PlcUpdate, PrimarySample};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

const CONTROL_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub history_capacity: usize,
    pub reconnect: ReconnectSettings,
    pub smoothing: SmoothingSettings,
    pub gauges: GaugeRanges,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            reconnect: ReconnectSettings::default(),
            smoothing: SmoothingSettings::default(),
            gauges: GaugeRanges::default(),
        }
    }
}

/// Read models shared between the driver (sole writer) and the
/// presentation layer (readers only).
struct Published {
    status: watch::Sender<ConnectionStatus>,
    state: watch::Sender<EngineState>,
    history: watch::Sender<HistoryBuffer>,
    gauges: Arc<watch::Sender<GaugeReadout>>,
}

enum Control {
    Dispatch {
        command: Command,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Reconnect {
        generation: u64,
    },
    Retry,
    Stop,
}

struct RunningSession {
    mode: TransportMode,
    control: mpsc::Sender<Control>,
    driver: JoinHandle<()>,
}

/// One dashboard session. History and gauge readout survive reconnects and
/// restarts; the transport is recreated for every connection attempt.
pub struct SessionCoordinator {
    settings: SessionSettings,
    published: Arc<Published>,
    running: Mutex<Option<RunningSession>>,
}

impl SessionCoordinator {
    pub fn new(settings: SessionSettings) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        let (state, _) = watch::channel(EngineState::default());
        let (history, _) = watch::channel(HistoryBuffer::new(settings.history_capacity));
        let (gauges, _) = watch::channel(GaugeReadout::new());
        Self {
            settings,
            published: Arc::new(Published {
                status,
                state,
                history,
                gauges: Arc::new(gauges),
            }),
            running: Mutex::new(None),
        }
    }

    /// Start a session over `connector`. Returns false if a session is
    /// already running, in which case nothing changes.
    pub fn start(&self, connector: Arc<dyn TransportConnector>) -> bool {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.driver.is_finished()) {
            tracing::debug!("Session already started");
            return false;
        }

        let mode = connector.mode();
        let (control_tx, control_rx) = mpsc::channel(CONTROL_BUFFER);
        let driver = SessionDriver::new(
            connector,
            &self.settings,
            self.published.clone(),
            control_tx.downgrade(),
        );
        tracing::info!("Starting telemetry session in {} mode", mode);
        *running = Some(RunningSession {
            mode,
            control: control_tx,
            driver: tokio::spawn(driver.run(control_rx)),
        });
        true
    }

    /// Cancel every timer and animation, close the transport and wait for the
    /// driver to finish. Safe to call repeatedly.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        let _ = running.control.send(Control::Stop).await;
        if let Err(e) = running.driver.await {
            tracing::warn!("Session driver ended abnormally: {}", e);
        }
        tracing::info!("Telemetry session stopped");
    }

    pub async fn dispatch(&self, command: Command) -> Result<(), SessionError> {
        let control = self.control()?;
        let (reply, response) = oneshot::channel();
        control
            .send(Control::Dispatch { command, reply })
            .await
            .map_err(|_| SessionError::NotRunning)?;
        response.await.map_err(|_| SessionError::NotRunning)?
    }

    /// Manual reconnect; the only way out of `Failed`.
    pub async fn retry(&self) -> Result<(), SessionError> {
        self.control()?
            .send(Control::Retry)
            .await
            .map_err(|_| SessionError::NotRunning)
    }

    pub fn mode(&self) -> Option<TransportMode> {
        self.running.lock().as_ref().map(|r| r.mode)
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        *self.published.status.borrow()
    }

    pub fn current_state(&self) -> EngineState {
        self.published.state.borrow().clone()
    }

    pub fn history_buffer(&self) -> HistoryBuffer {
        self.published.history.borrow().clone()
    }

    pub fn gauges(&self) -> GaugeReadout {
        self.published.gauges.borrow().clone()
    }

    pub fn gauge_ranges(&self) -> &GaugeRanges {
        &self.settings.gauges
    }

    #[cfg(test)]
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.published.status.subscribe()
    }

    #[cfg(test)]
    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.published.state.subscribe()
    }

    #[cfg(test)]
    pub fn subscribe_history(&self) -> watch::Receiver<HistoryBuffer> {
        self.published.history.subscribe()
    }

    #[cfg(test)]
    pub fn subscribe_gauges(&self) -> watch::Receiver<GaugeReadout> {
        self.published.gauges.subscribe()
    }

    fn control(&self) -> Result<mpsc::Sender<Control>, SessionError> {
        self.running
            .lock()
            .as_ref()
            .map(|r| r.control.clone())
            .ok_or(SessionError::NotRunning)
    }
}

/// Single logical timeline of a session: every transport event and control
/// message is handled here, one at a time.
struct SessionDriver {
    connector: Arc<dyn TransportConnector>,
    mode: TransportMode,
    connect_timeout: Duration,
    retry_delay: Duration,
    gauges: GaugeRanges,
    published: Arc<Published>,
    policy: ReconnectPolicy,
    animator: GaugeAnimator,
    transport: Option<Arc<dyn TransportSession>>,
    events: Option<mpsc::Receiver<TransportEvent>>,
    reconnect_timer: Option<JoinHandle<()>>,
    timer_generation: u64,
    control: mpsc::WeakSender<Control>,
}

impl SessionDriver {
    fn new(
        connector: Arc<dyn TransportConnector>,
        settings: &SessionSettings,
        published: Arc<Published>,
        control: mpsc::WeakSender<Control>,
    ) -> Self {
        Self {
            mode: connector.mode(),
            connector,
            connect_timeout: settings.reconnect.connect_timeout(),
            retry_delay: settings.reconnect.delay(),
            gauges: settings.gauges,
            animator: GaugeAnimator::new(&settings.smoothing, published.gauges.clone()),
            published,
            policy: ReconnectPolicy::new(&settings.reconnect),
            transport: None,
            events: None,
            reconnect_timer: None,
            timer_generation: 0,
            control,
        }
    }

    async fn run(mut self, mut control_rx: mpsc::Receiver<Control>) {
        self.connect_now().await;

        loop {
            tokio::select! {
                event = next_event(&mut self.events) => match event {
                    Some(event) => self.on_transport_event(event).await,
                    None => {
                        self.events = None;
                        self.on_connection_lost(Some("event stream ended".to_string())).await;
                    }
                },
                control = control_rx.recv() => match control {
                    Some(Control::Stop) | None => break,
                    Some(control) => self.on_control(control).await,
                },
            }
        }

        self.shutdown().await;
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame(text) => self.on_frame(&text),
            TransportEvent::Degraded(reason) => {
                tracing::warn!("Status poll failed: {}", reason);
                self.set_status(ConnectionStatus::Connecting);
            }
            TransportEvent::Recovered => {
                tracing::info!("Status polling recovered");
                self.set_status(ConnectionStatus::Connected);
            }
            TransportEvent::Closed(reason) => self.on_connection_lost(reason).await,
        }
    }

    fn on_frame(&mut self, text: &str) {
        match decode_frame(text) {
            Ok(Some(Inbound::Primary { sample, plc })) => self.apply_primary(sample, plc),
            Ok(Some(Inbound::Auxiliary(update))) => self.apply_auxiliary(update),
            Ok(None) => {}
            Err(e) => tracing::warn!("Dropping frame: {}", e),
        }
    }

    fn apply_primary(&mut self, sample: PrimarySample, plc: Option<PlcUpdate>) {
        let mut auxiliary = None;
        self.published.state.send_modify(|state| {
            state.primary = sample;
            if let Some(plc) = plc {
                state.plc.apply(plc);
            }
            auxiliary = Some(state.auxiliary.clone());
        });
        let auxiliary = auxiliary.unwrap_or_default();

        self.published.history.send_modify(|history| {
            history.append_primary(&sample, &auxiliary);
        });

        for (channel, target) in self.gauges.targets(&sample) {
            self.animator.set_target(channel, target);
        }
    }

    fn apply_auxiliary(&mut self, update: AuxiliaryUpdate) {
        let mut auxiliary = None;
        self.published.state.send_modify(|state| {
            state.auxiliary.merge(update.sensors);
            state.plc.apply(update.plc);
            auxiliary = Some(state.auxiliary.clone());
        });
        let auxiliary = auxiliary.unwrap_or_default();

        let amended = self
            .published
            .history
            .send_if_modified(|history| history.amend_latest_auxiliary(&auxiliary));
        if !amended {
            tracing::debug!("Auxiliary update before the first primary sample; no row to amend");
        }
    }

    async fn on_control(&mut self, control: Control) {
        match control {
            Control::Dispatch { command, reply } => self.dispatch(command, reply).await,
            Control::Reconnect { generation } => {
                let stale = generation != self.timer_generation;
                if stale || self.policy.is_exhausted() || self.is_open() {
                    return;
                }
                self.reconnect_timer = None;
                self.connect_now().await;
            }
            Control::Retry => {
                if self.is_open() && self.published.status.borrow().is_connected() {
                    return;
                }
                tracing::info!("Manual reconnect requested");
                self.policy.reset();
                self.connect_now().await;
            }
            Control::Stop => {}
        }
    }

    async fn dispatch(
        &mut self,
        command: Command,
        reply: oneshot::Sender<Result<(), SessionError>>,
    ) {
        let transport = self.transport.clone().filter(|t| t.state() == TransportState::Open);

        let Some(transport) = transport else {
            tracing::warn!("Command {} issued while not connected", command.name);
            let _ = reply.send(Err(SessionError::NotConnected));
            if self.mode == TransportMode::Streaming {
                // Operator action jumps the reconnect queue
                if self.policy.is_exhausted() {
                    self.policy.reset();
                }
                self.connect_now().await;
            }
            return;
        };

        tracing::info!("Sending command {}", command.name);
        let result = transport.send(&command).await;
        let failed = result.is_err();
        if let Err(e) = &result {
            tracing::warn!("Command {} failed: {}", command.name, e);
        }
        let _ = reply.send(result);

        let dropped = transport.state() != TransportState::Open;
        if failed && self.mode == TransportMode::Streaming && dropped {
            self.on_connection_lost(Some("send failed".to_string())).await;
            if !self.policy.is_exhausted() {
                self.connect_now().await;
            }
        }
    }

    async fn connect_now(&mut self) {
        self.cancel_reconnect_timer();
        self.close_transport().await;

        let status = match self.policy.attempt() {
            0 => ConnectionStatus::Connecting,
            attempt => ConnectionStatus::Reconnecting { attempt },
        };
        self.set_status(status);

        let session = self.connector.open_session();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        self.events = Some(events_rx);
        self.transport = Some(session.clone());

        let connecting = tokio::time::timeout(self.connect_timeout, session.connect(events_tx));
        let result = match connecting.await {
            Ok(result) => result,
            Err(_) => Err(SessionError::TransportUnavailable("connect timed out".to_string())),
        };

        match result {
            Ok(()) => {
                self.policy.on_open();
                self.set_status(ConnectionStatus::Connected);
            }
            Err(e) => {
                tracing::warn!("Connection attempt failed: {}", e);
                self.on_connection_lost(Some(e.to_string())).await;
            }
        }
    }

    async fn on_connection_lost(&mut self, reason: Option<String>) {
        self.close_transport().await;
        let reason = reason.unwrap_or_else(|| "closed".to_string());

        if self.mode == TransportMode::Polling {
            tracing::warn!(
                "Polling session ended ({}); reopening in {:?}",
                reason,
                self.retry_delay
            );
            self.set_status(ConnectionStatus::Connecting);
            self.schedule_reconnect(self.retry_delay);
            return;
        }

        match self.policy.on_close() {
            ReconnectDecision::Retry { attempt, delay } => {
                tracing::info!(
                    "Connection lost ({}); reconnect attempt {} in {:?}",
                    reason,
                    attempt,
                    delay
                );
                self.set_status(ConnectionStatus::Reconnecting { attempt });
                self.schedule_reconnect(delay);
            }
            ReconnectDecision::GiveUp => {
                tracing::error!("Connection lost ({}); reconnect attempts exhausted", reason);
                self.cancel_reconnect_timer();
                self.set_status(ConnectionStatus::Failed);
            }
        }
    }

    fn schedule_reconnect(&mut self, delay: Duration) {
        self.cancel_reconnect_timer();
        let generation = self.timer_generation;
        let control = self.control.clone();
        self.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(control) = control.upgrade() {
                let _ = control.send(Control::Reconnect { generation }).await;
            }
        }));
    }

    fn cancel_reconnect_timer(&mut self) {
        self.timer_generation = self.timer_generation.wrapping_add(1);
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
    }

    async fn close_transport(&mut self) {
        self.events = None;
        if let Some(transport) = self.transport.take() {
            transport.close().await;
        }
    }

    fn is_open(&self) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|t| t.state() == TransportState::Open)
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.published.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            tracing::info!("Connection status: {} -> {}", current, status);
            *current = status;
            true
        });
    }

    async fn shutdown(&mut self) {
        self.cancel_reconnect_timer();
        self.close_transport().await;
        self.animator.shutdown();
        self.set_status(ConnectionStatus::Disconnected);
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<TransportEvent>>) -> Option<TransportEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}
