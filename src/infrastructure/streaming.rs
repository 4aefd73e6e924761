// WebSocket streaming transport
use crate::application::error::SessionError;
use crate::application::transport::{
    EventSender, TransportConnector, TransportEvent, TransportMode, TransportSession,
    TransportState,
};
use crate::domain::command::Command;
use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

pub struct StreamingConnector {
    url: String,
}

impl StreamingConnector {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

impl TransportConnector for StreamingConnector {
    fn mode(&self) -> TransportMode {
        TransportMode::Streaming
    }

    fn open_session(&self) -> Arc<dyn TransportSession> {
        Arc::new(StreamingSession::new(self.url.clone()))
    }
}

/// One persistent duplex connection. Inbound frames are forwarded by a
/// reader task; commands are written directly to the socket.
pub struct StreamingSession {
    url: String,
    state: Arc<Mutex<TransportState>>,
    writer: tokio::sync::Mutex<Option<WsWriter>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl StreamingSession {
    pub fn new(url: String) -> Self {
        Self {
            url,
            state: Arc::new(Mutex::new(TransportState::Idle)),
            writer: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    fn set_state(&self, state: TransportState) {
        *self.state.lock() = state;
    }
}

#[async_trait]
impl TransportSession for StreamingSession {
    fn mode(&self) -> TransportMode {
        TransportMode::Streaming
    }

    fn state(&self) -> TransportState {
        *self.state.lock()
    }

    async fn connect(&self, events: EventSender) -> Result<(), SessionError> {
        self.set_state(TransportState::Connecting);
        tracing::info!("Connecting to {}", self.url);

        let (stream, _) = connect_async(self.url.as_str()).await.map_err(|e| {
            self.set_state(TransportState::Closed);
            SessionError::TransportUnavailable(e.to_string())
        })?;

        let (writer, mut source) = stream.split();
        *self.writer.lock().await = Some(writer);
        self.set_state(TransportState::Open);
        tracing::info!("Connected to {}", self.url);

        let state = self.state.clone();
        let reader = tokio::spawn(async move {
            let reason = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if events.send(TransportEvent::Frame(text.to_string())).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(bin))) => match String::from_utf8(bin.to_vec()) {
                        Ok(text) => {
                            if events.send(TransportEvent::Frame(text)).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => tracing::warn!("Dropping non UTF-8 binary frame: {}", e),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket read error: {}", e);
                        break Some(e.to_string());
                    }
                    None => break None,
                }
            };
            *state.lock() = TransportState::Closed;
            let _ = events.send(TransportEvent::Closed(reason)).await;
        });
        *self.reader.lock() = Some(reader);

        Ok(())
    }

    async fn send(&self, command: &Command) -> Result<(), SessionError> {
        if self.state() != TransportState::Open {
            return Err(SessionError::NotConnected);
        }
        let text = serde_json::to_string(command)
            .map_err(|e| SessionError::CommandRejected(e.to_string()))?;

        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(SessionError::NotConnected)?;
        if let Err(e) = sink.send(Message::text(text)).await {
            self.set_state(TransportState::Closed);
            return Err(SessionError::CommandRejected(e.to_string()));
        }
        Ok(())
    }

    async fn close(&self) {
        self.set_state(TransportState::Closed);
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if tokio::time::timeout(CLOSE_TIMEOUT, writer.close()).await.is_err() {
                tracing::debug!("Timed out closing WebSocket to {}", self.url);
            }
        }
    }
}
