//! Push-channel connection: one websocket, reconnected until torn down.

use std::{sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt};
use shared::protocol::AgentUpdate;
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, Settings};

const EVENT_BUFFER: usize = 1024;
const CLOSE_GRACE: Duration = Duration::from_secs(1);
const MAX_BACKOFF_DOUBLINGS: u32 = 16;

type PushStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Same delay before every attempt.
    Fixed(Duration),
    /// Doubles after each consecutive failed attempt, capped at `max`.
    Backoff { initial: Duration, max: Duration },
}

impl ReconnectPolicy {
    pub fn delay(&self, consecutive_failures: u32) -> Duration {
        match *self {
            ReconnectPolicy::Fixed(delay) => delay,
            ReconnectPolicy::Backoff { initial, max } => {
                let factor = 1u32 << consecutive_failures.min(MAX_BACKOFF_DOUBLINGS);
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    /// The connection was lost; a reconnect is already scheduled.
    Disconnected { reason: String },
    Update(AgentUpdate),
}

/// Shutdown was requested while an event was waiting for buffer space.
struct Stopped;

struct Shared {
    url: String,
    policy: ReconnectPolicy,
    events: mpsc::Sender<ChannelEvent>,
    connected: watch::Sender<bool>,
}

impl Shared {
    /// Queues an event for the subscriber. A full buffer never outlasts a
    /// shutdown request.
    async fn emit(
        &self,
        event: ChannelEvent,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), Stopped> {
        tokio::select! {
            biased;
            _ = stopped(shutdown) => Err(Stopped),
            sent = self.events.send(event) => {
                if sent.is_err() {
                    debug!(url = %self.url, "channel: subscriber gone, event dropped");
                }
                Ok(())
            }
        }
    }

    async fn set_connected(
        &self,
        connected: bool,
        reason: Option<String>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), Stopped> {
        let changed = self.connected.send_if_modified(|current| {
            if *current == connected {
                return false;
            }
            *current = connected;
            true
        });
        if !changed {
            return Ok(());
        }
        let event = if connected {
            ChannelEvent::Connected
        } else {
            ChannelEvent::Disconnected {
                reason: reason.unwrap_or_else(|| "closed".into()),
            }
        };
        self.emit(event, shutdown).await
    }

    async fn deliver(&self, text: &str, shutdown: &mut watch::Receiver<bool>) -> Result<(), Stopped> {
        match serde_json::from_str::<AgentUpdate>(text) {
            Ok(update) => self.emit(ChannelEvent::Update(update), shutdown).await,
            Err(err) => {
                warn!(url = %self.url, error = %err, "channel: dropping malformed message");
                Ok(())
            }
        }
    }
}

/// Resolves once shutdown is requested or the manager is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

enum Exit {
    Shutdown,
    Lost(String),
}

/// Owns the push connection and forwards parsed updates to a single subscriber.
pub struct ChannelManager {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelManager {
    /// Returns the manager and the only receiver of its events.
    pub fn new(
        url: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (events, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (connected, _) = watch::channel(false);
        let (shutdown, _) = watch::channel(false);
        let manager = Self {
            shared: Arc::new(Shared {
                url: url.into(),
                policy,
                events,
                connected,
            }),
            shutdown,
            supervisor: Mutex::new(None),
        };
        (manager, events_rx)
    }

    pub fn from_settings(
        settings: &Settings,
    ) -> Result<(Self, mpsc::Receiver<ChannelEvent>), ConfigError> {
        Ok(Self::new(settings.push_url()?, settings.reconnect_policy()))
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn is_connected(&self) -> bool {
        *self.shared.connected.borrow()
    }

    pub fn subscribe_connectivity(&self) -> watch::Receiver<bool> {
        self.shared.connected.subscribe()
    }

    /// Starts the connection supervisor. A no-op while one is already running.
    pub async fn connect(&self) {
        let mut guard = self.supervisor.lock().await;
        if guard.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!(url = %self.shared.url, "channel: supervisor already running");
            return;
        }
        self.shutdown.send_replace(false);
        let shared = Arc::clone(&self.shared);
        let shutdown = self.shutdown.subscribe();
        *guard = Some(tokio::spawn(supervise(shared, shutdown)));
    }

    /// Closes the connection and cancels any pending reconnect. Idempotent,
    /// and never waits on the subscriber draining its events.
    pub async fn teardown(&self) {
        self.shutdown.send_replace(true);
        let handle = self.supervisor.lock().await.take();
        let Some(handle) = handle else {
            return;
        };
        if let Err(err) = handle.await {
            if !err.is_cancelled() {
                warn!(url = %self.shared.url, error = %err, "channel: supervisor task failed");
            }
        }
        if self.shared.connected.send_replace(false) {
            let event = ChannelEvent::Disconnected {
                reason: "torn down".into(),
            };
            if self.shared.events.try_send(event).is_err() {
                debug!(url = %self.shared.url, "channel: subscriber not draining, teardown event dropped");
            }
        }
        info!(url = %self.shared.url, "channel: torn down");
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        if let Some(handle) = self.supervisor.get_mut().take() {
            handle.abort();
        }
    }
}

async fn supervise(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut consecutive_failures = 0u32;
    loop {
        if *shutdown.borrow() {
            break;
        }

        let attempt = tokio::select! {
            _ = stopped(&mut shutdown) => break,
            attempt = connect_async(shared.url.as_str()) => attempt,
        };

        match attempt {
            Ok((stream, _)) => {
                consecutive_failures = 0;
                info!(url = %shared.url, "channel: connected");
                if shared.set_connected(true, None, &mut shutdown).await.is_err() {
                    break;
                }
                match pump(&shared, stream, &mut shutdown).await {
                    Exit::Shutdown => break,
                    Exit::Lost(reason) => {
                        warn!(url = %shared.url, %reason, "channel: connection lost");
                        if shared
                            .set_connected(false, Some(reason), &mut shutdown)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                warn!(
                    url = %shared.url,
                    error = %err,
                    consecutive_failures,
                    "channel: connect failed"
                );
            }
        }

        let delay = shared.policy.delay(consecutive_failures);
        info!(
            url = %shared.url,
            delay_ms = delay.as_millis() as u64,
            "channel: reconnect scheduled"
        );
        tokio::select! {
            _ = stopped(&mut shutdown) => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    debug!(url = %shared.url, "channel: supervisor stopped");
}

async fn pump(shared: &Shared, stream: PushStream, shutdown: &mut watch::Receiver<bool>) -> Exit {
    let (mut writer, mut reader) = stream.split();
    loop {
        let delivered = tokio::select! {
            _ = stopped(shutdown) => Err(Stopped),
            msg = reader.next() => match msg {
                Some(Ok(Message::Text(text))) => shared.deliver(&text, shutdown).await,
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|frame| format!("closed by remote: {} {}", frame.code, frame.reason))
                        .unwrap_or_else(|| "closed by remote".into());
                    return Exit::Lost(reason);
                }
                Some(Ok(_)) => Ok(()),
                Some(Err(err)) => return Exit::Lost(format!("receive failed: {err}")),
                None => return Exit::Lost("stream ended".into()),
            },
        };
        if delivered.is_err() {
            let _ = tokio::time::timeout(CLOSE_GRACE, writer.send(Message::Close(None))).await;
            return Exit::Shutdown;
        }
    }
}

#[cfg(test)]
#[path = "tests/channel_tests.rs"]
mod tests;
