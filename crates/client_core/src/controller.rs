use std::sync::Arc;

use shared::{
    domain::{AttemptId, PersonInput, ProjectRequirements},
    error::ValidationError,
    protocol::ResultPayload,
};
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    channel::ChannelEvent,
    error::RequestError,
    request::OptimizerApi,
    session::{SessionCore, SessionEvent, SessionSnapshot},
    validation::build_request,
};

/// Owns one optimization session at a time and merges the request outcome
/// and the push channel into it.
pub struct SessionController {
    api: Arc<dyn OptimizerApi>,
    core: Mutex<SessionCore>,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    pub fn new(api: Arc<dyn OptimizerApi>) -> Arc<Self> {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Arc::new(Self {
            api,
            core: Mutex::new(SessionCore::default()),
            state,
        })
    }

    pub fn state(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Validates the inputs, re-arms the session and fires the optimize call.
    ///
    /// The `Running` snapshot is published before this returns; the request
    /// outcome arrives later through [`Self::handle_request_outcome`].
    pub async fn start(
        self: &Arc<Self>,
        requirements: &ProjectRequirements,
        personnel: &[PersonInput],
    ) -> Result<AttemptId, ValidationError> {
        let body = build_request(requirements, personnel).inspect_err(|err| {
            info!(code = err.code(), "session: start rejected");
        })?;

        let attempt = {
            let mut core = self.core.lock().await;
            let attempt = core.begin().inspect_err(|err| {
                info!(code = err.code(), "session: start rejected");
            })?;
            self.state.send_replace(core.snapshot());
            attempt
        };

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = controller.api.optimize(&body).await;
            controller.handle_request_outcome(attempt, outcome).await;
        });
        Ok(attempt)
    }

    pub async fn handle_request_outcome(
        &self,
        attempt: AttemptId,
        outcome: Result<ResultPayload, RequestError>,
    ) {
        self.dispatch(vec![SessionEvent::RequestOutcome { attempt, outcome }])
            .await;
    }

    pub async fn handle_channel_event(&self, event: ChannelEvent) {
        let events = match event {
            ChannelEvent::Connected => vec![SessionEvent::Connectivity { connected: true }],
            ChannelEvent::Disconnected { reason } => {
                debug!(%reason, "session: push channel disconnected");
                vec![SessionEvent::Connectivity { connected: false }]
            }
            ChannelEvent::Update(update) => SessionEvent::from_agent_update(update),
        };
        self.dispatch(events).await;
    }

    /// Applies events in order under one lock and publishes once if anything changed.
    pub async fn dispatch(&self, events: Vec<SessionEvent>) {
        let mut core = self.core.lock().await;
        let mut changed = false;
        for event in events {
            changed |= core.dispatch(event);
        }
        if changed {
            self.state.send_replace(core.snapshot());
        }
    }

    /// Feeds every event from a channel manager into this controller until the
    /// manager goes away.
    pub fn attach_channel(self: &Arc<Self>, mut events: mpsc::Receiver<ChannelEvent>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                controller.handle_channel_event(event).await;
            }
            info!("session: push channel event stream ended");
        })
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
