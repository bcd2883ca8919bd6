//! Pure session state machine: every inbound event funnels through
//! [`SessionCore::dispatch`]. No I/O happens here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    domain::{AttemptId, StageKey, StageState},
    error::ValidationError,
    protocol::{AgentKind, AgentUpdate, ResultPayload},
};
use tracing::{debug, info, warn};

use crate::{
    error::{RequestError, SessionFailure},
    reconciler::{Offer, ResultReconciler, ResultSource},
    stage_tracker::StageTracker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Idle | Completed | Error, Running) | (Running, Completed | Error)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageUpdate {
    pub key: StageKey,
    pub status: StageState,
    pub progress: Option<i64>,
    pub message: String,
}

/// Everything that can change a session after it started.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Stage(StageUpdate),
    /// A result arrived for the current attempt.
    ResultReady {
        source: ResultSource,
        payload: ResultPayload,
    },
    /// The optimizer reported a run-level failure over the push channel.
    ApplicationError { message: String },
    /// The request/response call for `attempt` finished.
    RequestOutcome {
        attempt: AttemptId,
        outcome: Result<ResultPayload, RequestError>,
    },
    Connectivity { connected: bool },
}

impl SessionEvent {
    /// Splits one push message into the events it implies, in routing order:
    /// the stage update first, then any result it carries.
    pub fn from_agent_update(update: AgentUpdate) -> Vec<SessionEvent> {
        let AgentUpdate {
            agent_type,
            status,
            progress,
            message,
            results,
        } = update;

        let mut events = Vec::with_capacity(2);
        match agent_type {
            AgentKind::Stage(key) => events.push(SessionEvent::Stage(StageUpdate {
                key,
                status,
                progress,
                message,
            })),
            AgentKind::Orchestrator if status == StageState::Error && results.is_none() => {
                events.push(SessionEvent::ApplicationError { message })
            }
            AgentKind::Orchestrator => {}
        }
        if let Some(payload) = results {
            events.push(SessionEvent::ResultReady {
                source: ResultSource::Push,
                payload,
            });
        }
        events
    }
}

/// Read-only view published to observers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub attempt: Option<AttemptId>,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub committed: bool,
    pub stages: StageTracker,
    pub result: Option<Arc<ResultPayload>>,
    pub result_source: Option<ResultSource>,
    pub failure: Option<SessionFailure>,
    pub channel_connected: bool,
}

#[derive(Debug, Default)]
pub struct SessionCore {
    attempt: Option<AttemptId>,
    status: SessionStatus,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    stages: StageTracker,
    reconciler: ResultReconciler,
    failure: Option<SessionFailure>,
    channel_connected: bool,
}

impl SessionCore {
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn attempt(&self) -> Option<AttemptId> {
        self.attempt
    }

    pub fn is_committed(&self) -> bool {
        self.reconciler.is_committed()
    }

    /// Re-arms the session for a new attempt. Input validation happens before
    /// this is called; only the running check lives here.
    pub fn begin(&mut self) -> Result<AttemptId, ValidationError> {
        if self.status == SessionStatus::Running {
            return Err(ValidationError::AlreadyRunning);
        }

        let attempt = self
            .attempt
            .map(AttemptId::next)
            .unwrap_or(AttemptId(1));
        self.attempt = Some(attempt);
        self.status = SessionStatus::Running;
        self.started_at = Some(Utc::now());
        self.finished_at = None;
        self.stages.reset();
        self.reconciler.reset();
        self.failure = None;
        info!(attempt = attempt.0, "session: attempt started");
        Ok(attempt)
    }

    /// Applies one event. Returns whether observable state changed.
    pub fn dispatch(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Connectivity { connected } => {
                let changed = self.channel_connected != connected;
                self.channel_connected = connected;
                changed
            }
            SessionEvent::Stage(update) => self.apply_stage(update),
            SessionEvent::ResultReady { source, payload } => {
                if !self.accepts_mutation("result") {
                    return false;
                }
                self.offer(payload, source)
            }
            SessionEvent::ApplicationError { message } => {
                if !self.accepts_mutation("application error") || self.is_committed() {
                    return false;
                }
                warn!(
                    attempt = self.attempt.map(|a| a.0),
                    %message,
                    "session: optimizer reported failure"
                );
                self.stages.fail_all(&message);
                self.fail(SessionFailure::application(message))
            }
            SessionEvent::RequestOutcome { attempt, outcome } => {
                if self.attempt != Some(attempt) {
                    debug!(
                        attempt = attempt.0,
                        current = self.attempt.map(|a| a.0),
                        "session: discarding outcome of superseded attempt"
                    );
                    return false;
                }
                if !self.accepts_mutation("request outcome") {
                    return false;
                }
                match outcome {
                    Ok(payload) => self.offer(payload, ResultSource::Request),
                    Err(err) => {
                        if self.is_committed() {
                            return false;
                        }
                        warn!(attempt = attempt.0, error = %err, "session: request failed");
                        let failure = SessionFailure::from(&err);
                        self.stages.fail_all(&failure.detail);
                        self.fail(failure)
                    }
                }
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            attempt: self.attempt,
            status: self.status,
            started_at: self.started_at,
            finished_at: self.finished_at,
            committed: self.reconciler.is_committed(),
            stages: self.stages.clone(),
            result: self.reconciler.result(),
            result_source: self.reconciler.source(),
            failure: self.failure.clone(),
            channel_connected: self.channel_connected,
        }
    }

    fn accepts_mutation(&self, what: &str) -> bool {
        if self.status == SessionStatus::Running {
            return true;
        }
        debug!(
            status = self.status.as_str(),
            event = what,
            "session: ignoring event outside a running attempt"
        );
        false
    }

    fn apply_stage(&mut self, update: StageUpdate) -> bool {
        if !self.accepts_mutation("stage update") {
            return false;
        }
        let StageUpdate {
            key,
            status,
            progress,
            message,
        } = update;
        debug!(stage = %key, ?status, progress, "session: stage update");
        self.stages.apply(key, status, progress, message.clone());

        if status == StageState::Error && !self.is_committed() {
            warn!(
                attempt = self.attempt.map(|a| a.0),
                stage = %key,
                %message,
                "session: stage reported error"
            );
            self.stages.fail_from_stage(key);
            let detail = format!("{}: {message}", key.label());
            self.fail(SessionFailure::application(detail));
        }
        true
    }

    fn offer(&mut self, payload: ResultPayload, source: ResultSource) -> bool {
        match self.reconciler.offer(payload, source) {
            Offer::Accepted => {
                info!(
                    attempt = self.attempt.map(|a| a.0),
                    %source,
                    "session: result committed"
                );
                self.transition(SessionStatus::Completed)
            }
            Offer::Ignored => {
                debug!(%source, "session: result already committed, ignoring");
                false
            }
        }
    }

    fn fail(&mut self, failure: SessionFailure) -> bool {
        self.failure = Some(failure);
        self.transition(SessionStatus::Error);
        true
    }

    fn transition(&mut self, next: SessionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            warn!(
                from = self.status.as_str(),
                to = next.as_str(),
                "session: rejected invalid transition"
            );
            return false;
        }
        self.status = next;
        if matches!(next, SessionStatus::Completed | SessionStatus::Error) {
            self.finished_at = Some(Utc::now());
        }
        true
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
