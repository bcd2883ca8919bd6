//! Client-side session core for the team-formation optimizer.
//!
//! [`SessionController`] owns one optimization attempt at a time. The final
//! result can arrive over the request/response call ([`RequestClient`]) or the
//! push channel ([`ChannelManager`]); [`ResultReconciler`] commits whichever
//! arrives first and ignores the other.

pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod reconciler;
pub mod request;
pub mod session;
pub mod stage_tracker;
pub mod validation;

pub use channel::{ChannelEvent, ChannelManager, ReconnectPolicy};
pub use config::{load_settings, load_settings_from, Settings};
pub use controller::SessionController;
pub use error::{FailureKind, RequestError, SessionFailure, ValidationError};
pub use reconciler::{Offer, ResultReconciler, ResultSource};
pub use request::{OptimizerApi, RequestClient};
pub use session::{SessionCore, SessionEvent, SessionSnapshot, SessionStatus, StageUpdate};
pub use stage_tracker::{StageStatus, StageTracker};
