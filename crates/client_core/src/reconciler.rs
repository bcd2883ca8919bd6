use std::{fmt, sync::Arc};

use shared::protocol::ResultPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultSource {
    Push,
    Request,
}

impl fmt::Display for ResultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResultSource::Push => "push",
            ResultSource::Request => "request",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    Ignored,
}

#[derive(Debug, Clone)]
struct Commit {
    payload: Arc<ResultPayload>,
    source: ResultSource,
}

/// At-most-once gate for the final result of an attempt.
///
/// The first offer after a reset wins regardless of source; everything after
/// it is ignored. `offer` takes `&mut self`, so the check and the commit are a
/// single step that no other offer can interleave with.
#[derive(Debug, Clone, Default)]
pub struct ResultReconciler {
    commit: Option<Commit>,
}

impl ResultReconciler {
    pub fn reset(&mut self) {
        self.commit = None;
    }

    pub fn offer(&mut self, payload: ResultPayload, source: ResultSource) -> Offer {
        if self.commit.is_some() {
            return Offer::Ignored;
        }
        self.commit = Some(Commit {
            payload: Arc::new(payload),
            source,
        });
        Offer::Accepted
    }

    pub fn is_committed(&self) -> bool {
        self.commit.is_some()
    }

    pub fn result(&self) -> Option<Arc<ResultPayload>> {
        self.commit.as_ref().map(|commit| Arc::clone(&commit.payload))
    }

    pub fn source(&self) -> Option<ResultSource> {
        self.commit.as_ref().map(|commit| commit.source)
    }
}
