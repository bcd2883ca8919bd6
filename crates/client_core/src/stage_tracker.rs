use shared::domain::{StageKey, StageState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStatus {
    pub status: StageState,
    /// Always within `0..=100`.
    pub progress: u8,
    pub message: String,
}

impl StageStatus {
    fn initial(key: StageKey) -> Self {
        Self {
            status: StageState::Ready,
            progress: 0,
            message: key.initial_message().to_string(),
        }
    }
}

/// Status of the four analysis stages. Holds exactly one entry per
/// [`StageKey`] at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTracker {
    stages: [StageStatus; 4],
}

impl Default for StageTracker {
    fn default() -> Self {
        Self {
            stages: StageKey::ALL.map(StageStatus::initial),
        }
    }
}

impl StageTracker {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn get(&self, key: StageKey) -> &StageStatus {
        &self.stages[key.index()]
    }

    /// Entries in declared stage order.
    pub fn iter(&self) -> impl Iterator<Item = (StageKey, &StageStatus)> {
        StageKey::ALL.into_iter().zip(self.stages.iter())
    }

    pub fn apply(
        &mut self,
        key: StageKey,
        status: StageState,
        progress: Option<i64>,
        message: impl Into<String>,
    ) {
        self.stages[key.index()] = StageStatus {
            status,
            progress: clamp_progress(progress),
            message: message.into(),
        };
    }

    /// Cancels every other stage that has not completed after a stage reported
    /// an error. The failing stage keeps its own entry.
    pub fn fail_from_stage(&mut self, failed: StageKey) {
        for key in StageKey::ALL {
            if key == failed {
                continue;
            }
            let entry = &mut self.stages[key.index()];
            if entry.status == StageState::Completed {
                continue;
            }
            *entry = StageStatus {
                status: StageState::Error,
                progress: 0,
                message: format!("{} cancelled", key.label()),
            };
        }
    }

    /// Marks every stage that has not completed as failed after the run as a
    /// whole failed. The first such stage carries the detail, the rest are
    /// cancelled.
    pub fn fail_all(&mut self, detail: &str) {
        let mut first = true;
        for key in StageKey::ALL {
            let entry = &mut self.stages[key.index()];
            if entry.status == StageState::Completed {
                continue;
            }
            let message = if first {
                format!("{} failed: {detail}", key.label())
            } else {
                format!("{} cancelled", key.label())
            };
            first = false;
            *entry = StageStatus {
                status: StageState::Error,
                progress: 0,
                message,
            };
        }
    }
}

pub fn clamp_progress(progress: Option<i64>) -> u8 {
    progress.unwrap_or(0).clamp(0, 100) as u8
}

#[cfg(test)]
#[path = "tests/stage_tracker_tests.rs"]
mod tests;
