use thiserror::Error;

/// Pre-flight rejection of a start request. Never touches network or session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("personnel pool is empty; add at least one person")]
    EmptyPool,
    #[error("project requirements are incomplete; project name and team size are required")]
    IncompleteRequirements,
    #[error("team size ({team_size}) exceeds available personnel ({pool_size})")]
    PoolTooSmall { team_size: u32, pool_size: usize },
    #[error("an optimization is already running")]
    AlreadyRunning,
}

impl ValidationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyPool => "empty-pool",
            ValidationError::IncompleteRequirements => "incomplete-requirements",
            ValidationError::PoolTooSmall { .. } => "pool-too-small",
            ValidationError::AlreadyRunning => "already-running",
        }
    }
}
