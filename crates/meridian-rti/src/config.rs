//! Coordinator configuration.

use crate::request::ResignAction;

/// Per-federation configuration.
#[derive(Debug, Clone)]
pub struct FederationConfig {
    /// Reject zero lookahead in `enableTimeRegulation` / `modifyLookahead`.
    pub require_positive_lookahead: bool,
    /// Action applied when a federate disappears without resigning.
    pub automatic_resign_action: ResignAction,
    /// Maximum number of simultaneously joined federates.
    pub max_federates: usize,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            require_positive_lookahead: false,
            automatic_resign_action: ResignAction::CancelThenDeleteThenDivest,
            max_federates: 1024,
        }
    }
}

/// Executive configuration.
#[derive(Debug, Clone)]
pub struct ExecutiveConfig {
    /// Capacity of each federation's command channel.
    pub command_queue_depth: usize,
    /// Defaults for federations created without explicit configuration.
    pub federation: FederationConfig,
}

impl Default for ExecutiveConfig {
    fn default() -> Self {
        Self { command_queue_depth: 64, federation: FederationConfig::default() }
    }
}
