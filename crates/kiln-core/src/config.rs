//! Run configuration
//!
//! Everything the orchestrator needs is passed in explicitly; nothing here
//! reads the process environment.

use std::time::Duration;

use crate::retry::PollPolicy;

/// Timing and confirmation settings for one orchestration run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Chain the caller expects the RPC endpoint to serve
    pub expected_chain_id: Option<u64>,
    /// Block depth after which the creation transaction counts as final
    pub confirmations: u64,
    /// Receipt polling schedule
    pub confirmation_poll: PollPolicy,
    /// Wall-clock budget for the whole confirmation wait
    pub confirmation_timeout: Duration,
    /// Explorer status polling schedule
    pub verification_poll: PollPolicy,
    /// Per-call RPC timeout
    pub rpc_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            expected_chain_id: None,
            confirmations: 1,
            confirmation_poll: PollPolicy::new(Duration::from_secs(2), 90),
            confirmation_timeout: Duration::from_secs(180),
            verification_poll: PollPolicy::new(Duration::from_secs(5), 10),
            rpc_timeout: Duration::from_secs(30),
        }
    }
}

impl RunConfig {
    /// Zero-delay schedules, for tests
    pub fn immediate() -> Self {
        Self {
            confirmation_poll: PollPolicy::new(Duration::ZERO, 5),
            verification_poll: PollPolicy::new(Duration::ZERO, 10),
            ..Self::default()
        }
    }
}
