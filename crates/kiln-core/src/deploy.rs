//! Deployment execution
//!
//! [`DeploymentExecutor`] sends exactly one creation transaction and follows
//! it to a final state:
//!
//! ```text
//! Unsubmitted -> Submitted -> AwaitingConfirmation -> Confirmed | Reverted | TimedOut
//! ```
//!
//! `TimedOut` is not a failure. The transaction may still be mined, so it is
//! never resubmitted; doing so would create a second contract.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Bytes, B256};
use tokio_util::sync::CancellationToken;

use crate::artifact::DeploymentArtifact;
use crate::chain::ChainClient;
use crate::codec::ConstructorArgs;
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::retry::{poll, PollOutcome, PollPolicy, SharedSleeper, Step};
use crate::types::{DeployedContract, ReceiptInfo};

/// Lifecycle of a single deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentState {
    Unsubmitted,
    Submitted { tx_hash: B256 },
    AwaitingConfirmation { tx_hash: B256 },
    Confirmed(DeployedContract),
    Reverted { tx_hash: B256, reason: Option<String> },
    TimedOut { tx_hash: B256 },
}

impl DeploymentState {
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            DeploymentState::Confirmed(_)
                | DeploymentState::Reverted { .. }
                | DeploymentState::TimedOut { .. }
        )
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentState::Unsubmitted => "unsubmitted",
            DeploymentState::Submitted { .. } => "submitted",
            DeploymentState::AwaitingConfirmation { .. } => "awaiting-confirmation",
            DeploymentState::Confirmed(_) => "confirmed",
            DeploymentState::Reverted { .. } => "reverted",
            DeploymentState::TimedOut { .. } => "timed-out",
        };
        write!(f, "{}", name)
    }
}

/// Drives one creation transaction through its lifecycle
pub struct DeploymentExecutor {
    chain: Arc<dyn ChainClient>,
    sleeper: SharedSleeper,
    confirmations: u64,
    poll: PollPolicy,
    timeout: Duration,
}

impl DeploymentExecutor {
    pub fn new(chain: Arc<dyn ChainClient>, sleeper: SharedSleeper, config: &RunConfig) -> Self {
        Self {
            chain,
            sleeper,
            confirmations: config.confirmations.max(1),
            poll: config.confirmation_poll,
            timeout: config.confirmation_timeout,
        }
    }

    /// Deploy `artifact` with `args` and return the final state.
    ///
    /// Errors are reserved for failures before or during submission and for
    /// a confirmed receipt that carries no contract address.
    pub async fn execute(
        &self,
        artifact: &DeploymentArtifact,
        args: &ConstructorArgs,
        chain_id: u64,
        cancel: &CancellationToken,
    ) -> Result<DeploymentState> {
        let mut state = DeploymentState::Unsubmitted;
        let payload = artifact.bytecode.creation_payload(&args.encode());

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tracing::info!(
            contract = %artifact.name,
            code_hash = %artifact.bytecode.hash(),
            bytes = payload.len(),
            "Submitting creation transaction"
        );
        let tx_hash = self.chain.send_creation(payload.clone()).await?;
        state = transition(state, DeploymentState::Submitted { tx_hash });

        state = transition(state, DeploymentState::AwaitingConfirmation { tx_hash });
        let receipt = self.await_receipt(tx_hash, cancel).await;

        let final_state = match receipt {
            None => DeploymentState::TimedOut { tx_hash },
            Some(receipt) if !receipt.success => {
                let reason = self.revert_reason(payload, &receipt).await;
                DeploymentState::Reverted { tx_hash, reason }
            }
            Some(receipt) => {
                let address = receipt.contract_address.ok_or_else(|| {
                    Error::rpc(format!("receipt for {} has no contract address", tx_hash))
                })?;
                DeploymentState::Confirmed(DeployedContract {
                    chain_id,
                    address,
                    creation_tx_hash: Some(tx_hash),
                })
            }
        };

        Ok(transition(state, final_state))
    }

    /// Poll for a sufficiently deep receipt; `None` means the budget ran out
    async fn await_receipt(
        &self,
        tx_hash: B256,
        cancel: &CancellationToken,
    ) -> Option<ReceiptInfo> {
        let chain = &*self.chain;
        let confirmations = self.confirmations;

        let polling = poll(self.poll, &*self.sleeper, cancel, |attempt| async move {
            let receipt = match chain.receipt(tx_hash).await {
                Ok(Some(receipt)) => receipt,
                Ok(None) => {
                    tracing::debug!(%tx_hash, attempt, "Receipt not available yet");
                    return Ok::<_, Infallible>(Step::Continue);
                }
                Err(e) => {
                    tracing::warn!(%tx_hash, attempt, error = %e, "Receipt lookup failed");
                    return Ok(Step::Continue);
                }
            };

            // reverted receipts are final regardless of depth
            if !receipt.success || confirmations <= 1 {
                return Ok(Step::Done(receipt));
            }

            let Some(mined_at) = receipt.block_number else {
                return Ok(Step::Continue);
            };
            match chain.block_number().await {
                Ok(latest) if latest + 1 >= mined_at + confirmations => Ok(Step::Done(receipt)),
                Ok(latest) => {
                    tracing::debug!(
                        %tx_hash,
                        attempt,
                        depth = (latest + 1).saturating_sub(mined_at),
                        required = confirmations,
                        "Waiting for confirmations"
                    );
                    Ok(Step::Continue)
                }
                Err(e) => {
                    tracing::warn!(%tx_hash, attempt, error = %e, "Block number lookup failed");
                    Ok(Step::Continue)
                }
            }
        });

        match tokio::time::timeout(self.timeout, polling).await {
            Ok(Ok(PollOutcome::Done { value, .. })) => Some(value),
            Ok(Ok(PollOutcome::Exhausted { attempts })) => {
                tracing::warn!(%tx_hash, attempts, "No confirmed receipt within the attempt budget");
                None
            }
            Ok(Ok(PollOutcome::Cancelled { attempts })) => {
                tracing::warn!(%tx_hash, attempts, "Confirmation wait cancelled");
                None
            }
            Ok(Err(never)) => match never {},
            Err(_) => {
                tracing::warn!(%tx_hash, timeout = ?self.timeout, "Confirmation wait timed out");
                None
            }
        }
    }

    async fn revert_reason(&self, payload: Bytes, receipt: &ReceiptInfo) -> Option<String> {
        let block = receipt.block_number?;
        match self.chain.revert_reason(payload, block).await {
            Ok(reason) => reason,
            Err(e) => {
                tracing::debug!(tx_hash = %receipt.tx_hash, error = %e, "Could not extract revert reason");
                None
            }
        }
    }
}

fn transition(from: DeploymentState, to: DeploymentState) -> DeploymentState {
    tracing::info!(from = %from, to = %to, "Deployment state changed");
    to
}
