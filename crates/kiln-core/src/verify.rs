//! Source verification
//!
//! [`VerificationCoordinator`] checks whether the explorer already knows the
//! contract, submits the source once, then polls the returned GUID on a fixed
//! schedule. Every explorer answer becomes a [`VerificationStatus`]; a failed
//! or undecided verification never surfaces as an error.

use std::convert::Infallible;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::abi::ConstructorInfo;
use crate::codec::ConstructorArgs;
use crate::error::Result;
use crate::explorer::{AbiLookup, ExplorerClient, SubmitOutcome};
use crate::retry::{poll, PollOutcome, PollPolicy, SharedSleeper, Step};
use crate::types::{
    CodeFormat, DeployedContract, License, VerificationRequest, VerificationStatus,
    VerificationTicket,
};

/// Compiler and source details submitted alongside the address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationSettings {
    pub contract_name: String,
    pub source_text: String,
    pub code_format: CodeFormat,
    /// Full compiler tag, e.g. `v0.8.20+commit.a1b79de6`
    pub compiler_version: String,
    pub optimization_used: bool,
    pub optimization_runs: u32,
    pub license: License,
}

impl VerificationSettings {
    fn request(&self, contract: &DeployedContract, args: &ConstructorArgs) -> VerificationRequest {
        VerificationRequest {
            contract_address: contract.address,
            contract_name: self.contract_name.clone(),
            source_text: self.source_text.clone(),
            code_format: self.code_format,
            compiler_version: self.compiler_version.clone(),
            optimization_used: self.optimization_used,
            optimization_runs: self.optimization_runs,
            constructor_args: args.encode_hex(),
            license: self.license,
        }
    }
}

/// Final verification result for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    /// GUID of the accepted submission, if one was made
    pub guid: Option<String>,
    /// Status checks performed
    pub poll_attempts: u32,
    /// Why the status is what it is, when there is more to say
    pub detail: Option<String>,
}

impl VerificationOutcome {
    fn new(status: VerificationStatus) -> Self {
        Self {
            status,
            guid: None,
            poll_attempts: 0,
            detail: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    fn with_ticket(mut self, ticket: &VerificationTicket, attempts: u32) -> Self {
        self.guid = Some(ticket.guid.clone());
        self.poll_attempts = attempts;
        self
    }
}

pub struct VerificationCoordinator {
    explorer: Arc<dyn ExplorerClient>,
    sleeper: SharedSleeper,
    poll: PollPolicy,
}

impl VerificationCoordinator {
    pub fn new(explorer: Arc<dyn ExplorerClient>, sleeper: SharedSleeper, poll: PollPolicy) -> Self {
        Self {
            explorer,
            sleeper,
            poll,
        }
    }

    /// Verify `contract`'s source.
    ///
    /// Returns `Err` only when `args` do not match `constructor`; that check
    /// happens before anything is sent.
    pub async fn verify(
        &self,
        contract: &DeployedContract,
        constructor: Option<&ConstructorInfo>,
        args: &ConstructorArgs,
        settings: &VerificationSettings,
        cancel: &CancellationToken,
    ) -> Result<VerificationOutcome> {
        args.check_signature(constructor)?;
        let address = contract.address;

        match self.explorer.fetch_abi(address).await {
            Ok(AbiLookup::Verified(_)) => {
                tracing::info!(%address, "Source already verified, skipping submission");
                return Ok(VerificationOutcome::new(VerificationStatus::Verified)
                    .with_detail("already verified"));
            }
            Ok(AbiLookup::NotVerified) => {}
            Err(e) => {
                tracing::warn!(%address, error = %e, "Verification pre-check failed, submitting anyway");
            }
        }

        if cancel.is_cancelled() {
            return Ok(VerificationOutcome::new(VerificationStatus::Unknown)
                .with_detail("cancelled before submission"));
        }

        let request = settings.request(contract, args);
        tracing::info!(
            %address,
            contract = %request.contract_name,
            compiler = %request.compiler_version,
            "Submitting source for verification"
        );

        let ticket = match self.explorer.submit_source(&request).await {
            SubmitOutcome::Submitted(guid) => VerificationTicket::new(guid),
            SubmitOutcome::Rejected(reason) => {
                if reason.to_ascii_lowercase().contains("already verified") {
                    tracing::info!(%address, "Explorer reports source already verified");
                    return Ok(VerificationOutcome::new(VerificationStatus::Verified)
                        .with_detail(reason));
                }
                tracing::warn!(%address, %reason, "Verification submission rejected");
                return Ok(VerificationOutcome::new(VerificationStatus::Rejected(reason)));
            }
            SubmitOutcome::TransientError(cause) => {
                tracing::warn!(%address, %cause, "Verification submission failed");
                return Ok(VerificationOutcome::new(VerificationStatus::Unknown)
                    .with_detail(format!("submission failed: {}", cause)));
            }
        };

        tracing::info!(%address, guid = %ticket.guid, "Verification submitted");
        Ok(self.await_verdict(&ticket, cancel).await)
    }

    async fn await_verdict(
        &self,
        ticket: &VerificationTicket,
        cancel: &CancellationToken,
    ) -> VerificationOutcome {
        let explorer = &*self.explorer;
        let guid = ticket.guid.as_str();

        let polled = poll(self.poll, &*self.sleeper, cancel, |attempt| async move {
            let status = match explorer.check_status(guid).await {
                Ok(text) => VerificationStatus::from_explorer_text(&text),
                Err(e) => {
                    tracing::warn!(guid, attempt, error = %e, "Status check failed");
                    return Ok::<_, Infallible>(Step::Continue);
                }
            };

            tracing::debug!(guid, attempt, status = %status, "Verification status");
            if status.is_terminal() {
                Ok(Step::Done(status))
            } else {
                Ok(Step::Continue)
            }
        })
        .await;

        let polled = match polled {
            Ok(outcome) => outcome,
            Err(never) => match never {},
        };
        match polled {
            PollOutcome::Done { value, attempts } => {
                tracing::info!(guid, attempts, status = %value, "Verification finished");
                VerificationOutcome::new(value).with_ticket(ticket, attempts)
            }
            PollOutcome::Exhausted { attempts } => {
                tracing::warn!(guid, attempts, "No verification verdict within the attempt budget");
                VerificationOutcome::new(VerificationStatus::Unknown)
                    .with_ticket(ticket, attempts)
                    .with_detail(format!("no verdict after {} status checks", attempts))
            }
            PollOutcome::Cancelled { attempts } => {
                tracing::warn!(guid, attempts, "Verification polling cancelled");
                VerificationOutcome::new(VerificationStatus::Unknown)
                    .with_ticket(ticket, attempts)
                    .with_detail("cancelled while polling")
            }
        }
    }
}

/// One status check for a known GUID, mapped
pub async fn check_status(explorer: &dyn ExplorerClient, guid: &str) -> Result<VerificationStatus> {
    let text = explorer.check_status(guid).await?;
    Ok(VerificationStatus::from_explorer_text(&text))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use alloy::primitives::{address, Address};
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::abi::ParamInfo;
    use crate::error::Error;
    use crate::retry::{InstantSleeper, TokioSleeper};

    const VAULT: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

    struct MockExplorer {
        lookup: Result<AbiLookup>,
        submit: SubmitOutcome,
        statuses: Mutex<VecDeque<Result<String>>>,
        submits: AtomicUsize,
        polls: AtomicUsize,
        last_request: Mutex<Option<VerificationRequest>>,
    }

    impl MockExplorer {
        fn new(submit: SubmitOutcome, statuses: Vec<Result<String>>) -> Self {
            Self {
                lookup: Ok(AbiLookup::NotVerified),
                submit,
                statuses: Mutex::new(statuses.into()),
                submits: AtomicUsize::new(0),
                polls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ExplorerClient for MockExplorer {
        async fn fetch_abi(&self, _address: Address) -> Result<AbiLookup> {
            match &self.lookup {
                Ok(lookup) => Ok(lookup.clone()),
                Err(e) => Err(Error::explorer(e.to_string())),
            }
        }

        async fn submit_source(&self, request: &VerificationRequest) -> SubmitOutcome {
            self.submits.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            self.submit.clone()
        }

        async fn check_status(&self, _guid: &str) -> Result<String> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("Pending in queue".to_string()))
        }
    }

    fn contract() -> DeployedContract {
        DeployedContract {
            chain_id: 11155111,
            address: VAULT,
            creation_tx_hash: None,
        }
    }

    fn settings() -> VerificationSettings {
        VerificationSettings {
            contract_name: "EducationVault".to_string(),
            source_text: "contract EducationVault {}".to_string(),
            code_format: CodeFormat::SoliditySingleFile,
            compiler_version: "v0.8.20+commit.a1b79de6".to_string(),
            optimization_used: false,
            optimization_runs: 200,
            license: License::Mit,
        }
    }

    fn constructor() -> ConstructorInfo {
        ConstructorInfo {
            inputs: vec![ParamInfo {
                name: "token".to_string(),
                param_type: "address".to_string(),
            }],
            payable: false,
        }
    }

    fn args() -> ConstructorArgs {
        ConstructorArgs::parse(&[("address", json!("0x94a9D9AC8a22534E3FaCa9F4e7F2E2cf85d5E4C8"))])
            .unwrap()
    }

    fn coordinator(explorer: Arc<MockExplorer>, max_attempts: u32) -> VerificationCoordinator {
        VerificationCoordinator::new(
            explorer,
            Arc::new(InstantSleeper),
            PollPolicy::new(Duration::ZERO, max_attempts),
        )
    }

    async fn run(explorer: Arc<MockExplorer>, max_attempts: u32) -> Result<VerificationOutcome> {
        coordinator(explorer, max_attempts)
            .verify(
                &contract(),
                Some(&constructor()),
                &args(),
                &settings(),
                &CancellationToken::new(),
            )
            .await
    }

    #[tokio::test]
    async fn test_verified_after_polling() {
        let explorer = Arc::new(MockExplorer::new(
            SubmitOutcome::Submitted("G123".to_string()),
            vec![
                Ok("Pending in queue".to_string()),
                Ok("Pending in queue".to_string()),
                Ok("Pass - Verified".to_string()),
            ],
        ));

        let outcome = run(explorer.clone(), 10).await.unwrap();

        assert_eq!(outcome.status, VerificationStatus::Verified);
        assert_eq!(outcome.guid.as_deref(), Some("G123"));
        assert_eq!(outcome.poll_attempts, 3);
        assert_eq!(explorer.polls.load(Ordering::SeqCst), 3);

        let request = explorer.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.contract_address, VAULT);
        assert_eq!(request.constructor_args, args().encode_hex());
        assert!(!request.constructor_args.starts_with("0x"));
    }

    #[tokio::test]
    async fn test_already_verified_skips_submission() {
        let mut explorer = MockExplorer::new(SubmitOutcome::Submitted("G1".to_string()), vec![]);
        explorer.lookup = Ok(AbiLookup::Verified("[]".to_string()));
        let explorer = Arc::new(explorer);

        let outcome = run(explorer.clone(), 10).await.unwrap();

        assert_eq!(outcome.status, VerificationStatus::Verified);
        assert_eq!(explorer.submits.load(Ordering::SeqCst), 0);
        assert_eq!(explorer.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pre_check_failure_still_submits() {
        let mut explorer = MockExplorer::new(
            SubmitOutcome::Submitted("G1".to_string()),
            vec![Ok("Pass - Verified".to_string())],
        );
        explorer.lookup = Err(Error::explorer("HTTP 503"));
        let explorer = Arc::new(explorer);

        let outcome = run(explorer.clone(), 10).await.unwrap();

        assert_eq!(outcome.status, VerificationStatus::Verified);
        assert_eq!(explorer.submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_submission_is_not_polled() {
        let explorer = Arc::new(MockExplorer::new(
            SubmitOutcome::Rejected("compiler version mismatch".to_string()),
            vec![],
        ));

        let outcome = run(explorer.clone(), 10).await.unwrap();

        assert_eq!(
            outcome.status,
            VerificationStatus::Rejected("compiler version mismatch".to_string())
        );
        assert_eq!(outcome.poll_attempts, 0);
        assert_eq!(explorer.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_already_verified_rejection_counts_as_verified() {
        let explorer = Arc::new(MockExplorer::new(
            SubmitOutcome::Rejected("Contract source code already verified".to_string()),
            vec![],
        ));

        let outcome = run(explorer, 10).await.unwrap();
        assert_eq!(outcome.status, VerificationStatus::Verified);
    }

    #[tokio::test]
    async fn test_transient_submission_is_unknown() {
        let explorer = Arc::new(MockExplorer::new(
            SubmitOutcome::TransientError("HTTP 502".to_string()),
            vec![],
        ));

        let outcome = run(explorer.clone(), 10).await.unwrap();

        assert_eq!(outcome.status, VerificationStatus::Unknown);
        assert!(outcome.detail.unwrap().contains("HTTP 502"));
        assert_eq!(explorer.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_polling_is_unknown() {
        let explorer = Arc::new(MockExplorer::new(
            SubmitOutcome::Submitted("G123".to_string()),
            vec![],
        ));

        let outcome = run(explorer.clone(), 4).await.unwrap();

        assert_eq!(outcome.status, VerificationStatus::Unknown);
        assert_eq!(outcome.guid.as_deref(), Some("G123"));
        assert_eq!(outcome.poll_attempts, 4);
        assert_eq!(explorer.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_status_check_errors_are_not_terminal() {
        let explorer = Arc::new(MockExplorer::new(
            SubmitOutcome::Submitted("G123".to_string()),
            vec![
                Err(Error::explorer("HTTP 503")),
                Ok("Fail - Unable to verify".to_string()),
            ],
        ));

        let outcome = run(explorer, 10).await.unwrap();

        assert_eq!(
            outcome.status,
            VerificationStatus::Rejected("Fail - Unable to verify".to_string())
        );
        assert_eq!(outcome.poll_attempts, 2);
    }

    #[tokio::test]
    async fn test_argument_mismatch_is_an_error() {
        let explorer = Arc::new(MockExplorer::new(
            SubmitOutcome::Submitted("G1".to_string()),
            vec![],
        ));

        let err = coordinator(explorer.clone(), 10)
            .verify(
                &contract(),
                Some(&constructor()),
                &ConstructorArgs::default(),
                &settings(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "ARG_ENCODING_ERROR");
        assert_eq!(explorer.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_submission() {
        let explorer = Arc::new(MockExplorer::new(
            SubmitOutcome::Submitted("G1".to_string()),
            vec![],
        ));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = coordinator(explorer.clone(), 10)
            .verify(&contract(), Some(&constructor()), &args(), &settings(), &cancel)
            .await
            .unwrap();

        assert_eq!(outcome.status, VerificationStatus::Unknown);
        assert_eq!(explorer.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_polling_is_unknown() {
        let explorer = Arc::new(MockExplorer::new(
            SubmitOutcome::Submitted("G123".to_string()),
            vec![],
        ));
        let coordinator = VerificationCoordinator::new(
            explorer.clone(),
            Arc::new(TokioSleeper),
            PollPolicy::new(Duration::from_secs(3600), 10),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let outcome = coordinator
            .verify(&contract(), Some(&constructor()), &args(), &settings(), &cancel)
            .await
            .unwrap();

        assert_eq!(outcome.status, VerificationStatus::Unknown);
        assert_eq!(outcome.guid.as_deref(), Some("G123"));
        assert_eq!(outcome.poll_attempts, 1);
        assert_eq!(outcome.detail.as_deref(), Some("cancelled while polling"));
        assert_eq!(explorer.submits.load(Ordering::SeqCst), 1);
        assert_eq!(explorer.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_status_check() {
        let explorer = Arc::new(MockExplorer::new(
            SubmitOutcome::Submitted("G1".to_string()),
            vec![Ok("Pending in queue".to_string())],
        ));

        let status = check_status(explorer.as_ref(), "G1").await.unwrap();
        assert_eq!(status, VerificationStatus::InQueue);
        assert_eq!(explorer.submits.load(Ordering::SeqCst), 0);
    }
}
