//! Deploy-then-verify orchestration
//!
//! One [`Orchestrator::run`] loads the artifact, validates and encodes the
//! constructor arguments, deploys (or adopts an existing address) and then
//! verifies. Deployment failures abort the run; verification results are
//! reported next to the contract, never instead of it.

use std::sync::Arc;

use alloy::primitives::Address;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::artifact::{ArtifactSource, DeploymentArtifact};
use crate::chain::ChainClient;
use crate::codec::ConstructorArgs;
use crate::config::RunConfig;
use crate::deploy::{DeploymentExecutor, DeploymentState};
use crate::error::{Error, Result};
use crate::explorer::ExplorerClient;
use crate::retry::{SharedSleeper, TokioSleeper};
use crate::types::{CodeFormat, DeployedContract, License};
use crate::verify::{VerificationCoordinator, VerificationOutcome, VerificationSettings};

/// Optimizer runs assumed when neither the caller nor the artifact says
pub const DEFAULT_OPTIMIZER_RUNS: u32 = 200;

/// What to deploy and how to verify it
#[derive(Debug, Clone, Default)]
pub struct RunPlan {
    pub contract: String,
    /// Constructor values in declaration order
    pub args: Vec<serde_json::Value>,
    /// Reuse a contract that is already live instead of deploying
    pub existing_address: Option<Address>,
    /// `None` skips verification
    pub verification: Option<VerificationPlan>,
}

/// Verification inputs; unset fields fall back to the artifact
#[derive(Debug, Clone, Default)]
pub struct VerificationPlan {
    pub source_text: Option<String>,
    pub compiler_version: Option<String>,
    pub optimization_used: Option<bool>,
    pub optimization_runs: Option<u32>,
    pub code_format: CodeFormat,
    pub license: License,
}

impl VerificationPlan {
    /// Fill gaps from the artifact and its source tree
    pub fn resolve(
        &self,
        artifact: &DeploymentArtifact,
        artifacts: &dyn ArtifactSource,
    ) -> Result<VerificationSettings> {
        let compiler = artifact.compiler.as_ref();

        let compiler_version = match (&self.compiler_version, compiler) {
            (Some(version), _) => normalize_version(version),
            (None, Some(compiler)) => compiler.version_tag(),
            (None, None) => {
                return Err(Error::config(format!(
                    "No compiler version for '{}'; pass one explicitly",
                    artifact.name
                )))
            }
        };

        let source_text = match &self.source_text {
            Some(text) => text.clone(),
            None => artifacts.source_text(&artifact.name)?,
        };

        Ok(VerificationSettings {
            contract_name: artifact.name.clone(),
            source_text,
            code_format: self.code_format,
            compiler_version,
            optimization_used: self
                .optimization_used
                .or(compiler.map(|c| c.optimizer_enabled))
                .unwrap_or(false),
            optimization_runs: self
                .optimization_runs
                .or(compiler.map(|c| c.optimizer_runs))
                .unwrap_or(DEFAULT_OPTIMIZER_RUNS),
            license: self.license,
        })
    }
}

fn normalize_version(version: &str) -> String {
    let version = version.trim();
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{}", version)
    }
}

/// Outcome of a run: where the contract lives, and what the explorer said
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub contract_name: String,
    pub contract: DeployedContract,
    /// Hex, without `0x`
    pub constructor_args: String,
    pub verification: Option<VerificationOutcome>,
}

pub struct Orchestrator {
    artifacts: Arc<dyn ArtifactSource>,
    chain: Arc<dyn ChainClient>,
    explorer: Option<Arc<dyn ExplorerClient>>,
    sleeper: SharedSleeper,
    config: RunConfig,
}

impl Orchestrator {
    pub fn new(
        artifacts: Arc<dyn ArtifactSource>,
        chain: Arc<dyn ChainClient>,
        config: RunConfig,
    ) -> Self {
        Self {
            artifacts,
            chain,
            explorer: None,
            sleeper: Arc::new(TokioSleeper),
            config,
        }
    }

    pub fn with_explorer(mut self, explorer: Arc<dyn ExplorerClient>) -> Self {
        self.explorer = Some(explorer);
        self
    }

    pub fn with_sleeper(mut self, sleeper: SharedSleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub async fn run(&self, plan: &RunPlan, cancel: &CancellationToken) -> Result<RunReport> {
        // everything that can be checked locally is checked before the network
        let artifact = self.artifacts.load(&plan.contract)?;
        let constructor = artifact.constructor();
        let args = ConstructorArgs::for_constructor(constructor.as_ref(), &plan.args)?;

        let verification = match &plan.verification {
            Some(verification) => {
                let Some(explorer) = &self.explorer else {
                    return Err(Error::config(
                        "Verification requested but no explorer is configured",
                    ));
                };
                let settings = verification.resolve(&artifact, &*self.artifacts)?;
                Some((explorer.clone(), settings))
            }
            None => None,
        };

        let chain_id = self.chain.chain_id().await?;
        if let Some(expected) = self.config.expected_chain_id {
            if expected != chain_id {
                return Err(Error::config(format!(
                    "RPC endpoint serves chain {} but chain {} was expected",
                    chain_id, expected
                )));
            }
        }

        let contract = match plan.existing_address {
            Some(address) => self.adopt(chain_id, address).await?,
            None => self.deploy(&artifact, &args, chain_id, cancel).await?,
        };

        let verification = match verification {
            Some((explorer, settings)) => {
                let coordinator = VerificationCoordinator::new(
                    explorer,
                    self.sleeper.clone(),
                    self.config.verification_poll,
                );
                let outcome = coordinator
                    .verify(&contract, constructor.as_ref(), &args, &settings, cancel)
                    .await?;
                Some(outcome)
            }
            None => {
                tracing::debug!("No explorer settings, skipping verification");
                None
            }
        };

        Ok(RunReport {
            contract_name: artifact.name,
            contract,
            constructor_args: args.encode_hex(),
            verification,
        })
    }

    /// Use a contract that is already live; never falls back to deploying
    async fn adopt(&self, chain_id: u64, address: Address) -> Result<DeployedContract> {
        let code = self.chain.code_at(address).await?;
        if code.is_empty() {
            return Err(Error::config(format!(
                "No contract code at {}; refusing to deploy in its place",
                address
            )));
        }

        tracing::info!(%address, "Using existing deployment");
        Ok(DeployedContract {
            chain_id,
            address,
            creation_tx_hash: None,
        })
    }

    async fn deploy(
        &self,
        artifact: &DeploymentArtifact,
        args: &ConstructorArgs,
        chain_id: u64,
        cancel: &CancellationToken,
    ) -> Result<DeployedContract> {
        let executor = DeploymentExecutor::new(self.chain.clone(), self.sleeper.clone(), &self.config);

        match executor.execute(artifact, args, chain_id, cancel).await? {
            DeploymentState::Confirmed(contract) => {
                tracing::info!(address = %contract.address, "Contract deployed");
                Ok(contract)
            }
            DeploymentState::Reverted { tx_hash, reason } => {
                Err(Error::DeploymentReverted { tx_hash, reason })
            }
            DeploymentState::TimedOut { tx_hash } => Err(Error::DeploymentAmbiguous { tx_hash }),
            other => Err(Error::rpc(format!(
                "deployment stopped in non-final state '{}'",
                other
            ))),
        }
    }
}
