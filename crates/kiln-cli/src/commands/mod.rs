//! CLI commands for kiln

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use color_eyre::eyre::{eyre, Result};
use kiln_core::{
    ChainClient, CodeFormat, EtherscanClient, FileSystemArtifactSource, License, Orchestrator,
    PollPolicy, RunConfig, RunPlan, VerificationPlan,
};
use tokio_util::sync::CancellationToken;

use crate::config::FoundryConfig;
use crate::output;

pub mod args;
pub mod deploy;
pub mod status;
pub mod verify;

/// All available CLI commands
#[derive(Subcommand)]
pub enum Command {
    /// Deploy a contract, wait for confirmation and verify its source
    Deploy(deploy::DeployCommand),

    /// Verify the source of an already deployed contract
    Verify(verify::VerifyCommand),

    /// Check a verification submission by GUID
    Status(status::StatusCommand),

    /// Print the ABI-encoded constructor arguments for a contract
    Args(args::ArgsCommand),
}

impl Command {
    /// Execute the command
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        match self {
            Command::Deploy(cmd) => cmd.run(&cancel).await,
            Command::Verify(cmd) => cmd.run(&cancel).await,
            Command::Status(cmd) => cmd.run().await,
            Command::Args(cmd) => cmd.run(),
        }
    }
}

// =============================================================================
// Shared arguments
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project root containing foundry.toml and the build output
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

impl ProjectArgs {
    pub fn artifacts(&self, source: Option<&PathBuf>) -> FileSystemArtifactSource {
        let artifacts = FileSystemArtifactSource::with_root(&self.root);
        match source {
            Some(path) => artifacts.with_source_file(path),
            None => artifacts,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct NetworkArgs {
    /// Network name from foundry.toml [rpc_endpoints]
    #[arg(short, long)]
    pub network: Option<String>,

    /// RPC endpoint URL, overrides the network's endpoint
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Chain id the endpoint must serve
    #[arg(long)]
    pub chain_id: Option<u64>,

    /// Timeout for each RPC and explorer request, in seconds
    #[arg(long, default_value_t = 30)]
    pub request_timeout: u64,
}

impl NetworkArgs {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ExplorerArgs {
    /// Explorer API key
    #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
    pub etherscan_api_key: Option<String>,

    /// Etherscan-compatible API endpoint [default: Etherscan v2]
    #[arg(long)]
    pub explorer_url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Source file to submit, e.g. a flattened file [default: src/<CONTRACT>.sol]
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Full compiler version, e.g. v0.8.20+commit.a1b79de6 [default: from artifact]
    #[arg(long)]
    pub compiler_version: Option<String>,

    /// Whether the optimizer was enabled [default: from artifact]
    #[arg(long)]
    pub optimize: Option<bool>,

    /// Optimizer runs [default: from artifact, else 200]
    #[arg(long)]
    pub optimizer_runs: Option<u32>,

    /// License name or explorer code
    #[arg(long, default_value_t = License::Mit)]
    pub license: License,

    /// Source layout submitted to the explorer
    #[arg(long, default_value_t = CodeFormat::SoliditySingleFile)]
    pub code_format: CodeFormat,
}

impl SourceArgs {
    pub fn plan(&self) -> VerificationPlan {
        VerificationPlan {
            // read through the artifact source so --source is honored
            source_text: None,
            compiler_version: self.compiler_version.clone(),
            optimization_used: self.optimize,
            optimization_runs: self.optimizer_runs,
            code_format: self.code_format,
            license: self.license,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PollArgs {
    /// Blocks the creation transaction must be buried under
    #[arg(long, default_value_t = 1)]
    pub confirmations: u64,

    /// Seconds to wait for the creation transaction before giving up
    #[arg(long, default_value_t = 180)]
    pub confirmation_timeout: u64,

    /// Seconds between verification status checks
    #[arg(long, default_value_t = 5)]
    pub poll_interval: u64,

    /// Maximum verification status checks
    #[arg(long, default_value_t = 10)]
    pub max_polls: u32,
}

impl PollArgs {
    pub fn run_config(&self, network: &NetworkArgs, chain_id: u64) -> RunConfig {
        let defaults = RunConfig::default();
        let receipt_interval = defaults.confirmation_poll.interval;
        let receipt_attempts =
            u32::try_from((self.confirmation_timeout / receipt_interval.as_secs().max(1)).max(1))
                .unwrap_or(u32::MAX);

        RunConfig {
            expected_chain_id: Some(chain_id),
            confirmations: self.confirmations,
            confirmation_poll: PollPolicy::new(receipt_interval, receipt_attempts),
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout),
            verification_poll: PollPolicy::new(
                Duration::from_secs(self.poll_interval),
                self.max_polls,
            ),
            rpc_timeout: network.request_timeout(),
        }
    }
}

// =============================================================================
// Endpoint resolution
// =============================================================================

/// Endpoints and credentials after merging flags with foundry.toml
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    pub rpc_url: Option<String>,
    pub explorer_url: Option<String>,
    pub api_key: Option<String>,
    pub chain_id: Option<u64>,
}

impl Endpoints {
    /// Flags win over the named network
    pub fn resolve(
        project: &ProjectArgs,
        network: &NetworkArgs,
        explorer: &ExplorerArgs,
    ) -> Result<Self> {
        let mut endpoints = Endpoints::default();

        if let Some(name) = &network.network {
            let resolved = FoundryConfig::load(&project.root)?.get_network(name)?;
            tracing::debug!(network = %resolved.name, "Resolved network from foundry.toml");
            endpoints.rpc_url = Some(resolved.rpc_url);
            endpoints.explorer_url = resolved.explorer_url;
            endpoints.api_key = resolved.api_key;
            endpoints.chain_id = resolved.chain_id;
        }

        if network.rpc_url.is_some() {
            endpoints.rpc_url = network.rpc_url.clone();
        }
        if network.chain_id.is_some() {
            endpoints.chain_id = network.chain_id;
        }
        if explorer.etherscan_api_key.is_some() {
            endpoints.api_key = explorer.etherscan_api_key.clone();
        }
        if explorer.explorer_url.is_some() {
            endpoints.explorer_url = explorer.explorer_url.clone();
        }

        Ok(endpoints)
    }

    pub fn rpc_url(&self) -> Result<&str> {
        self.rpc_url
            .as_deref()
            .ok_or_else(|| eyre!("No RPC endpoint: pass --rpc-url or --network"))
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                eyre!("No explorer API key: pass --etherscan-api-key or set ETHERSCAN_API_KEY")
            })
    }

    /// Configured chain id, or the one the node reports
    pub async fn chain_id(&self, chain: &dyn ChainClient) -> Result<u64> {
        match self.chain_id {
            Some(id) => Ok(id),
            None => Ok(chain.chain_id().await?),
        }
    }

    pub fn explorer(&self, chain_id: u64, timeout: Duration) -> Result<EtherscanClient> {
        let client = EtherscanClient::new(self.require_api_key()?, chain_id, timeout)?;
        Ok(match &self.explorer_url {
            Some(url) => client.with_base_url(url),
            None => client,
        })
    }
}

/// Command-line values stay strings; the declared type decides how they parse
pub fn arg_values(raw: &[String]) -> Vec<serde_json::Value> {
    raw.iter()
        .map(|value| serde_json::Value::String(value.clone()))
        .collect()
}

/// Run the orchestrator and print the outcome
pub async fn execute(
    orchestrator: Orchestrator,
    plan: RunPlan,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    match orchestrator.run(&plan, cancel).await {
        Ok(report) => output::report(&report, json),
        Err(err) => {
            output::failure(&err);
            Err(err.into())
        }
    }
}
