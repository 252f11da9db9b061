use std::sync::Arc;

use alloy::primitives::Address;
use clap::Args;
use color_eyre::eyre::Result;
use console::style;
use kiln_core::{AlloyChainClient, Orchestrator, RunPlan};
use tokio_util::sync::CancellationToken;

use super::{
    arg_values, execute, Endpoints, ExplorerArgs, NetworkArgs, PollArgs, ProjectArgs, SourceArgs,
};

#[derive(Args, Debug)]
pub struct VerifyCommand {
    /// Contract name, as in out/<NAME>.sol/<NAME>.json
    pub contract: String,

    /// Address of the deployed contract
    #[arg(long)]
    pub address: Address,

    /// Constructor argument used at deployment; repeat in declaration order
    #[arg(long = "arg", value_name = "VALUE")]
    pub args: Vec<String>,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub project: ProjectArgs,

    #[command(flatten)]
    pub network: NetworkArgs,

    #[command(flatten)]
    pub explorer: ExplorerArgs,

    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub poll: PollArgs,
}

impl VerifyCommand {
    pub async fn run(self, cancel: &CancellationToken) -> Result<()> {
        let endpoints = Endpoints::resolve(&self.project, &self.network, &self.explorer)?;
        let rpc_url = endpoints.rpc_url()?;
        endpoints.require_api_key()?;

        // no signer: this command never sends a transaction
        let chain = Arc::new(AlloyChainClient::read_only(
            rpc_url,
            self.network.request_timeout(),
        )?);
        let chain_id = endpoints.chain_id(chain.as_ref()).await?;
        let explorer = endpoints.explorer(chain_id, self.network.request_timeout())?;

        println!(
            "{} Verifying {} at {} on chain {}",
            style("→").blue(),
            style(&self.contract).cyan(),
            style(self.address).yellow(),
            style(chain_id).yellow()
        );

        let artifacts = Arc::new(self.project.artifacts(self.source.source.as_ref()));
        let config = self.poll.run_config(&self.network, chain_id);
        let orchestrator =
            Orchestrator::new(artifacts, chain, config).with_explorer(Arc::new(explorer));

        let plan = RunPlan {
            contract: self.contract,
            args: arg_values(&self.args),
            existing_address: Some(self.address),
            verification: Some(self.source.plan()),
        };

        execute(orchestrator, plan, self.json, cancel).await
    }
}
