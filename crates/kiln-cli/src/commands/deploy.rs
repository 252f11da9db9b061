use std::sync::Arc;

use alloy::primitives::Address;
use clap::Args;
use color_eyre::eyre::Result;
use console::style;
use dialoguer::Confirm;
use kiln_core::{AlloyChainClient, ArtifactSource, ConstructorArgs, Orchestrator, RunPlan};
use tokio_util::sync::CancellationToken;

use super::{
    arg_values, execute, Endpoints, ExplorerArgs, NetworkArgs, PollArgs, ProjectArgs, SourceArgs,
};

#[derive(Args, Debug)]
pub struct DeployCommand {
    /// Contract name, as in out/<NAME>.sol/<NAME>.json
    pub contract: String,

    /// Constructor argument; repeat in declaration order
    #[arg(long = "arg", value_name = "VALUE")]
    pub args: Vec<String>,

    /// Key used to sign the creation transaction
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// Verify this existing deployment instead of deploying again
    #[arg(long)]
    pub address: Option<Address>,

    /// Deploy only, skip source verification
    #[arg(long)]
    pub no_verify: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

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

impl DeployCommand {
    pub async fn run(self, cancel: &CancellationToken) -> Result<()> {
        // credentials and arguments are checked before anything is sent
        let endpoints = Endpoints::resolve(&self.project, &self.network, &self.explorer)?;
        let rpc_url = endpoints.rpc_url()?;
        if !self.no_verify {
            endpoints.require_api_key()?;
        }

        let artifacts = Arc::new(self.project.artifacts(self.source.source.as_ref()));
        let artifact = artifacts.load(&self.contract)?;
        let constructor = artifact.constructor();
        let values = arg_values(&self.args);
        let args = ConstructorArgs::for_constructor(constructor.as_ref(), &values)?;

        let chain = Arc::new(AlloyChainClient::new(
            rpc_url,
            &self.private_key,
            self.network.request_timeout(),
        )?);
        let chain_id = endpoints.chain_id(chain.as_ref()).await?;

        println!(
            "{} Deploying {} to chain {}",
            style("→").blue(),
            style(&self.contract).cyan(),
            style(chain_id).yellow()
        );
        if let Some(deployer) = chain.signer_address() {
            println!("   Deployer:    {}", style(deployer).yellow());
        }
        if !artifact.abi.has_constructor_with_args() {
            println!("   Constructor: {}", style("no arguments").dim());
        } else if let Some(constructor) = &constructor {
            println!("   Constructor: {}", constructor.signature());
            for (input, value) in constructor.inputs.iter().zip(&self.args) {
                println!("     {} = {}", style(&input.name).dim(), value);
            }
        }
        if let Some(address) = self.address {
            println!("   Existing:    {}", style(address).yellow());
        }
        println!();

        if !self.yes && !confirm()? {
            println!("{} Aborted", style("!").yellow());
            return Ok(());
        }

        let config = self.poll.run_config(&self.network, chain_id);
        let mut orchestrator = Orchestrator::new(artifacts, chain, config);
        if !self.no_verify {
            let explorer = endpoints.explorer(chain_id, self.network.request_timeout())?;
            orchestrator = orchestrator.with_explorer(Arc::new(explorer));
        }

        tracing::debug!(args = %args.encode_hex(), "Encoded constructor arguments");

        let plan = RunPlan {
            contract: self.contract,
            args: values,
            existing_address: self.address,
            verification: (!self.no_verify).then(|| self.source.plan()),
        };

        execute(orchestrator, plan, self.json, cancel).await
    }
}

fn confirm() -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt("Send the deployment transaction?")
        .default(false)
        .interact()?;
    Ok(confirmed)
}
