use clap::Args;
use color_eyre::eyre::{eyre, Result};
use kiln_core::AlloyChainClient;

use super::{Endpoints, ExplorerArgs, NetworkArgs, ProjectArgs};
use crate::output;

#[derive(Args, Debug)]
pub struct StatusCommand {
    /// GUID returned by the explorer on submission
    pub guid: String,

    #[command(flatten)]
    pub project: ProjectArgs,

    #[command(flatten)]
    pub network: NetworkArgs,

    #[command(flatten)]
    pub explorer: ExplorerArgs,
}

impl StatusCommand {
    pub async fn run(self) -> Result<()> {
        let endpoints = Endpoints::resolve(&self.project, &self.network, &self.explorer)?;
        endpoints.require_api_key()?;

        let chain_id = match endpoints.chain_id {
            Some(id) => id,
            None => {
                let rpc_url = endpoints
                    .rpc_url()
                    .map_err(|_| eyre!("Pass --chain-id, --network or --rpc-url"))?;
                let chain = AlloyChainClient::read_only(rpc_url, self.network.request_timeout())?;
                endpoints.chain_id(&chain).await?
            }
        };

        let explorer = endpoints.explorer(chain_id, self.network.request_timeout())?;
        let status = kiln_core::check_status(&explorer, &self.guid).await?;
        output::status(&self.guid, &status);
        Ok(())
    }
}
