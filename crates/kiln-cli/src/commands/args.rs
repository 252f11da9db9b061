use clap::Args;
use color_eyre::eyre::Result;
use kiln_core::{ArtifactSource, ConstructorArgs};

use super::{arg_values, ProjectArgs};

#[derive(Args, Debug)]
pub struct ArgsCommand {
    /// Contract name, as in out/<NAME>.sol/<NAME>.json
    pub contract: String,

    /// Constructor argument; repeat in declaration order
    #[arg(long = "arg", value_name = "VALUE")]
    pub args: Vec<String>,

    /// Print the full creation payload (bytecode followed by arguments)
    #[arg(long)]
    pub with_bytecode: bool,

    #[command(flatten)]
    pub project: ProjectArgs,
}

impl ArgsCommand {
    pub fn run(self) -> Result<()> {
        let artifact = self.project.artifacts(None).load(&self.contract)?;
        let constructor = artifact.constructor();
        let args = ConstructorArgs::for_constructor(constructor.as_ref(), &arg_values(&self.args))?;

        if let Some(constructor) = &constructor {
            tracing::info!(signature = %constructor.signature(), "Encoding constructor arguments");
        }

        // Just print the payload for easy scripting: $(kiln args Vault --arg ...)
        if self.with_bytecode {
            let payload = artifact.bytecode.creation_payload(&args.encode());
            println!("{}", payload);
        } else {
            println!("{}", args.encode_hex());
        }

        Ok(())
    }
}
