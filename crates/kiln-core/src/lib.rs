pub mod abi;
pub mod artifact;
pub mod bytecode;
pub mod chain;
pub mod codec;
pub mod config;
pub mod deploy;
pub mod error;
pub mod explorer;
pub mod orchestrator;
pub mod retry;
pub mod types;
pub mod verify;

pub use abi::{Abi, ConstructorInfo, ParamInfo};
pub use artifact::{
    parse_artifact, ArtifactSource, CompilerSettings, DeploymentArtifact, FileSystemArtifactSource,
};
pub use bytecode::Bytecode;
pub use chain::{AlloyChainClient, ChainClient};
pub use codec::{ConstructorArg, ConstructorArgs};
pub use config::RunConfig;
pub use deploy::{DeploymentExecutor, DeploymentState};
pub use error::{DeploymentStage, Error, Result};
pub use explorer::{AbiLookup, EtherscanClient, ExplorerClient, SubmitOutcome, ETHERSCAN_V2_URL};
pub use orchestrator::{Orchestrator, RunPlan, RunReport, VerificationPlan};
pub use retry::{poll, InstantSleeper, PollOutcome, PollPolicy, SharedSleeper, Sleeper, Step, TokioSleeper};
pub use types::*;
pub use verify::{check_status, VerificationCoordinator, VerificationOutcome, VerificationSettings};
