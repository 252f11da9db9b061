use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Re-export alloy types for convenience
pub use alloy::primitives::{Address, Bytes, B256};

// =============================================================================
// Deployment
// =============================================================================

/// A contract confirmed on chain, or one supplied up front by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployedContract {
    pub chain_id: u64,
    pub address: Address,
    /// `None` when the address was supplied rather than deployed in this run
    pub creation_tx_hash: Option<B256>,
}

impl DeployedContract {
    /// Whether this run created the contract
    pub fn is_fresh(&self) -> bool {
        self.creation_tx_hash.is_some()
    }
}

/// Minimal view of a transaction receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptInfo {
    pub tx_hash: B256,
    pub success: bool,
    pub block_number: Option<u64>,
    pub contract_address: Option<Address>,
}

// =============================================================================
// Verification
// =============================================================================

/// Source layout accepted by the explorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodeFormat {
    #[default]
    SoliditySingleFile,
    SolidityStandardJsonInput,
}

impl CodeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeFormat::SoliditySingleFile => "solidity-single-file",
            CodeFormat::SolidityStandardJsonInput => "solidity-standard-json-input",
        }
    }
}

impl fmt::Display for CodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CodeFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solidity-single-file" => Ok(CodeFormat::SoliditySingleFile),
            "solidity-standard-json-input" => Ok(CodeFormat::SolidityStandardJsonInput),
            other => Err(format!("unknown code format '{}'", other)),
        }
    }
}

/// Etherscan license type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum License {
    None,
    Unlicense,
    #[default]
    Mit,
    Gpl2,
    Gpl3,
    Lgpl2,
    Lgpl3,
    Bsd2,
    Bsd3,
    Mpl2,
    Osl3,
    Apache2,
    Agpl3,
    Busl11,
}

impl License {
    /// Numeric code sent as `licenseType`
    pub fn code(&self) -> u8 {
        match self {
            License::None => 1,
            License::Unlicense => 2,
            License::Mit => 3,
            License::Gpl2 => 4,
            License::Gpl3 => 5,
            License::Lgpl2 => 6,
            License::Lgpl3 => 7,
            License::Bsd2 => 8,
            License::Bsd3 => 9,
            License::Mpl2 => 10,
            License::Osl3 => 11,
            License::Apache2 => 12,
            License::Agpl3 => 13,
            License::Busl11 => 14,
        }
    }

    const ALL: [License; 14] = [
        License::None,
        License::Unlicense,
        License::Mit,
        License::Gpl2,
        License::Gpl3,
        License::Lgpl2,
        License::Lgpl3,
        License::Bsd2,
        License::Bsd3,
        License::Mpl2,
        License::Osl3,
        License::Apache2,
        License::Agpl3,
        License::Busl11,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            License::None => "none",
            License::Unlicense => "unlicense",
            License::Mit => "mit",
            License::Gpl2 => "gpl2",
            License::Gpl3 => "gpl3",
            License::Lgpl2 => "lgpl2",
            License::Lgpl3 => "lgpl3",
            License::Bsd2 => "bsd2",
            License::Bsd3 => "bsd3",
            License::Mpl2 => "mpl2",
            License::Osl3 => "osl3",
            License::Apache2 => "apache2",
            License::Agpl3 => "agpl3",
            License::Busl11 => "busl11",
        }
    }
}

impl fmt::Display for License {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Accepts a name (`mit`, `gpl3`, ...) or the numeric explorer code
impl FromStr for License {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        License::ALL
            .into_iter()
            .find(|l| l.name() == s || l.code().to_string() == s)
            .ok_or_else(|| format!("unknown license '{}'", s))
    }
}

/// Everything the explorer needs for one source submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub contract_address: Address,
    pub contract_name: String,
    pub source_text: String,
    pub code_format: CodeFormat,
    /// Full compiler tag, e.g. `v0.8.20+commit.a1b79de6`
    pub compiler_version: String,
    pub optimization_used: bool,
    pub optimization_runs: u32,
    /// ABI-encoded constructor arguments, hex without `0x`
    pub constructor_args: String,
    pub license: License,
}

/// Handle returned by an accepted submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationTicket {
    pub guid: String,
    pub submitted_at: SystemTime,
}

impl VerificationTicket {
    pub fn new(guid: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            submitted_at: SystemTime::now(),
        }
    }
}

/// Verification state as reported by the explorer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    InQueue,
    Verified,
    Rejected(String),
    /// No terminal answer during this run; check the explorer manually
    Unknown,
}

impl VerificationStatus {
    /// Map a raw explorer status string.
    ///
    /// The explorer has no structured status, so this substring match is the
    /// only place that interprets its wording.
    pub fn from_explorer_text(text: &str) -> Self {
        let lower = text.to_ascii_lowercase();
        if text.contains("Pass") || text.contains("Verified") || lower.contains("already verified")
        {
            VerificationStatus::Verified
        } else if text.contains("Fail") {
            VerificationStatus::Rejected(text.trim().to_string())
        } else if lower.contains("queue") {
            VerificationStatus::InQueue
        } else {
            VerificationStatus::Pending
        }
    }

    /// Whether polling should stop on this status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VerificationStatus::Verified | VerificationStatus::Rejected(_)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::InQueue => "in queue",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected(_) => "rejected",
            VerificationStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::Rejected(reason) => write!(f, "rejected ({})", reason),
            other => write!(f, "{}", other.as_str()),
        }
    }
}
