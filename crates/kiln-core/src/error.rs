use std::fmt;

use alloy::primitives::B256;
use thiserror::Error;

/// Stage of a deployment at which a fatal failure occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentStage {
    /// Building, signing or broadcasting the creation transaction
    Submission,
}

impl fmt::Display for DeploymentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentStage::Submission => write!(f, "submission"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Constructor argument error: {0}")]
    ArgEncoding(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Explorer error: {0}")]
    Explorer(String),

    #[error("Deployment failed during {stage}: {message}")]
    DeploymentFailed {
        stage: DeploymentStage,
        message: String,
    },

    #[error("Deployment transaction {tx_hash} reverted: {}", .reason.as_deref().unwrap_or("no revert reason available"))]
    DeploymentReverted {
        tx_hash: B256,
        reason: Option<String>,
    },

    #[error("Deployment transaction {tx_hash} was not confirmed in time; it may still be mined")]
    DeploymentAmbiguous { tx_hash: B256 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn rpc(message: impl Into<String>) -> Self {
        Self::Rpc(message.into())
    }

    /// Argument error with the position of the offending argument
    pub fn arg(index: usize, message: impl fmt::Display) -> Self {
        Self::ArgEncoding(format!("argument {}: {}", index, message))
    }

    pub fn artifact(message: impl Into<String>) -> Self {
        Self::Artifact(message.into())
    }

    pub fn explorer(message: impl Into<String>) -> Self {
        Self::Explorer(message.into())
    }

    pub fn submission(message: impl Into<String>) -> Self {
        Self::DeploymentFailed {
            stage: DeploymentStage::Submission,
            message: message.into(),
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Rpc(_) => "RPC_ERROR",
            Error::ArgEncoding(_) => "ARG_ENCODING_ERROR",
            Error::Artifact(_) => "ARTIFACT_ERROR",
            Error::Explorer(_) => "EXPLORER_ERROR",
            Error::DeploymentFailed { .. } => "DEPLOYMENT_FAILED",
            Error::DeploymentReverted { .. } => "DEPLOYMENT_REVERTED",
            Error::DeploymentAmbiguous { .. } => "DEPLOYMENT_AMBIGUOUS",
            Error::Cancelled => "CANCELLED",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Hex(_) => "HEX_DECODE_ERROR",
        }
    }

    /// Ambiguous outcomes need manual reconciliation rather than a retry
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Error::DeploymentAmbiguous { .. } | Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverted_display_with_reason() {
        let err = Error::DeploymentReverted {
            tx_hash: B256::ZERO,
            reason: Some("Ownable: caller is not the owner".to_string()),
        };
        assert!(err
            .to_string()
            .ends_with("reverted: Ownable: caller is not the owner"));
        assert_eq!(err.code(), "DEPLOYMENT_REVERTED");
    }

    #[test]
    fn test_reverted_display_without_reason() {
        let err = Error::DeploymentReverted {
            tx_hash: B256::ZERO,
            reason: None,
        };
        assert!(err.to_string().contains("no revert reason available"));
    }

    #[test]
    fn test_submission_stage() {
        let err = Error::submission("insufficient funds");
        assert_eq!(
            err.to_string(),
            "Deployment failed during submission: insufficient funds"
        );
        assert!(!err.is_ambiguous());
    }

    #[test]
    fn test_ambiguous() {
        let err = Error::DeploymentAmbiguous { tx_hash: B256::ZERO };
        assert!(err.is_ambiguous());
        assert_eq!(err.code(), "DEPLOYMENT_AMBIGUOUS");
    }

    #[test]
    fn test_arg_error_carries_index() {
        let err = Error::arg(2, "expected 20 bytes");
        assert_eq!(
            err.to_string(),
            "Constructor argument error: argument 2: expected 20 bytes"
        );
    }
}
