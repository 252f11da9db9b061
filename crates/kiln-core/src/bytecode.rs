//! Bytecode handling utilities
//!
//! Provides type-safe bytecode operations including parsing, validation,
//! creation payload assembly and hash computation.

use alloy::primitives::{keccak256, Bytes};

use crate::error::{Error, Result};

/// Represents compiled contract creation bytecode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bytecode {
    bytes: Vec<u8>,
}

impl Bytecode {
    /// Create bytecode from a hex string (with or without 0x prefix)
    pub fn from_hex(hex: &str) -> Result<Self> {
        let clean = hex.trim().trim_start_matches("0x");
        if clean.is_empty() {
            return Ok(Self { bytes: Vec::new() });
        }
        if clean.contains("__$") {
            return Err(Error::artifact(
                "bytecode contains unresolved library placeholders; link libraries before deploying",
            ));
        }
        let bytes = hex::decode(clean)?;
        Ok(Self { bytes })
    }

    /// Create bytecode from raw bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Compute the keccak256 hash of the bytecode
    pub fn hash(&self) -> String {
        if self.bytes.is_empty() {
            return String::new();
        }
        format!("{:x}", keccak256(&self.bytes))
    }

    /// Check if the bytecode is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Get the bytecode length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Convert to hex string (with 0x prefix)
    pub fn to_hex(&self) -> String {
        if self.bytes.is_empty() {
            return "0x".to_string();
        }
        format!("0x{}", hex::encode(&self.bytes))
    }

    /// Creation transaction input: bytecode followed by encoded constructor args
    pub fn creation_payload(&self, encoded_args: &[u8]) -> Bytes {
        let mut data = Vec::with_capacity(self.bytes.len() + encoded_args.len());
        data.extend_from_slice(&self.bytes);
        data.extend_from_slice(encoded_args);
        Bytes::from(data)
    }
}
