//! ABI parsing utilities
//!
//! Provides the [`Abi`] struct for declarative access to the parts of a
//! contract interface a deployment needs: the constructor and its typed inputs.

use alloy::json_abi::{JsonAbi, Param, StateMutability};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// =============================================================================
// Abi Struct
// =============================================================================

/// Wrapper around alloy's JsonAbi
#[derive(Debug, Clone, PartialEq)]
pub struct Abi(JsonAbi);

impl Abi {
    /// Parse a JSON ABI string into an Abi struct
    pub fn parse(json: &str) -> Result<Self, Error> {
        let abi: JsonAbi = serde_json::from_str(json)
            .map_err(|e| Error::artifact(format!("Failed to parse ABI: {}", e)))?;
        Ok(Self(abi))
    }

    /// Parse from a serde_json::Value
    pub fn from_value(value: &serde_json::Value) -> Result<Self, Error> {
        let abi: JsonAbi = serde_json::from_value(value.clone())
            .map_err(|e| Error::artifact(format!("Failed to parse ABI: {}", e)))?;
        Ok(Self(abi))
    }

    /// Get constructor information if present
    pub fn constructor(&self) -> Option<ConstructorInfo> {
        self.0.constructor.as_ref().map(|c| ConstructorInfo {
            inputs: c.inputs.iter().map(ParamInfo::from_abi_param).collect(),
            payable: c.state_mutability == StateMutability::Payable,
        })
    }

    /// Check if the contract has a constructor with arguments
    pub fn has_constructor_with_args(&self) -> bool {
        self.0
            .constructor
            .as_ref()
            .is_some_and(|c| !c.inputs.is_empty())
    }

    /// Number of functions and events, counting overloads
    pub fn item_count(&self) -> usize {
        self.0.functions().count() + self.0.events().count()
    }
}

// =============================================================================
// Constructor Types
// =============================================================================

/// Constructor information extracted from ABI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorInfo {
    pub inputs: Vec<ParamInfo>,
    pub payable: bool,
}

impl ConstructorInfo {
    /// Canonical signature, e.g. `constructor(address,uint256)`
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self.inputs.iter().map(|p| p.param_type.as_str()).collect();
        format!("constructor({})", types.join(","))
    }
}

/// Information about a constructor parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    /// Canonical type with tuples expanded, e.g. `(uint256,bool)[]`
    pub param_type: String,
}

impl ParamInfo {
    /// Create ParamInfo from an alloy Param
    pub fn from_abi_param(param: &Param) -> Self {
        Self {
            name: param.name.clone(),
            param_type: param.selector_type().into_owned(),
        }
    }
}
