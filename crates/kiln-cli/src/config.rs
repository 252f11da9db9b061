use std::collections::HashMap;
use std::path::Path;

use color_eyre::eyre::{eyre, Result};
use serde::Deserialize;

const FOUNDRY_CONFIG: &str = "foundry.toml";

/// The parts of foundry.toml kiln reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FoundryConfig {
    #[serde(default)]
    pub rpc_endpoints: HashMap<String, RpcEndpoint>,
    #[serde(default)]
    pub etherscan: HashMap<String, EtherscanConfig>,
}

/// RPC endpoint can be a string or an object with url field
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RpcEndpoint {
    Url(String),
    Object { url: String },
}

impl RpcEndpoint {
    pub fn url(&self) -> &str {
        match self {
            RpcEndpoint::Url(url) => url,
            RpcEndpoint::Object { url } => url,
        }
    }
}

/// Explorer settings for a network
#[derive(Debug, Clone, Deserialize)]
pub struct EtherscanConfig {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub chain: Option<u64>,
}

impl FoundryConfig {
    /// Load foundry.toml from a project root; a missing file is an empty config
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(FOUNDRY_CONFIG);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
        let config: FoundryConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get a network configuration by name, resolving environment variables
    pub fn get_network(&self, name: &str) -> Result<NetworkConfig> {
        let rpc_endpoint = self.rpc_endpoints.get(name).ok_or_else(|| {
            let mut known = self.network_names();
            known.sort_unstable();
            eyre!(
                "Network '{}' not found in foundry.toml [rpc_endpoints] (known: {})",
                name,
                if known.is_empty() { "none".to_string() } else { known.join(", ") }
            )
        })?;

        let rpc_url = resolve_env_vars(rpc_endpoint.url())?;
        let etherscan = self.etherscan.get(name);

        let explorer_url = etherscan
            .and_then(|e| e.url.as_deref())
            .map(resolve_env_vars)
            .transpose()?;
        let api_key = etherscan
            .and_then(|e| e.key.as_deref())
            .map(resolve_env_vars)
            .transpose()?;

        Ok(NetworkConfig {
            name: name.to_string(),
            rpc_url,
            explorer_url,
            api_key,
            chain_id: etherscan.and_then(|e| e.chain),
        })
    }

    /// Get all network names defined in foundry.toml
    pub fn network_names(&self) -> Vec<&str> {
        self.rpc_endpoints.keys().map(|s| s.as_str()).collect()
    }
}

/// Network configuration extracted from foundry.toml
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub name: String,
    pub rpc_url: String,
    pub explorer_url: Option<String>,
    pub api_key: Option<String>,
    pub chain_id: Option<u64>,
}

/// Expand `${VAR_NAME}` references anywhere in a string
pub fn resolve_env_vars(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| eyre!("Unterminated variable reference in '{}'", value))?;
        let var_name = &after[..end];
        let resolved = std::env::var(var_name)
            .map_err(|_| eyre!("Environment variable '{}' not set", var_name))?;
        out.push_str(&resolved);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}
