//! Artifact loading trait and filesystem implementation
//!
//! Reads compiled contracts from either a Foundry (`out/`) or a Hardhat
//! (`artifacts/contracts/`) build directory, plus the flattened source file
//! submitted for verification.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::abi::{Abi, ConstructorInfo};
use crate::bytecode::Bytecode;
use crate::error::{Error, Result};

// =============================================================================
// Artifact Types
// =============================================================================

/// A compiled contract ready to deploy
#[derive(Debug, Clone)]
pub struct DeploymentArtifact {
    pub name: String,
    pub abi: Abi,
    pub bytecode: Bytecode,
    /// Compiler settings recorded in the artifact metadata, if any
    pub compiler: Option<CompilerSettings>,
}

impl DeploymentArtifact {
    pub fn constructor(&self) -> Option<ConstructorInfo> {
        self.abi.constructor()
    }
}

/// Compiler settings needed to reproduce the bytecode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerSettings {
    /// Long version, e.g. `0.8.20+commit.a1b79de6`
    pub version: String,
    pub optimizer_enabled: bool,
    pub optimizer_runs: u32,
}

impl CompilerSettings {
    /// Version tag in the form explorers expect (`v0.8.20+commit.a1b79de6`)
    pub fn version_tag(&self) -> String {
        if self.version.starts_with('v') {
            self.version.clone()
        } else {
            format!("v{}", self.version)
        }
    }
}

/// Raw artifact JSON (forge and hardhat share `abi` and `bytecode`)
#[derive(Debug, Deserialize)]
struct RawArtifact {
    abi: serde_json::Value,
    bytecode: RawBytecode,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

/// Forge nests bytecode under `object`; hardhat stores the hex string directly
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Object { object: String },
    Hex(String),
}

impl RawBytecode {
    fn as_hex(&self) -> &str {
        match self {
            RawBytecode::Object { object } => object,
            RawBytecode::Hex(hex) => hex,
        }
    }
}

/// Parse an artifact from its JSON text
pub fn parse_artifact(name: &str, json: &str) -> Result<DeploymentArtifact> {
    let raw: RawArtifact = serde_json::from_str(json)
        .map_err(|e| Error::artifact(format!("Invalid artifact for '{}': {}", name, e)))?;

    let bytecode = Bytecode::from_hex(raw.bytecode.as_hex())?;
    if bytecode.is_empty() {
        return Err(Error::artifact(format!(
            "Artifact '{}' has no bytecode (may be an interface or abstract contract)",
            name
        )));
    }

    Ok(DeploymentArtifact {
        name: name.to_string(),
        abi: Abi::from_value(&raw.abi)?,
        bytecode,
        compiler: raw.metadata.as_ref().and_then(compiler_settings),
    })
}

/// Pull compiler settings out of solc metadata, tolerating its string form
fn compiler_settings(metadata: &serde_json::Value) -> Option<CompilerSettings> {
    let parsed;
    let metadata = match metadata {
        serde_json::Value::String(s) => {
            parsed = serde_json::from_str::<serde_json::Value>(s).ok()?;
            &parsed
        }
        other => other,
    };

    let version = metadata.pointer("/compiler/version")?.as_str()?.to_string();
    let optimizer = metadata.pointer("/settings/optimizer");
    let optimizer_enabled = optimizer
        .and_then(|o| o.get("enabled"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let optimizer_runs = optimizer
        .and_then(|o| o.get("runs"))
        .and_then(|v| v.as_u64())
        .and_then(|runs| u32::try_from(runs).ok())
        .unwrap_or(200);

    Some(CompilerSettings {
        version,
        optimizer_enabled,
        optimizer_runs,
    })
}

// =============================================================================
// Trait Definition
// =============================================================================

/// Trait for loading contract artifacts from various sources
pub trait ArtifactSource: Send + Sync {
    /// Load the compiled artifact for a contract
    fn load(&self, name: &str) -> Result<DeploymentArtifact>;

    /// Load the source text submitted for verification
    fn source_text(&self, name: &str) -> Result<String>;
}

// =============================================================================
// Filesystem Implementation
// =============================================================================

/// Artifact source that reads from a project's build output on disk
#[derive(Debug, Clone)]
pub struct FileSystemArtifactSource {
    /// Directories containing compiled artifacts, searched in order
    out_dirs: Vec<PathBuf>,
    /// Directories containing source files, searched in order
    src_dirs: Vec<PathBuf>,
    /// Explicit source file, overriding the directory search
    source_file: Option<PathBuf>,
}

impl FileSystemArtifactSource {
    /// Create a new source with default paths relative to current directory
    pub fn new() -> Self {
        Self::with_root(Path::new("."))
    }

    /// Create a new source with paths relative to the given project root
    pub fn with_root(project_root: &Path) -> Self {
        Self {
            out_dirs: vec![
                project_root.join("out"),
                project_root.join("artifacts").join("contracts"),
            ],
            src_dirs: vec![project_root.join("src"), project_root.join("contracts")],
            source_file: None,
        }
    }

    /// Use a specific (e.g. flattened) source file for verification
    pub fn with_source_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_file = Some(path.into());
        self
    }

    fn find_file(&self, dir: &Path, filename: &str) -> Option<PathBuf> {
        let candidate = dir.join(filename);
        if candidate.is_file() {
            return Some(candidate);
        }

        let entries = std::fs::read_dir(dir).ok()?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if let Some(found) = self.find_file(&path, filename) {
                    return Some(found);
                }
            }
        }

        None
    }
}

impl Default for FileSystemArtifactSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactSource for FileSystemArtifactSource {
    fn load(&self, name: &str) -> Result<DeploymentArtifact> {
        for out_dir in &self.out_dirs {
            let path = out_dir
                .join(format!("{}.sol", name))
                .join(format!("{}.json", name));
            if let Ok(content) = std::fs::read_to_string(&path) {
                let artifact = parse_artifact(name, &content)?;
                tracing::debug!(
                    path = %path.display(),
                    abi_items = artifact.abi.item_count(),
                    bytecode_len = artifact.bytecode.len(),
                    "Loaded artifact"
                );
                return Ok(artifact);
            }
        }

        Err(Error::artifact(format!(
            "Could not find artifact for contract '{}'. Make sure the project was compiled.",
            name
        )))
    }

    fn source_text(&self, name: &str) -> Result<String> {
        let path = match &self.source_file {
            Some(path) => path.clone(),
            None => {
                let filename = format!("{}.sol", name);
                self.src_dirs
                    .iter()
                    .find_map(|dir| self.find_file(dir, &filename))
                    .ok_or_else(|| {
                        Error::artifact(format!("Could not find source file '{}'", filename))
                    })?
            }
        };

        std::fs::read_to_string(&path).map_err(|e| {
            Error::artifact(format!("Failed to read source '{}': {}", path.display(), e))
        })
    }
}
