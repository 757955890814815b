//! Chain specification descriptor.
//!
//! Only the fields this client reads are modelled; everything else in the
//! chain-spec JSON is ignored.

use serde::Deserialize;
use std::path::Path;

use crate::chain::types::{ChainError, ChainResult, H256};

const WESTEND_ASSET_HUB: &str = include_str!("../../chain-specs/asset-hub-westend.json");

/// Immutable description of the chain to connect to.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainSpecification {
    pub name: String,
    pub id: String,
    #[serde(rename = "chainType", default)]
    pub chain_type: Option<String>,
    #[serde(rename = "bootNodes", default)]
    pub boot_nodes: Vec<String>,
    #[serde(default)]
    pub relay_chain: Option<String>,
    #[serde(default)]
    pub para_id: Option<u32>,
    #[serde(default)]
    pub properties: ChainProperties,
    pub genesis: GenesisInfo,
}

/// Token metadata from the chain spec's `properties`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainProperties {
    #[serde(default)]
    pub token_decimals: Option<u8>,
    #[serde(default)]
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub ss58_format: Option<u16>,
}

/// Genesis section of a light-sync chain spec.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisInfo {
    pub state_root_hash: String,
}

impl ChainSpecification {
    /// Parse a chain spec from JSON text.
    pub fn from_json(json: &str) -> ChainResult<Self> {
        let spec: Self = serde_json::from_str(json)
            .map_err(|e| ChainError::Connection(format!("invalid chain spec: {e}")))?;
        spec.genesis_state_root()?;
        Ok(spec)
    }

    /// Load a chain spec from a file.
    pub fn load(path: &Path) -> ChainResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ChainError::Connection(format!("cannot read chain spec {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// The Westend Asset Hub spec shipped with the crate.
    pub fn westend_asset_hub() -> ChainResult<Self> {
        Self::from_json(WESTEND_ASSET_HUB)
    }

    /// Load from `path` when given, otherwise the embedded spec.
    pub fn load_or_default(path: Option<&str>) -> ChainResult<Self> {
        match path {
            Some(p) => Self::load(Path::new(p)),
            None => Self::westend_asset_hub(),
        }
    }

    /// Expected state root of block 0.
    pub fn genesis_state_root(&self) -> ChainResult<H256> {
        H256::from_hex(&self.genesis.state_root_hash).map_err(|e| {
            ChainError::Connection(format!("invalid genesis state root in chain spec: {e}"))
        })
    }

    pub fn token_symbol(&self) -> &str {
        self.properties.token_symbol.as_deref().unwrap_or("UNIT")
    }

    pub fn token_decimals(&self) -> u8 {
        self.properties.token_decimals.unwrap_or(0)
    }
}
