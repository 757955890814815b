//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::chain::types::AssetId;

/// Root configuration for the Asset Hub client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Which chain to connect to and how.
    pub chain: ChainConfig,

    /// Which balances to track.
    pub assets: AssetsConfig,

    /// Transaction construction settings.
    pub transaction: TransactionConfig,

    /// Identity providers the user can pick from.
    pub identity: IdentityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Chain connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Path to a chain-spec JSON file. The embedded Westend Asset Hub spec
    /// is used when unset.
    pub spec_path: Option<String>,

    /// Primary WebSocket JSON-RPC endpoint.
    pub rpc_url: String,

    /// Endpoints tried in order when the primary cannot be reached.
    pub failover_urls: Vec<String>,

    /// SS58 address prefix. Falls back to the chain spec, then to 42.
    pub ss58_prefix: Option<u16>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            spec_path: None,
            rpc_url: "wss://westend-asset-hub-rpc.polkadot.io".to_string(),
            failover_urls: Vec::new(),
            ss58_prefix: None,
        }
    }
}

impl ChainConfig {
    /// Primary endpoint followed by the failovers.
    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.rpc_url.as_str()).chain(self.failover_urls.iter().map(String::as_str))
    }
}

/// Tracked balances: one primary asset plus optional extras.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Asset transferred by this deployment and used to pay fees.
    pub primary_asset_id: u32,

    /// Also track the native token's free balance.
    pub track_native: bool,

    /// Further assets to display alongside the primary one.
    pub auxiliary_asset_ids: Vec<u32>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            primary_asset_id: 8,
            track_native: false,
            auxiliary_asset_ids: Vec::new(),
        }
    }
}

impl AssetsConfig {
    pub fn primary(&self) -> AssetId {
        AssetId(self.primary_asset_id)
    }
}

/// Transaction construction configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Mortality window in blocks; 0 makes transactions immortal.
    pub mortality_period: u64,

    /// Tip added on top of the fee, in the fee asset's smallest unit.
    pub tip: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            mortality_period: 64,
            tip: 0,
        }
    }
}

/// Identity provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub providers: Vec<ProviderConfig>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            providers: vec![ProviderConfig {
                name: "local".to_string(),
                seeds_env: "ASSET_HUB_SEEDS".to_string(),
            }],
        }
    }
}

/// A named key source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Name shown to the user.
    pub name: String,

    /// Environment variable holding comma-separated `[name=]0x<seed>`
    /// entries, each a 32-byte hex ed25519 seed.
    pub seeds_env: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Include module targets in log lines.
    pub log_targets: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_targets: false,
        }
    }
}
