//! Chain-specific types and error definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::rpc::RpcError;

/// Ledger amount. Never converted to floating point.
pub type Balance = u128;

/// Identifier of a `pallet-assets` fungible asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u32);

impl From<u32> for AssetId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 32-byte block or extrinsic hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct H256(pub [u8; 32]);

impl H256 {
    /// Parse a `0x`-prefixed hex string.
    pub fn from_hex(s: &str) -> Result<Self, ChainError> {
        let bytes = decode_hex(s)?;
        let array: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            ChainError::Decode(format!("expected 32-byte hash, got {} bytes", v.len()))
        })?;
        Ok(Self(array))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Decode a hex string with or without a `0x` prefix.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, ChainError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| ChainError::Decode(format!("invalid hex '{s}': {e}")))
}

/// `0x`-prefixed lowercase hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Runtime version fields needed for signing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeVersion {
    pub spec_name: String,
    pub spec_version: u32,
    pub transaction_version: u32,
}

/// Errors that can occur during chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Connection could not be established or the chain is not the expected one.
    #[error("connection error: {0}")]
    Connection(String),

    /// The transaction pool rejected the extrinsic.
    #[error("submission rejected: {0}")]
    Submission(String),

    /// The extrinsic was included but its dispatch failed.
    #[error("dispatch failed in block {block_hash}: {reason}")]
    Inclusion { block_hash: H256, reason: String },

    /// A live subscription was dropped by the transport.
    #[error("subscription dropped: {0}")]
    Subscription(String),

    /// The node answered with an error or the transport failed mid-request.
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// A response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Runtime metadata is missing an item or uses an unsupported layout.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// The identity provider refused or failed to sign.
    #[error("signing failed: {0}")]
    Signing(String),
}

impl From<codec::Error> for ChainError {
    fn from(e: codec::Error) -> Self {
        ChainError::Decode(e.to_string())
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Why a submitted transaction did not reach finality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxFailure {
    /// Rejected by the pool (bad signature, stale nonce, dropped, usurped).
    Submission(String),
    /// Included in a block, but dispatch failed (e.g. `Assets.BalanceLow`).
    Inclusion { block_hash: H256, reason: String },
    /// Transport went away before a terminal status arrived.
    Subscription(String),
}

impl fmt::Display for TxFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxFailure::Submission(reason) => write!(f, "submission rejected: {reason}"),
            TxFailure::Inclusion { block_hash, reason } => {
                write!(f, "dispatch failed in block {block_hash}: {reason}")
            }
            TxFailure::Subscription(reason) => write!(f, "status stream lost: {reason}"),
        }
    }
}

impl From<TxFailure> for ChainError {
    fn from(failure: TxFailure) -> Self {
        match failure {
            TxFailure::Submission(reason) => ChainError::Submission(reason),
            TxFailure::Inclusion { block_hash, reason } => {
                ChainError::Inclusion { block_hash, reason }
            }
            TxFailure::Subscription(reason) => ChainError::Subscription(reason),
        }
    }
}

/// Lifecycle events of one submitted extrinsic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEvent {
    /// Signed locally and handed to the node.
    Signed { tx_hash: H256 },
    /// Accepted into the pool.
    Ready,
    /// Gossiped to peers.
    Broadcast { peers: usize },
    /// Included in a block and dispatched successfully.
    InBlock { block_hash: H256, extrinsic_index: u32 },
    /// The including block was retracted; a new `InBlock` may follow.
    Retracted { block_hash: H256 },
    /// The including block was finalized. Terminal.
    Finalized { block_hash: H256, extrinsic_index: u32 },
    /// Terminal failure.
    Failed(TxFailure),
}

impl TxEvent {
    /// True for events after which the stream ends.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxEvent::Finalized { .. } | TxEvent::Failed(_))
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            TxEvent::Signed { .. } => "submitted",
            TxEvent::Ready => "ready",
            TxEvent::Broadcast { .. } => "broadcast",
            TxEvent::InBlock { .. } => "included",
            TxEvent::Retracted { .. } => "retracted",
            TxEvent::Finalized { .. } => "finalized",
            TxEvent::Failed(_) => "failed",
        }
    }
}
