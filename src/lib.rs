//! Client core for Westend Asset Hub.
//!
//! Connects user identities to the chain, tracks their balances live, and
//! submits `Assets.transfer_keep_alive` extrinsics that pay fees in the
//! transferred asset.
//!
//! # Architecture Overview
//!
//! ```text
//!   IdentityProvider ──accounts──▶ AccountSelector ──selected──▶ BalanceTracker
//!          │                                                         │
//!          │ sign                                          subscribe │
//!          ▼                                                         ▼
//!   TransferSubmitter ──submit──▶ ChainConnection ──JSON-RPC/WS──▶ ledger node
//!          │                             ▲
//!          └── address (SS58, XCM) ──────┘
//! ```

// Leaf codecs and transport
pub mod address;
pub mod rpc;

// Ledger access
pub mod chain;

// Client components
pub mod balance;
pub mod identity;
pub mod session;
pub mod transfer;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use address::{AccountId32, AddressError, Ss58Codec};
pub use balance::{BalanceSnapshot, BalanceTracker, BalanceView, TrackedItem};
pub use chain::{AssetId, Balance, ChainConnection, ChainError, Subscription, TxEvent};
pub use config::ClientConfig;
pub use identity::{Identity, IdentityProvider, LocalKeystore};
pub use lifecycle::Shutdown;
pub use session::AssetSession;
pub use transfer::{TransferError, TransferSubmitter};
