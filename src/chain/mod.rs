//! Ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! ChainSpecification (embedded or file)
//!     → connection.rs (endpoint failover, genesis check, metadata)
//!     → storage.rs + hashing.rs (typed storage keys and values)
//!     → extrinsic.rs (signed extensions, payload, assembly)
//!     → subscription.rs (disposable value streams)
//! ```
//!
//! # Constraints
//! - One connection per process, established before any query or submission
//! - Amounts are `u128` end to end
//! - Every failure reaches the caller as an `Err` or a terminal `TxEvent`

pub mod connection;
pub mod extrinsic;
pub mod hashing;
pub mod metadata;
pub mod spec;
pub mod storage;
pub mod subscription;
pub mod types;

pub use connection::ChainConnection;
pub use extrinsic::{Call, Era, MultiSignature, Signer, TxOptions};
pub use metadata::Metadata;
pub use spec::ChainSpecification;
pub use storage::StorageAddress;
pub use subscription::{Subscription, SubscriptionHandle};
pub use types::{AssetId, Balance, ChainError, ChainResult, TxEvent, TxFailure, H256};
