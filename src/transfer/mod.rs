//! Asset transfers that pay their fees in the transferred asset.
//!
//! # Flow
//! ```text
//! amount text ──parse_amount──┐
//! address text ──Ss58Codec────┼─▶ TransferRequest
//!                             │        │
//!                             │        ▼
//!                             │   Assets.transfer_keep_alive + fee location
//!                             │        │
//!                             └──▶ ChainConnection::submit (once)
//! ```
//!
//! Input errors are returned before any network call. Keep-alive is
//! enforced by the ledger and comes back as `Failed(Inclusion)`.

use codec::Encode;
use std::sync::Arc;
use thiserror::Error;

use crate::address::{build_fee_asset_location, AccountId32, AddressError, MultiAddress};
use crate::chain::{
    AssetId, Balance, Call, ChainConnection, ChainError, ChainResult, Subscription, TxEvent,
    TxFailure, TxOptions,
};
use crate::config::TransactionConfig;
use crate::identity::{IdentityError, IdentityProvider, ProviderSigner};
use crate::observability::metrics;

const PALLET: &str = "Assets";
const CALL: &str = "transfer_keep_alive";

/// Errors returned before a transfer produces events.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The amount is not a plain non-negative integer that fits in `u128`.
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),

    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// One validated transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub asset_id: AssetId,
    pub destination: AccountId32,
    pub amount: Balance,
}

/// Arguments of `Assets.transfer_keep_alive`.
#[derive(Encode)]
struct TransferKeepAlive {
    #[codec(compact)]
    id: u32,
    target: MultiAddress,
    #[codec(compact)]
    amount: u128,
}

/// Parse user-supplied amount text: ASCII digits only, no sign, no decimal
/// point, no whitespace.
pub fn parse_amount(text: &str) -> Result<Balance, TransferError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TransferError::InvalidAmount(text.to_string()));
    }
    text.parse::<Balance>()
        .map_err(|_| TransferError::InvalidAmount(text.to_string()))
}

/// Builds and submits transfers for a connected chain.
pub struct TransferSubmitter {
    connection: ChainConnection,
    identity: Arc<dyn IdentityProvider>,
    tip: Balance,
    mortality: u64,
}

impl TransferSubmitter {
    pub fn new(
        connection: ChainConnection,
        identity: Arc<dyn IdentityProvider>,
        config: &TransactionConfig,
    ) -> Self {
        Self {
            connection,
            identity,
            tip: Balance::from(config.tip),
            mortality: config.mortality_period,
        }
    }

    /// Validate the inputs and submit one transfer.
    pub async fn transfer(
        &self,
        asset_id: AssetId,
        from: &AccountId32,
        to: &str,
        amount: &str,
    ) -> Result<Subscription<TxEvent>, TransferError> {
        let amount = parse_amount(amount)?;
        let destination = self.connection.ss58().decode(to)?;
        let request = TransferRequest {
            asset_id,
            destination,
            amount,
        };

        let call = self.build_call(&request)?;
        let options = TxOptions {
            fee_asset: Some(build_fee_asset_location(asset_id)),
            tip: self.tip,
            mortality: self.mortality,
        };

        tracing::info!(
            asset_id = %asset_id,
            to = %to,
            amount = %amount,
            "Submitting transfer"
        );

        let events = self
            .connection
            .submit(&call, from, &options, &ProviderSigner(&*self.identity))
            .await
            .inspect_err(|_| metrics::record_transfer_outcome("not_submitted"))?;

        Ok(events.map(move |event| {
            if let Ok(event) = &event {
                observe(asset_id, event);
            }
            event
        }))
    }

    /// Encode `Assets.transfer_keep_alive` with indices from metadata.
    pub fn build_call(&self, request: &TransferRequest) -> ChainResult<Call> {
        let index = self.connection.metadata().call_index(PALLET, CALL)?;
        Ok(Call::new(
            index,
            format!("{PALLET}.{CALL}"),
            &TransferKeepAlive {
                id: request.asset_id.0,
                target: MultiAddress::Id(request.destination),
                amount: request.amount,
            },
        ))
    }
}

impl std::fmt::Debug for TransferSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferSubmitter")
            .field("tip", &self.tip)
            .field("mortality", &self.mortality)
            .finish()
    }
}

fn observe(asset_id: AssetId, event: &TxEvent) {
    match event {
        TxEvent::Finalized { block_hash, .. } => {
            tracing::info!(asset_id = %asset_id, block = %block_hash, "Transfer finalized");
            metrics::record_transfer_outcome("finalized");
        }
        TxEvent::Failed(failure) => {
            tracing::warn!(asset_id = %asset_id, failure = %failure, "Transfer failed");
            metrics::record_transfer_outcome(match failure {
                TxFailure::Submission(_) => "submission_failed",
                TxFailure::Inclusion { .. } => "inclusion_failed",
                TxFailure::Subscription(_) => "subscription_lost",
            });
        }
        other => tracing::debug!(asset_id = %asset_id, status = other.label(), "Transfer status"),
    }
}
