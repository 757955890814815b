//! Metrics collection.
//!
//! # Metrics
//! - `asset_hub_rpc_requests_total` (counter): JSON-RPC calls by method
//! - `asset_hub_subscriptions_active` (gauge): open subscriptions
//! - `asset_hub_balance_updates_total` (counter): decoded balance values by item
//! - `asset_hub_transfers_total` (counter): transfer outcomes
//!
//! # Design Decisions
//! - Only the facade is used; the embedding process picks an exporter

use metrics::{counter, gauge};

/// Record an outgoing JSON-RPC call.
pub fn record_rpc_request(method: &str) {
    counter!("asset_hub_rpc_requests_total", "method" => method.to_string()).increment(1);
}

/// Record a subscription being opened.
pub fn record_subscription_opened() {
    gauge!("asset_hub_subscriptions_active").increment(1.0);
}

/// Record a subscription being released.
pub fn record_subscription_closed() {
    gauge!("asset_hub_subscriptions_active").decrement(1.0);
}

/// Record a decoded balance value delivered to the read model.
pub fn record_balance_update(item: &str) {
    counter!("asset_hub_balance_updates_total", "item" => item.to_string()).increment(1);
}

/// Record the terminal outcome of a transfer (`finalized`, `submission`, ...).
pub fn record_transfer_outcome(outcome: &'static str) {
    counter!("asset_hub_transfers_total", "outcome" => outcome).increment(1);
}
