//! Live balances of the selected account.
//!
//! # State Machine
//! ```text
//! Unsubscribed ──watch(A)──▶ Loading ──first value──▶ Live
//!      ▲                        ▲                       │
//!      │                        └──────watch(B)─────────┘
//!      └──────────────unwatch()─────────────────────────┘
//! ```
//!
//! # Design Decisions
//! - Old subscriptions are disposed and their pump tasks aborted before any
//!   new subscription is opened
//! - Every write to the read model carries the generation it was produced
//!   for; writes from an older generation are dropped
//! - A failed item stays failed until the next `watch`; nothing re-subscribes

use futures_util::StreamExt;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use crate::address::AccountId32;
use crate::chain::storage::{AssetAccount, SystemAccount};
use crate::chain::{
    AssetId, Balance, ChainConnection, ChainResult, Subscription, SubscriptionHandle,
};
use crate::config::AssetsConfig;
use crate::identity::Selection;
use crate::observability::metrics;

/// A storage item tracked for the selected account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedItem {
    /// `Assets.Account(id, account).balance`
    Asset(AssetId),
    /// `System.Account(account).data.free`
    NativeFree,
}

impl TrackedItem {
    /// Primary asset, then auxiliary assets, then the native balance if enabled.
    pub fn from_config(config: &AssetsConfig) -> Vec<TrackedItem> {
        let mut items = vec![TrackedItem::Asset(config.primary())];
        items.extend(
            config
                .auxiliary_asset_ids
                .iter()
                .map(|id| TrackedItem::Asset(AssetId(*id))),
        );
        if config.track_native {
            items.push(TrackedItem::NativeFree);
        }
        items
    }
}

impl fmt::Display for TrackedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackedItem::Asset(id) => write!(f, "asset {id}"),
            TrackedItem::NativeFree => f.write_str("native"),
        }
    }
}

/// Latest known value of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceSnapshot {
    Loading,
    Live(Balance),
    Failed(String),
}

impl BalanceSnapshot {
    pub fn amount(&self) -> Option<Balance> {
        match self {
            BalanceSnapshot::Live(amount) => Some(*amount),
            _ => None,
        }
    }
}

/// Read model published to the shell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceView {
    /// Account the snapshots belong to; `None` when unsubscribed.
    pub account: Option<AccountId32>,
    pub generation: u64,
    pub items: Vec<(TrackedItem, BalanceSnapshot)>,
}

impl BalanceView {
    pub fn get(&self, item: TrackedItem) -> Option<&BalanceSnapshot> {
        self.items
            .iter()
            .find(|(tracked, _)| *tracked == item)
            .map(|(_, snapshot)| snapshot)
    }

    fn set(&mut self, item: TrackedItem, snapshot: BalanceSnapshot) {
        if let Some((_, slot)) = self.items.iter_mut().find(|(tracked, _)| *tracked == item) {
            *slot = snapshot;
        }
    }
}

#[derive(Default)]
struct Active {
    generation: u64,
    handles: Vec<SubscriptionHandle>,
    pumps: Vec<JoinHandle<()>>,
}

impl Active {
    fn teardown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.dispose();
        }
        for pump in self.pumps.drain(..) {
            pump.abort();
        }
    }
}

/// Subscribes to the tracked items of one account at a time.
pub struct BalanceTracker {
    connection: ChainConnection,
    items: Vec<TrackedItem>,
    view: Arc<watch::Sender<BalanceView>>,
    active: Mutex<Active>,
}

impl BalanceTracker {
    pub fn new(connection: ChainConnection, items: Vec<TrackedItem>) -> Self {
        let (view, _) = watch::channel(BalanceView::default());
        Self {
            connection,
            items,
            view: Arc::new(view),
            active: Mutex::new(Active::default()),
        }
    }

    pub fn items(&self) -> &[TrackedItem] {
        &self.items
    }

    /// Track `account`, replacing whatever was tracked before.
    ///
    /// When this returns, every item of the view is `Loading` (or `Failed`
    /// if its subscription could not be opened) and belongs to `account`.
    pub async fn watch(&self, account: AccountId32) -> watch::Receiver<BalanceView> {
        let mut active = self.active.lock().await;
        active.teardown();
        active.generation += 1;
        let generation = active.generation;

        self.view.send_replace(BalanceView {
            account: Some(account),
            generation,
            items: self
                .items
                .iter()
                .map(|item| (*item, BalanceSnapshot::Loading))
                .collect(),
        });
        tracing::info!(
            account = %self.connection.ss58().encode(&account),
            generation,
            items = self.items.len(),
            "Tracking balances"
        );

        for item in &self.items {
            match self.open(*item, account).await {
                Ok(subscription) => {
                    active.handles.push(subscription.handle());
                    active.pumps.push(tokio::spawn(pump(
                        subscription,
                        *item,
                        generation,
                        self.view.clone(),
                    )));
                }
                Err(e) => {
                    tracing::warn!(item = %item, error = %e, "Balance subscription failed");
                    apply(&self.view, generation, *item, BalanceSnapshot::Failed(e.to_string()));
                }
            }
        }

        self.view.subscribe()
    }

    /// Stop tracking; the view becomes empty.
    pub async fn unwatch(&self) {
        let mut active = self.active.lock().await;
        active.teardown();
        active.generation += 1;
        self.view.send_replace(BalanceView {
            account: None,
            generation: active.generation,
            items: Vec::new(),
        });
    }

    /// Receiver of the read model.
    pub fn view(&self) -> watch::Receiver<BalanceView> {
        self.view.subscribe()
    }

    pub fn snapshot(&self, item: TrackedItem) -> Option<BalanceSnapshot> {
        self.view.borrow().get(item).cloned()
    }

    /// Re-target on every change of the selected account until shutdown.
    pub async fn follow(
        &self,
        mut selection: watch::Receiver<Selection>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut current = None;
        loop {
            let selected = selection
                .borrow_and_update()
                .selected
                .as_ref()
                .map(|identity| identity.address);
            if selected != current {
                match selected {
                    Some(account) => {
                        self.watch(account).await;
                    }
                    None => self.unwatch().await,
                }
                current = selected;
            }

            tokio::select! {
                changed = selection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
        self.unwatch().await;
    }

    async fn open(
        &self,
        item: TrackedItem,
        account: AccountId32,
    ) -> ChainResult<Subscription<Balance>> {
        match item {
            TrackedItem::Asset(asset_id) => {
                self.connection
                    .subscribe(AssetAccount { asset_id, account })
                    .await
            }
            TrackedItem::NativeFree => Ok(self
                .connection
                .subscribe(SystemAccount { account })
                .await?
                .map(|info| info.map(|info| info.free))),
        }
    }
}

impl Drop for BalanceTracker {
    fn drop(&mut self) {
        self.active.get_mut().teardown();
    }
}

impl fmt::Debug for BalanceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BalanceTracker")
            .field("items", &self.items)
            .field("view", &*self.view.borrow())
            .finish()
    }
}

/// Write `snapshot` if the view still belongs to `generation`.
fn apply(
    view: &watch::Sender<BalanceView>,
    generation: u64,
    item: TrackedItem,
    snapshot: BalanceSnapshot,
) -> bool {
    let mut current = false;
    view.send_if_modified(|v| {
        if v.generation != generation {
            return false;
        }
        current = true;
        if v.get(item) == Some(&snapshot) {
            return false;
        }
        v.set(item, snapshot);
        true
    });
    current
}

async fn pump(
    mut subscription: Subscription<Balance>,
    item: TrackedItem,
    generation: u64,
    view: Arc<watch::Sender<BalanceView>>,
) {
    let label = item.to_string();
    while let Some(value) = subscription.next().await {
        let (snapshot, last) = match value {
            Ok(amount) => (BalanceSnapshot::Live(amount), false),
            Err(e) => {
                tracing::warn!(item = %label, generation, error = %e, "Balance subscription lost");
                (BalanceSnapshot::Failed(e.to_string()), true)
            }
        };
        if !apply(&view, generation, item, snapshot) {
            tracing::debug!(item = %label, generation, "Dropping value for a replaced account");
            break;
        }
        metrics::record_balance_update(&label);
        if last {
            break;
        }
    }
}

/// Render an integer amount with `decimals` fractional digits, without
/// going through floating point. Trailing zeros are trimmed.
pub fn format_amount(amount: Balance, decimals: u8) -> String {
    let scale = 10u128.checked_pow(decimals as u32);
    let Some(scale) = scale else {
        return amount.to_string();
    };
    let whole = amount / scale;
    let fraction = amount % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{fraction:0width$}", width = decimals as usize);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_from_config() {
        let config = AssetsConfig {
            primary_asset_id: 8,
            track_native: true,
            auxiliary_asset_ids: vec![41],
        };
        assert_eq!(
            TrackedItem::from_config(&config),
            vec![
                TrackedItem::Asset(AssetId(8)),
                TrackedItem::Asset(AssetId(41)),
                TrackedItem::NativeFree
            ]
        );
    }

    #[test]
    fn stale_generation_is_rejected() {
        let (view, _) = watch::channel(BalanceView {
            account: Some(AccountId32([2; 32])),
            generation: 2,
            items: vec![(TrackedItem::NativeFree, BalanceSnapshot::Loading)],
        });
        assert!(!apply(&view, 1, TrackedItem::NativeFree, BalanceSnapshot::Live(500)));
        assert_eq!(
            view.borrow().get(TrackedItem::NativeFree),
            Some(&BalanceSnapshot::Loading)
        );
        assert!(apply(&view, 2, TrackedItem::NativeFree, BalanceSnapshot::Live(0)));
        assert_eq!(
            view.borrow()
                .get(TrackedItem::NativeFree)
                .and_then(BalanceSnapshot::amount),
            Some(0)
        );
    }

    #[test]
    fn formats_without_floats() {
        assert_eq!(format_amount(1_500_000, 6), "1.5");
        assert_eq!(format_amount(42, 0), "42");
        assert_eq!(format_amount(1, 12), "0.000000000001");
        assert_eq!(format_amount(u128::MAX, 12), "340282366920938463463374607.431768211455");
        assert_eq!(format_amount(7_000_000_000_000, 12), "7");
    }
}
