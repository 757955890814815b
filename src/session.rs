//! The surface a presentation shell talks to.
//!
//! A session wires one connection, one identity provider, the account
//! selector, the balance tracker and the transfer submitter together, and
//! runs the two background loops that keep them in step:
//!
//! ```text
//! IdentityProvider::on_accounts_change ──▶ AccountSelector::follow
//!                                                │ selection
//!                                                ▼
//!                                    BalanceTracker::follow ──▶ BalanceView
//! ```

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::address::AccountId32;
use crate::balance::{BalanceTracker, BalanceView, TrackedItem};
use crate::chain::{
    AssetId, ChainConnection, ChainResult, ChainSpecification, Subscription, TxEvent,
};
use crate::config::ClientConfig;
use crate::identity::{AccountSelector, Identity, IdentityError, IdentityProvider, Selection};
use crate::lifecycle::Shutdown;
use crate::transfer::{TransferError, TransferSubmitter};

/// Process-scoped client state.
pub struct AssetSession {
    connection: ChainConnection,
    identity: Arc<dyn IdentityProvider>,
    selector: Arc<AccountSelector>,
    tracker: Arc<BalanceTracker>,
    submitter: TransferSubmitter,
    asset_id: AssetId,
    shutdown: Arc<Shutdown>,
    tasks: Vec<JoinHandle<()>>,
}

impl AssetSession {
    /// Load the chain spec, connect, and start the session.
    pub async fn start(
        config: &ClientConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> ChainResult<Self> {
        let spec = ChainSpecification::load_or_default(config.chain.spec_path.as_deref())?;
        tracing::info!(
            chain = %spec.name,
            id = %spec.id,
            para_id = ?spec.para_id,
            "Chain specification loaded"
        );
        let connection = ChainConnection::connect(spec, &config.chain).await?;
        Ok(Self::with_connection(connection, identity, config))
    }

    /// Start a session over an established connection.
    pub fn with_connection(
        connection: ChainConnection,
        identity: Arc<dyn IdentityProvider>,
        config: &ClientConfig,
    ) -> Self {
        let selector = Arc::new(AccountSelector::new());
        let tracker = Arc::new(BalanceTracker::new(
            connection.clone(),
            TrackedItem::from_config(&config.assets),
        ));
        let submitter =
            TransferSubmitter::new(connection.clone(), identity.clone(), &config.transaction);
        let shutdown = Arc::new(Shutdown::new());

        let follow_accounts = {
            let selector = selector.clone();
            let accounts = identity.on_accounts_change();
            let stop = shutdown.subscribe();
            tokio::spawn(async move { selector.follow(accounts, stop).await })
        };
        let follow_selection = {
            let tracker = tracker.clone();
            let selection = selector.subscribe();
            let stop = shutdown.subscribe();
            tokio::spawn(async move { tracker.follow(selection, stop).await })
        };

        Self {
            connection,
            identity,
            selector,
            tracker,
            submitter,
            asset_id: config.assets.primary(),
            shutdown,
            tasks: vec![follow_accounts, follow_selection],
        }
    }

    pub fn connection(&self) -> &ChainConnection {
        &self.connection
    }

    /// Asset this deployment transfers.
    pub fn asset_id(&self) -> AssetId {
        self.asset_id
    }

    pub fn providers(&self) -> Vec<String> {
        self.identity.list_providers()
    }

    pub async fn connect_provider(&self, name: &str) -> Result<(), IdentityError> {
        self.identity.connect(name).await
    }

    pub fn accounts(&self) -> Vec<Identity> {
        self.selector.accounts()
    }

    pub fn selected(&self) -> Option<Identity> {
        self.selector.selected()
    }

    pub fn select(&self, address: &AccountId32) -> Result<Identity, IdentityError> {
        self.selector.select(address)
    }

    pub fn selection(&self) -> watch::Receiver<Selection> {
        self.selector.subscribe()
    }

    /// Balance read model of the selected account.
    pub fn balances(&self) -> watch::Receiver<BalanceView> {
        self.tracker.view()
    }

    /// Transfer the deployment's asset from the selected account.
    pub async fn submit_transfer(
        &self,
        destination: &str,
        amount: &str,
    ) -> Result<Subscription<TxEvent>, TransferError> {
        let from = self.selected().ok_or(IdentityError::NoAccountSelected)?;
        self.submitter
            .transfer(self.asset_id, &from.address, destination, amount)
            .await
    }

    /// Stop the background loops; every open subscription is disposed.
    pub async fn shutdown(mut self) {
        self.shutdown.trigger();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Session task ended abnormally");
            }
        }
        tracing::info!("Session closed");
    }
}

impl Drop for AssetSession {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

impl std::fmt::Debug for AssetSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetSession")
            .field("asset_id", &self.asset_id)
            .field("selected", &self.selected())
            .field("tracker", &self.tracker)
            .finish()
    }
}
