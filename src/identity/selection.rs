//! The selected account.
//!
//! Exactly one account is selected whenever at least one is available. The
//! selection survives account-list updates as long as the account is still
//! offered; otherwise it falls back to the first account.

use tokio::sync::{broadcast, watch};

use super::{Identity, IdentityError};
use crate::address::AccountId32;

/// Snapshot of available accounts and the current choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub accounts: Vec<Identity>,
    pub selected: Option<Identity>,
}

/// Single authority over which account is selected.
#[derive(Debug)]
pub struct AccountSelector {
    state: watch::Sender<Selection>,
}

impl AccountSelector {
    pub fn new() -> Self {
        let (state, _) = watch::channel(Selection::default());
        Self { state }
    }

    /// Replace the available accounts, keeping the selection when possible.
    pub fn update_accounts(&self, accounts: Vec<Identity>) {
        self.state.send_if_modified(|state| {
            let selected = state
                .selected
                .as_ref()
                .and_then(|current| accounts.iter().find(|a| *a == current))
                .or_else(|| accounts.first())
                .cloned();
            let changed = state.accounts != accounts || !same_selection(&state.selected, &selected);
            state.accounts = accounts;
            state.selected = selected;
            changed
        });
    }

    /// Select one of the available accounts.
    pub fn select(&self, address: &AccountId32) -> Result<Identity, IdentityError> {
        let mut result = Err(IdentityError::UnknownAccount(address.to_string()));
        self.state.send_if_modified(|state| {
            let Some(found) = state.accounts.iter().find(|a| a.address == *address).cloned() else {
                return false;
            };
            let changed = !same_selection(&state.selected, &Some(found.clone()));
            state.selected = Some(found.clone());
            result = Ok(found);
            changed
        });
        result
    }

    pub fn selected(&self) -> Option<Identity> {
        self.state.borrow().selected.clone()
    }

    pub fn accounts(&self) -> Vec<Identity> {
        self.state.borrow().accounts.clone()
    }

    /// Receiver notified on every change of accounts or selection.
    pub fn subscribe(&self) -> watch::Receiver<Selection> {
        self.state.subscribe()
    }

    /// Apply every account-list update from a provider until shutdown.
    pub async fn follow(
        &self,
        mut accounts: watch::Receiver<Vec<Identity>>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let initial = accounts.borrow_and_update().clone();
        self.update_accounts(initial);
        loop {
            tokio::select! {
                changed = accounts.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Identity provider went away");
                        break;
                    }
                    let list = accounts.borrow_and_update().clone();
                    tracing::debug!(accounts = list.len(), "Account list changed");
                    self.update_accounts(list);
                }
                _ = shutdown.recv() => break,
            }
        }
    }
}

impl Default for AccountSelector {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity equality ignores name and source; a renamed account is a change
/// for display purposes.
fn same_selection(a: &Option<Identity>, b: &Option<Identity>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.address == b.address && a.name == b.name && a.source == b.source,
        (None, None) => true,
        _ => false,
    }
}
