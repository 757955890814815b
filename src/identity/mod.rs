//! Signing identities.
//!
//! # Data Flow
//! ```text
//! IdentityProvider (keystore.rs or an external wallet)
//!     → on_accounts_change() : watch of unlocked accounts
//!     → selection.rs : exactly one selected account
//!     → BalanceTracker / TransferSubmitter
//! ```
//!
//! # Security Constraints
//! - Secret material never leaves the provider; the core only sees
//!   addresses and signatures
//! - Seeds are never logged

pub mod keystore;
pub mod selection;

use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use thiserror::Error;
use tokio::sync::watch;

use crate::address::AccountId32;
use crate::chain::types::{ChainError, ChainResult};
use crate::chain::{MultiSignature, Signer};

pub use keystore::LocalKeystore;
pub use selection::{AccountSelector, Selection};

/// An account offered by a provider. Equality is by address only.
#[derive(Debug, Clone)]
pub struct Identity {
    pub address: AccountId32,
    pub name: Option<String>,
    /// Provider the account came from.
    pub source: String,
}

impl Identity {
    pub fn new(address: AccountId32, name: Option<String>, source: impl Into<String>) -> Self {
        Self {
            address,
            name,
            source: source.into(),
        }
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

/// Errors raised by identity providers and account selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("unknown identity provider '{0}'")]
    UnknownProvider(String),

    #[error("no identity provider connected")]
    NotConnected,

    #[error("no account selected")]
    NoAccountSelected,

    #[error("account {0} is not available")]
    UnknownAccount(String),

    /// Key material could not be loaded.
    #[error("key error: {0}")]
    Key(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Source of signing identities, owned by the surrounding shell.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Names of the providers the user can pick from.
    fn list_providers(&self) -> Vec<String>;

    /// Connect one provider. Its accounts are then published through
    /// [`IdentityProvider::on_accounts_change`].
    async fn connect(&self, provider: &str) -> Result<(), IdentityError>;

    /// Current list of unlocked accounts, updated whenever it changes.
    fn on_accounts_change(&self) -> watch::Receiver<Vec<Identity>>;

    /// Sign `payload` with the key of `account`.
    async fn sign(
        &self,
        account: &AccountId32,
        payload: &[u8],
    ) -> Result<MultiSignature, IdentityError>;
}

/// Adapts an [`IdentityProvider`] to the chain layer's [`Signer`].
pub struct ProviderSigner<'a>(pub &'a dyn IdentityProvider);

#[async_trait]
impl Signer for ProviderSigner<'_> {
    async fn sign(&self, account: &AccountId32, payload: &[u8]) -> ChainResult<MultiSignature> {
        self.0
            .sign(account, payload)
            .await
            .map_err(|e| ChainError::Signing(e.to_string()))
    }
}
