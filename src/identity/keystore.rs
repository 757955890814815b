//! Local ed25519 keystore.
//!
//! # Security
//! - Seeds are loaded ONLY from environment variables (or handed in by tests)
//! - Seeds are never logged, formatted into errors, or serialized
//! - Signing keys zeroize themselves on drop

use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::watch;

use super::{Identity, IdentityError, IdentityProvider};
use crate::address::AccountId32;
use crate::chain::MultiSignature;
use crate::config::ProviderConfig;

enum SeedSource {
    Env(String),
    Inline(Vec<(Option<String>, [u8; 32])>),
}

struct Provider {
    name: String,
    source: SeedSource,
}

/// Identity provider backed by ed25519 seeds.
pub struct LocalKeystore {
    providers: Vec<Provider>,
    keys: RwLock<HashMap<AccountId32, SigningKey>>,
    accounts: watch::Sender<Vec<Identity>>,
}

impl LocalKeystore {
    /// Providers that read their seeds from environment variables on connect.
    pub fn from_config(providers: &[ProviderConfig]) -> Self {
        Self::with_providers(
            providers
                .iter()
                .map(|p| Provider {
                    name: p.name.clone(),
                    source: SeedSource::Env(p.seeds_env.clone()),
                })
                .collect(),
        )
    }

    /// A single provider with the given seeds.
    pub fn from_seeds(name: impl Into<String>, seeds: Vec<(Option<String>, [u8; 32])>) -> Self {
        Self::with_providers(vec![Provider {
            name: name.into(),
            source: SeedSource::Inline(seeds),
        }])
    }

    fn with_providers(providers: Vec<Provider>) -> Self {
        let (accounts, _) = watch::channel(Vec::new());
        Self {
            providers,
            keys: RwLock::new(HashMap::new()),
            accounts,
        }
    }

    fn load(&self, provider: &Provider) -> Result<Vec<(Option<String>, [u8; 32])>, IdentityError> {
        match &provider.source {
            SeedSource::Inline(seeds) => Ok(seeds.clone()),
            SeedSource::Env(var) => {
                let text = std::env::var(var).map_err(|_| {
                    IdentityError::Key(format!("environment variable {var} not set"))
                })?;
                parse_seeds(&text)
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalKeystore {
    fn list_providers(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name.clone()).collect()
    }

    async fn connect(&self, provider: &str) -> Result<(), IdentityError> {
        let source = self
            .providers
            .iter()
            .find(|p| p.name == provider)
            .ok_or_else(|| IdentityError::UnknownProvider(provider.to_string()))?;

        let mut keys = HashMap::new();
        let mut identities = Vec::new();
        for (name, seed) in self.load(source)? {
            let key = SigningKey::from_bytes(&seed);
            let address = AccountId32(key.verifying_key().to_bytes());
            if keys.insert(address, key).is_none() {
                identities.push(Identity::new(address, name, provider));
            }
        }

        match self.keys.write() {
            Ok(mut guard) => *guard = keys,
            Err(poisoned) => *poisoned.into_inner() = keys,
        }

        tracing::info!(
            provider = %provider,
            accounts = identities.len(),
            "Identity provider connected"
        );
        self.accounts.send_replace(identities);
        Ok(())
    }

    fn on_accounts_change(&self) -> watch::Receiver<Vec<Identity>> {
        self.accounts.subscribe()
    }

    async fn sign(
        &self,
        account: &AccountId32,
        payload: &[u8],
    ) -> Result<MultiSignature, IdentityError> {
        let keys = self
            .keys
            .read()
            .map_err(|_| IdentityError::Signing("keystore lock poisoned".into()))?;
        if keys.is_empty() {
            return Err(IdentityError::NotConnected);
        }
        let key = keys
            .get(account)
            .ok_or_else(|| IdentityError::UnknownAccount(account.to_string()))?;
        Ok(MultiSignature::Ed25519(key.sign(payload).to_bytes()))
    }
}

impl std::fmt::Debug for LocalKeystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeystore")
            .field("providers", &self.list_providers())
            .field("accounts", &self.accounts.borrow().len())
            .finish()
    }
}

/// Parse comma-separated `[name=]0x<64 hex>` entries.
///
/// Errors name the entry position, never its content.
pub fn parse_seeds(text: &str) -> Result<Vec<(Option<String>, [u8; 32])>, IdentityError> {
    text.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .enumerate()
        .map(|(i, entry)| {
            let (name, seed) = match entry.split_once('=') {
                Some((name, seed)) => (Some(name.trim().to_string()), seed.trim()),
                None => (None, entry),
            };
            let bytes = hex::decode(seed.strip_prefix("0x").unwrap_or(seed))
                .map_err(|_| IdentityError::Key(format!("seed #{i} is not valid hex")))?;
            let seed: [u8; 32] = bytes
                .try_into()
                .map_err(|_| IdentityError::Key(format!("seed #{i} is not 32 bytes")))?;
            Ok((name, seed))
        })
        .collect()
}
