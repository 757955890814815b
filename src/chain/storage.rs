//! Typed storage addresses.
//!
//! An address knows its key and how to decode the stored bytes, including
//! what an absent entry means. Map hashers are the ones Asset Hub declares
//! for these items.

use codec::{Decode, Encode};

use crate::address::AccountId32;
use crate::chain::hashing::{storage_key, storage_prefix, StorageHasher};
use crate::chain::types::{AssetId, Balance, ChainResult};

/// A storage item that can be read once or watched.
pub trait StorageAddress: Send + Sync {
    type Value: Send + 'static;

    /// Full storage key.
    fn key(&self) -> Vec<u8>;

    /// Decode the stored bytes; `None` means no entry.
    fn decode(&self, raw: Option<&[u8]>) -> ChainResult<Self::Value>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

impl<A: StorageAddress + ?Sized> StorageAddress for Box<A> {
    type Value = A::Value;

    fn key(&self) -> Vec<u8> {
        (**self).key()
    }

    fn decode(&self, raw: Option<&[u8]>) -> ChainResult<Self::Value> {
        (**self).decode(raw)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// `Assets.Account(asset_id, account)`: the account's balance of an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetAccount {
    pub asset_id: AssetId,
    pub account: AccountId32,
}

impl StorageAddress for AssetAccount {
    type Value = Balance;

    fn key(&self) -> Vec<u8> {
        storage_key(
            "Assets",
            "Account",
            &[
                (StorageHasher::Blake2_128Concat, &self.asset_id.0.encode()[..]),
                (StorageHasher::Blake2_128Concat, self.account.as_ref()),
            ],
        )
    }

    /// Absent entries are a zero balance. Only the leading `balance`
    /// field of `AssetAccount` is read.
    fn decode(&self, raw: Option<&[u8]>) -> ChainResult<Balance> {
        match raw {
            None => Ok(0),
            Some(mut bytes) => Ok(Balance::decode(&mut bytes)?),
        }
    }

    fn describe(&self) -> String {
        format!("Assets.Account({}, {})", self.asset_id, self.account)
    }
}

/// `frame_system::AccountInfo` with `pallet_balances::AccountData`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Decode, Encode)]
pub struct AccountInfo {
    pub nonce: u32,
    pub consumers: u32,
    pub providers: u32,
    pub sufficients: u32,
    pub free: Balance,
    pub reserved: Balance,
    pub frozen: Balance,
    pub flags: u128,
}

/// `System.Account(account)`: nonce and native balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemAccount {
    pub account: AccountId32,
}

impl StorageAddress for SystemAccount {
    type Value = AccountInfo;

    fn key(&self) -> Vec<u8> {
        storage_key(
            "System",
            "Account",
            &[(StorageHasher::Blake2_128Concat, self.account.as_ref())],
        )
    }

    fn decode(&self, raw: Option<&[u8]>) -> ChainResult<AccountInfo> {
        match raw {
            None => Ok(AccountInfo::default()),
            Some(mut bytes) => Ok(AccountInfo::decode(&mut bytes)?),
        }
    }

    fn describe(&self) -> String {
        format!("System.Account({})", self.account)
    }
}

/// `pallet_assets::AssetMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Decode, Encode)]
pub struct AssetMetadata {
    pub deposit: Balance,
    pub name: Vec<u8>,
    pub symbol: Vec<u8>,
    pub decimals: u8,
    pub is_frozen: bool,
}

impl AssetMetadata {
    pub fn symbol(&self) -> String {
        String::from_utf8_lossy(&self.symbol).into_owned()
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// `Assets.Metadata(asset_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMetadataOf {
    pub asset_id: AssetId,
}

impl StorageAddress for AssetMetadataOf {
    type Value = Option<AssetMetadata>;

    fn key(&self) -> Vec<u8> {
        storage_key(
            "Assets",
            "Metadata",
            &[(StorageHasher::Blake2_128Concat, &self.asset_id.0.encode()[..])],
        )
    }

    fn decode(&self, raw: Option<&[u8]>) -> ChainResult<Option<AssetMetadata>> {
        raw.map(|mut bytes| AssetMetadata::decode(&mut bytes))
            .transpose()
            .map_err(Into::into)
    }

    fn describe(&self) -> String {
        format!("Assets.Metadata({})", self.asset_id)
    }
}

/// Leading fields of `pallet_assets::AssetDetails`.
#[derive(Debug, Clone, PartialEq, Eq, Decode, Encode)]
pub struct AssetDetails {
    pub owner: AccountId32,
    pub issuer: AccountId32,
    pub admin: AccountId32,
    pub freezer: AccountId32,
    pub supply: Balance,
    pub deposit: Balance,
    /// Existential deposit of the asset.
    pub min_balance: Balance,
    pub is_sufficient: bool,
    pub accounts: u32,
    pub sufficients: u32,
    pub approvals: u32,
}

/// `Assets.Asset(asset_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDetailsOf {
    pub asset_id: AssetId,
}

impl StorageAddress for AssetDetailsOf {
    type Value = Option<AssetDetails>;

    fn key(&self) -> Vec<u8> {
        storage_key(
            "Assets",
            "Asset",
            &[(StorageHasher::Blake2_128Concat, &self.asset_id.0.encode()[..])],
        )
    }

    fn decode(&self, raw: Option<&[u8]>) -> ChainResult<Option<AssetDetails>> {
        raw.map(|mut bytes| AssetDetails::decode(&mut bytes))
            .transpose()
            .map_err(Into::into)
    }

    fn describe(&self) -> String {
        format!("Assets.Asset({})", self.asset_id)
    }
}

/// Key of `System.Events`.
pub fn system_events_key() -> Vec<u8> {
    storage_prefix("System", "Events")
}
