//! Account address encoding and validation.
//!
//! # Responsibilities
//! - Decode and validate SS58 strings into 32-byte account ids
//! - Encode account ids back to SS58 for a given network prefix
//! - Build `MultiAddress` call arguments from user-supplied strings
//! - Build cross-consensus locations (see [`location`])
//!
//! # Data Flow
//! ```text
//! "5ELXt7N4..." ──▶ base58 decode ──▶ prefix + key + checksum
//!                                         │
//!                     blake2b-512("SS58PRE" ‖ prefix ‖ key)[..2] == checksum?
//!                                         │
//!                                         ▼
//!                                   AccountId32 ──▶ MultiAddress::Id
//! ```
//!
//! Everything here is pure: no I/O, no logging.

pub mod location;

use blake2::{Blake2b512, Digest};
use codec::{Decode, Encode};
use std::fmt;
use thiserror::Error;

pub use location::{build_fee_asset_location, Junction, Location, ASSETS_PALLET_INSTANCE};

/// Generic Substrate address prefix, used by Westend and its parachains.
pub const GENERIC_SS58_PREFIX: u16 = 42;

const SS58_CHECKSUM_PREAMBLE: &[u8] = b"SS58PRE";
const CHECKSUM_LEN: usize = 2;

/// Errors produced while decoding or building addresses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The input is not a valid address for the chain's format.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The address belongs to another network.
    #[error("address prefix {actual} does not match chain prefix {expected}")]
    PrefixMismatch { expected: u16, actual: u16 },

    /// A location cannot hold more than eight junctions.
    #[error("location interior has {0} junctions, at most 8 are allowed")]
    TooManyJunctions(usize),
}

/// A 32-byte account identifier (an sr25519/ed25519 public key).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct AccountId32(pub [u8; 32]);

impl AccountId32 {
    /// Raw public key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for AccountId32 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for AccountId32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for AccountId32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// SS58 rendering with the generic prefix; use [`Ss58Codec`] for other networks.
impl fmt::Display for AccountId32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Ss58Codec::new(GENERIC_SS58_PREFIX).encode(self))
    }
}

/// Call-argument address as understood by `pallet-assets` and `pallet-balances`.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum MultiAddress {
    #[codec(index = 0)]
    Id(AccountId32),
    #[codec(index = 1)]
    Index(#[codec(compact)] u32),
    #[codec(index = 2)]
    Raw(Vec<u8>),
    #[codec(index = 3)]
    Address32([u8; 32]),
    #[codec(index = 4)]
    Address20([u8; 20]),
}

impl From<AccountId32> for MultiAddress {
    fn from(account: AccountId32) -> Self {
        MultiAddress::Id(account)
    }
}

/// SS58 codec bound to one network prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ss58Codec {
    prefix: u16,
}

impl Default for Ss58Codec {
    fn default() -> Self {
        Self::new(GENERIC_SS58_PREFIX)
    }
}

impl Ss58Codec {
    /// Create a codec for the given network prefix.
    pub fn new(prefix: u16) -> Self {
        Self { prefix }
    }

    /// The network prefix this codec accepts and produces.
    pub fn prefix(&self) -> u16 {
        self.prefix
    }

    /// Encode an account id as an SS58 string.
    pub fn encode(&self, account: &AccountId32) -> String {
        let mut data = prefix_bytes(self.prefix);
        data.extend_from_slice(account.as_bytes());
        let hash = ss58_hash(&data);
        data.extend_from_slice(&hash[..CHECKSUM_LEN]);
        bs58::encode(data).into_string()
    }

    /// Decode an SS58 string, requiring it to carry this codec's prefix.
    pub fn decode(&self, address: &str) -> Result<AccountId32, AddressError> {
        let (prefix, account) = decode_any(address)?;
        if prefix != self.prefix {
            return Err(AddressError::PrefixMismatch {
                expected: self.prefix,
                actual: prefix,
            });
        }
        Ok(account)
    }

    /// Decode and wrap as `MultiAddress::Id`.
    pub fn encode_multi_address(&self, address: &str) -> Result<MultiAddress, AddressError> {
        self.decode(address).map(MultiAddress::Id)
    }

    /// True if the string is a valid address for this network.
    pub fn is_valid(&self, address: &str) -> bool {
        self.decode(address).is_ok()
    }
}

/// Decode an SS58 string of any network, returning its prefix and account id.
pub fn decode_any(address: &str) -> Result<(u16, AccountId32), AddressError> {
    let data = bs58::decode(address)
        .into_vec()
        .map_err(|e| AddressError::InvalidAddress(format!("base58 decode failed: {e}")))?;

    let (prefix, prefix_len) = match data.first() {
        None => return Err(AddressError::InvalidAddress("empty address".into())),
        Some(&b) if b < 64 => (b as u16, 1),
        Some(&b) if b < 128 => {
            let second = *data
                .get(1)
                .ok_or_else(|| AddressError::InvalidAddress("truncated prefix".into()))?;
            let lower = (b << 2) | (second >> 6);
            let upper = second & 0b0011_1111;
            (lower as u16 | ((upper as u16) << 8), 2)
        }
        Some(_) => return Err(AddressError::InvalidAddress("unsupported address format".into())),
    };

    if is_reserved(prefix) {
        return Err(AddressError::InvalidAddress(format!(
            "prefix {prefix} is reserved"
        )));
    }

    let expected_len = prefix_len + 32 + CHECKSUM_LEN;
    if data.len() != expected_len {
        return Err(AddressError::InvalidAddress(format!(
            "expected {expected_len} bytes, got {}",
            data.len()
        )));
    }

    let body_len = data.len() - CHECKSUM_LEN;
    let hash = ss58_hash(&data[..body_len]);
    if data[body_len..] != hash[..CHECKSUM_LEN] {
        return Err(AddressError::InvalidAddress("checksum mismatch".into()));
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&data[prefix_len..body_len]);
    Ok((prefix, AccountId32(key)))
}

/// Decode with the generic prefix and wrap as `MultiAddress::Id`.
pub fn encode_multi_address(address: &str) -> Result<MultiAddress, AddressError> {
    Ss58Codec::default().encode_multi_address(address)
}

fn prefix_bytes(prefix: u16) -> Vec<u8> {
    match prefix {
        0..=63 => vec![prefix as u8],
        _ => {
            let first = ((prefix & 0b0000_0000_1111_1100) as u8 >> 2) | 0b0100_0000;
            let second = ((prefix >> 8) as u8) | (((prefix & 0b11) as u8) << 6);
            vec![first, second]
        }
    }
}

fn is_reserved(prefix: u16) -> bool {
    prefix == 46 || prefix == 47
}

fn ss58_hash(data: &[u8]) -> [u8; 64] {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_CHECKSUM_PREAMBLE);
    hasher.update(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}
