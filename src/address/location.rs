//! Cross-consensus (XCM) locations.
//!
//! Only the junction kinds this client needs are modelled. The set is closed
//! and the encoder is written out by hand because the wire format is the
//! XCM v3/v4 `Junction` enum, whose variant indices are fixed.

use codec::{Compact, Encode, Output};

use super::AddressError;
use crate::chain::types::AssetId;

/// Pallet index of `pallet-assets` on Asset Hub.
pub const ASSETS_PALLET_INSTANCE: u8 = 50;

const MAX_JUNCTIONS: usize = 8;

/// One step of a location's interior path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Junction {
    Parachain(u32),
    /// Account on the current network (`network: None`).
    AccountId32 { id: [u8; 32] },
    AccountIndex64 { index: u64 },
    AccountKey20 { key: [u8; 20] },
    PalletInstance(u8),
    GeneralIndex(u128),
    OnlyChild,
}

impl Junction {
    fn variant_index(&self) -> u8 {
        match self {
            Junction::Parachain(_) => 0,
            Junction::AccountId32 { .. } => 1,
            Junction::AccountIndex64 { .. } => 2,
            Junction::AccountKey20 { .. } => 3,
            Junction::PalletInstance(_) => 4,
            Junction::GeneralIndex(_) => 5,
            Junction::OnlyChild => 7,
        }
    }
}

impl Encode for Junction {
    fn encode_to<T: Output + ?Sized>(&self, dest: &mut T) {
        dest.push_byte(self.variant_index());
        match self {
            Junction::Parachain(id) => Compact(*id).encode_to(dest),
            Junction::AccountId32 { id } => {
                None::<()>.encode_to(dest);
                id.encode_to(dest);
            }
            Junction::AccountIndex64 { index } => {
                None::<()>.encode_to(dest);
                Compact(*index).encode_to(dest);
            }
            Junction::AccountKey20 { key } => {
                None::<()>.encode_to(dest);
                key.encode_to(dest);
            }
            Junction::PalletInstance(index) => index.encode_to(dest),
            Junction::GeneralIndex(index) => Compact(*index).encode_to(dest),
            Junction::OnlyChild => {}
        }
    }
}

/// A relative location: `parents` hops up, then down through `interior`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    parents: u8,
    interior: Vec<Junction>,
}

impl Location {
    /// Build a location, rejecting interiors longer than `X8`.
    pub fn new(parents: u8, interior: Vec<Junction>) -> Result<Self, AddressError> {
        if interior.len() > MAX_JUNCTIONS {
            return Err(AddressError::TooManyJunctions(interior.len()));
        }
        Ok(Self { parents, interior })
    }

    /// The location of the current consensus system.
    pub fn here() -> Self {
        Self {
            parents: 0,
            interior: Vec::new(),
        }
    }

    pub fn parents(&self) -> u8 {
        self.parents
    }

    pub fn interior(&self) -> &[Junction] {
        &self.interior
    }
}

impl Encode for Location {
    fn encode_to<T: Output + ?Sized>(&self, dest: &mut T) {
        self.parents.encode_to(dest);
        // `Junctions::Here` is variant 0, `X1`..`X8` follow in order.
        dest.push_byte(self.interior.len() as u8);
        for junction in &self.interior {
            junction.encode_to(dest);
        }
    }
}

/// Location of a `pallet-assets` asset, used to pay fees in that asset.
pub fn build_fee_asset_location(asset_id: AssetId) -> Location {
    Location {
        parents: 0,
        interior: vec![
            Junction::PalletInstance(ASSETS_PALLET_INSTANCE),
            Junction::GeneralIndex(asset_id.0 as u128),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_location_shape() {
        let location = build_fee_asset_location(AssetId(8));
        assert_eq!(location.parents(), 0);
        assert_eq!(
            location.interior(),
            &[Junction::PalletInstance(50), Junction::GeneralIndex(8)]
        );
    }

    #[test]
    fn fee_location_encoding() {
        let location = build_fee_asset_location(AssetId(8));
        assert_eq!(location.encode(), vec![0x00, 0x02, 0x04, 0x32, 0x05, 0x20]);

        let location = build_fee_asset_location(AssetId(1984));
        // 1984 is a two-byte compact
        assert_eq!(
            location.encode(),
            vec![0x00, 0x02, 0x04, 0x32, 0x05, 0x01, 0x1f]
        );
    }

    #[test]
    fn optional_location_prefix() {
        assert_eq!(Some(Location::here()).encode(), vec![0x01, 0x00, 0x00]);
        assert_eq!(None::<Location>.encode(), vec![0x00]);
    }

    #[test]
    fn parent_parachain() {
        let location = Location::new(1, vec![Junction::Parachain(1000)]).unwrap();
        assert_eq!(location.encode(), vec![0x01, 0x01, 0x00, 0xa1, 0x0f]);
    }

    #[test]
    fn account_junction_has_no_network() {
        let encoded = Junction::AccountId32 { id: [1u8; 32] }.encode();
        assert_eq!(encoded.len(), 34);
        assert_eq!(&encoded[..2], &[0x01, 0x00]);
    }

    #[test]
    fn too_many_junctions() {
        let interior = vec![Junction::OnlyChild; 9];
        assert_eq!(
            Location::new(0, interior),
            Err(AddressError::TooManyJunctions(9))
        );
    }
}
