//! Property tests for address and amount parsing.

use proptest::prelude::*;

use asset_hub_client::address::{decode_any, AddressError, GENERIC_SS58_PREFIX};
use asset_hub_client::transfer::parse_amount;
use asset_hub_client::{AccountId32, Ss58Codec};

fn prefix() -> impl Strategy<Value = u16> {
    (0u16..16_384).prop_filter("reserved", |p| *p != 46 && *p != 47)
}

proptest! {
    #[test]
    fn test_ss58_round_trip(bytes in any::<[u8; 32]>(), prefix in prefix()) {
        let account = AccountId32(bytes);
        let codec = Ss58Codec::new(prefix);
        let address = codec.encode(&account);

        prop_assert_eq!(codec.decode(&address), Ok(account));
        prop_assert_eq!(decode_any(&address), Ok((prefix, account)));
    }

    #[test]
    fn test_foreign_prefix_is_rejected(bytes in any::<[u8; 32]>(), prefix in prefix()) {
        prop_assume!(prefix != GENERIC_SS58_PREFIX);
        let address = Ss58Codec::new(prefix).encode(&AccountId32(bytes));
        let is_mismatch = matches!(
            Ss58Codec::new(GENERIC_SS58_PREFIX).decode(&address),
            Err(AddressError::PrefixMismatch { .. })
        );
        prop_assert!(is_mismatch);
    }

    #[test]
    fn test_corrupted_checksum_is_rejected(bytes in any::<[u8; 32]>(), flip in 0usize..2) {
        let codec = Ss58Codec::new(GENERIC_SS58_PREFIX);
        let mut raw = bs58::decode(codec.encode(&AccountId32(bytes))).into_vec().unwrap();
        let last = raw.len() - 1 - flip;
        raw[last] ^= 0x01;
        let tampered = bs58::encode(raw).into_string();
        prop_assert!(codec.decode(&tampered).is_err());
    }

    #[test]
    fn test_decimal_amounts_parse(amount in any::<u128>()) {
        prop_assert_eq!(parse_amount(&amount.to_string()).ok(), Some(amount));
    }

    #[test]
    fn test_signed_or_fractional_amounts_fail(amount in any::<u64>(), frac in 1u32..1000) {
        let negative = format!("-{amount}");
        let fractional = format!("{amount}.{frac}");
        prop_assert!(parse_amount(&negative).is_err());
        prop_assert!(parse_amount(&fractional).is_err());
    }
}
