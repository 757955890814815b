//! Signed extrinsic construction.
//!
//! # Responsibilities
//! - Encode the signed-extension data the runtime declares in its metadata
//! - Produce the payload handed to the signer
//! - Assemble the final version-4 extrinsic
//!
//! # Wire Layout
//! ```text
//! Compact(len) ‖ 0x84 ‖ MultiAddress::Id(signer) ‖ MultiSignature ‖ extra ‖ call
//! payload = call ‖ extra ‖ additional   (blake2-256 if longer than 256 bytes)
//! ```

use async_trait::async_trait;
use codec::{Compact, Decode, Encode};

use crate::address::{AccountId32, Location, MultiAddress};
use crate::chain::hashing::blake2_256;
use crate::chain::metadata::Metadata;
use crate::chain::types::{Balance, ChainError, ChainResult, H256};

const SIGNED_FLAG: u8 = 0b1000_0000;
const SUPPORTED_VERSION: u8 = 4;

/// Transaction validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Era {
    Immortal,
    Mortal { period: u64, phase: u64 },
}

impl Era {
    /// Era valid for roughly `period` blocks starting at `current`.
    ///
    /// The period is rounded up to a power of two in `4..=65536`.
    pub fn mortal(period: u64, current: u64) -> Self {
        let period = period
            .checked_next_power_of_two()
            .unwrap_or(1 << 16)
            .clamp(4, 1 << 16);
        let phase = current % period;
        let quantize = (period >> 12).max(1);
        Era::Mortal {
            period,
            phase: phase / quantize * quantize,
        }
    }

    pub fn is_immortal(&self) -> bool {
        matches!(self, Era::Immortal)
    }

    /// First block of the era containing `current`; its hash is the
    /// checkpoint the runtime signs against.
    pub fn birth(&self, current: u64) -> u64 {
        match self {
            Era::Immortal => 0,
            Era::Mortal { period, phase } => {
                (current.max(*phase) - phase) / period * period + phase
            }
        }
    }
}

impl Encode for Era {
    fn encode_to<T: codec::Output + ?Sized>(&self, dest: &mut T) {
        match self {
            Era::Immortal => dest.push_byte(0),
            Era::Mortal { period, phase } => {
                let quantize = (period >> 12).max(1);
                let low = (period.trailing_zeros().saturating_sub(1)).clamp(1, 15) as u16;
                let high = ((phase / quantize) << 4) as u16;
                dest.write(&(low | high).to_le_bytes());
            }
        }
    }
}

/// Signature in the runtime's `MultiSignature` format.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum MultiSignature {
    #[codec(index = 0)]
    Ed25519([u8; 64]),
    #[codec(index = 1)]
    Sr25519([u8; 64]),
    #[codec(index = 2)]
    Ecdsa([u8; 65]),
}

/// Produces signatures on behalf of an account.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, account: &AccountId32, payload: &[u8]) -> ChainResult<MultiSignature>;
}

/// A fully encoded runtime call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    label: String,
    data: Vec<u8>,
}

impl Call {
    /// `index` is `[pallet_index, call_index]` from metadata.
    pub fn new(index: [u8; 2], label: impl Into<String>, args: &impl Encode) -> Self {
        let mut data = index.to_vec();
        args.encode_to(&mut data);
        Self {
            label: label.into(),
            data,
        }
    }

    /// `Pallet.call` name, for logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Caller-chosen options of one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// Asset to pay fees in; `None` pays in the native token.
    pub fee_asset: Option<Location>,
    pub tip: Balance,
    /// Validity period in blocks; 0 makes the transaction immortal.
    pub mortality: u64,
}

/// Everything the signed extensions need, resolved from chain state.
#[derive(Debug, Clone)]
pub struct ExtrinsicParams {
    pub spec_version: u32,
    pub transaction_version: u32,
    pub genesis_hash: H256,
    pub nonce: u32,
    pub era: Era,
    /// Block the era is anchored to; the genesis hash when immortal.
    pub checkpoint: H256,
    pub tip: Balance,
    pub fee_asset: Option<Location>,
}

/// Encoded `extra` (goes into the extrinsic) and `additional` (signed only).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedExtra {
    pub extra: Vec<u8>,
    pub additional: Vec<u8>,
}

/// Encode every signed extension the runtime declares, in order.
pub fn encode_signed_extensions(
    metadata: &Metadata,
    params: &ExtrinsicParams,
) -> ChainResult<SignedExtra> {
    let mut out = SignedExtra::default();

    for ext in metadata.signed_extensions() {
        match ext.identifier.as_str() {
            "CheckSpecVersion" => params.spec_version.encode_to(&mut out.additional),
            "CheckTxVersion" => params.transaction_version.encode_to(&mut out.additional),
            "CheckGenesis" => params.genesis_hash.0.encode_to(&mut out.additional),
            "CheckMortality" | "CheckEra" => {
                params.era.encode_to(&mut out.extra);
                params.checkpoint.0.encode_to(&mut out.additional);
            }
            "CheckNonce" => Compact(params.nonce).encode_to(&mut out.extra),
            "ChargeAssetTxPayment" => {
                Compact(params.tip).encode_to(&mut out.extra);
                params.fee_asset.encode_to(&mut out.extra);
            }
            "ChargeTransactionPayment" => {
                if params.fee_asset.is_some() {
                    return Err(ChainError::Metadata(
                        "runtime has no ChargeAssetTxPayment; fees cannot be paid in an asset"
                            .into(),
                    ));
                }
                Compact(params.tip).encode_to(&mut out.extra);
            }
            "CheckMetadataHash" => {
                // Mode::Disabled, no hash
                0u8.encode_to(&mut out.extra);
                None::<[u8; 32]>.encode_to(&mut out.additional);
            }
            other => {
                if !metadata.is_zero_sized(ext.ty.id)
                    || !metadata.is_zero_sized(ext.additional_signed.id)
                {
                    return Err(ChainError::Metadata(format!(
                        "unsupported signed extension {other}"
                    )));
                }
            }
        }
    }

    Ok(out)
}

/// Bytes the signer signs.
pub fn signer_payload(call: &Call, extra: &SignedExtra) -> Vec<u8> {
    let mut payload =
        Vec::with_capacity(call.data().len() + extra.extra.len() + extra.additional.len());
    payload.extend_from_slice(call.data());
    payload.extend_from_slice(&extra.extra);
    payload.extend_from_slice(&extra.additional);
    if payload.len() > 256 {
        blake2_256(&payload).to_vec()
    } else {
        payload
    }
}

/// Assemble a signed extrinsic, length-prefixed and ready for submission.
pub fn assemble(
    metadata: &Metadata,
    signer: &AccountId32,
    signature: &MultiSignature,
    extra: &SignedExtra,
    call: &Call,
) -> ChainResult<Vec<u8>> {
    let version = metadata.extrinsic_version();
    if version != SUPPORTED_VERSION {
        return Err(ChainError::Metadata(format!(
            "unsupported extrinsic version {version}"
        )));
    }

    let mut body = vec![SIGNED_FLAG | version];
    MultiAddress::Id(*signer).encode_to(&mut body);
    signature.encode_to(&mut body);
    body.extend_from_slice(&extra.extra);
    body.extend_from_slice(call.data());

    let mut encoded = Compact(body.len() as u32).encode();
    encoded.extend(body);
    Ok(encoded)
}

/// Hash the node reports for an extrinsic.
pub fn extrinsic_hash(encoded: &[u8]) -> H256 {
    H256(blake2_256(encoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::build_fee_asset_location;
    use crate::chain::types::AssetId;
    use frame_metadata::v14::{ExtrinsicMetadata, RuntimeMetadataV14, SignedExtensionMetadata};
    use scale_info::meta_type;

    fn ext(identifier: &'static str) -> SignedExtensionMetadata<scale_info::form::MetaForm> {
        SignedExtensionMetadata {
            identifier,
            ty: meta_type::<()>(),
            additional_signed: meta_type::<()>(),
        }
    }

    fn metadata(extensions: Vec<SignedExtensionMetadata<scale_info::form::MetaForm>>) -> Metadata {
        let extrinsic = ExtrinsicMetadata {
            ty: meta_type::<()>(),
            version: 4,
            signed_extensions: extensions,
        };
        Metadata::from_v14(RuntimeMetadataV14::new(vec![], extrinsic, meta_type::<()>()))
    }

    fn params(fee_asset: Option<Location>) -> ExtrinsicParams {
        ExtrinsicParams {
            spec_version: 1_016_000,
            transaction_version: 16,
            genesis_hash: H256([0x67; 32]),
            nonce: 5,
            era: Era::Immortal,
            checkpoint: H256([0x67; 32]),
            tip: 0,
            fee_asset,
        }
    }

    #[test]
    fn era_encoding() {
        assert_eq!(Era::Immortal.encode(), vec![0]);
        assert_eq!(Era::mortal(64, 42).encode(), vec![165, 2]);
        assert_eq!(Era::mortal(32768, 20_000).encode(), vec![78, 156]);
        assert_eq!(
            Era::mortal(50, 100),
            Era::Mortal {
                period: 64,
                phase: 36
            }
        );
        assert_eq!(Era::mortal(1, 10), Era::Mortal { period: 4, phase: 2 });
    }

    #[test]
    fn era_birth_follows_quantized_phase() {
        let era = Era::mortal(8192, 10_001);
        assert_eq!(era, Era::Mortal { period: 8192, phase: 1808 });
        assert_eq!(era.birth(10_001), 10_000);

        let era = Era::mortal(64, 1_000);
        assert_eq!(era.birth(1_000), 1_000);
        assert_eq!(era.birth(1_010), 1_000);
        assert_eq!(Era::Immortal.birth(1_000), 0);
    }

    #[test]
    fn asset_payment_carries_location() {
        let meta = metadata(vec![
            ext("CheckNonZeroSender"),
            ext("CheckSpecVersion"),
            ext("CheckTxVersion"),
            ext("CheckGenesis"),
            ext("CheckMortality"),
            ext("CheckNonce"),
            ext("CheckWeight"),
            ext("ChargeAssetTxPayment"),
            ext("CheckMetadataHash"),
        ]);
        let location = build_fee_asset_location(AssetId(8));
        let out = encode_signed_extensions(&meta, &params(Some(location))).unwrap();

        // era, nonce 5, tip 0, Some(location), metadata-hash mode
        assert_eq!(
            out.extra,
            vec![0x00, 0x14, 0x00, 0x01, 0x00, 0x02, 0x04, 0x32, 0x05, 0x20, 0x00]
        );
        // spec, tx version, genesis, checkpoint, None
        assert_eq!(out.additional.len(), 4 + 4 + 32 + 32 + 1);
        assert_eq!(&out.additional[..4], &1_016_000u32.to_le_bytes());
        assert_eq!(out.additional.last(), Some(&0));
    }

    #[test]
    fn native_payment_rejects_fee_asset() {
        let meta = metadata(vec![ext("ChargeTransactionPayment")]);
        let location = build_fee_asset_location(AssetId(8));
        assert!(encode_signed_extensions(&meta, &params(Some(location))).is_err());
        let out = encode_signed_extensions(&meta, &params(None)).unwrap();
        assert_eq!(out.extra, vec![0x00]);
    }

    #[test]
    fn unknown_extension_must_be_empty() {
        let meta = metadata(vec![SignedExtensionMetadata {
            identifier: "StorageWeightReclaim",
            ty: meta_type::<u32>(),
            additional_signed: meta_type::<()>(),
        }]);
        assert!(matches!(
            encode_signed_extensions(&meta, &params(None)),
            Err(ChainError::Metadata(_))
        ));
    }

    #[test]
    fn long_payload_is_hashed() {
        let call = Call::new([50, 9], "Assets.transfer_keep_alive", &vec![7u8; 300]);
        let extra = SignedExtra::default();
        assert_eq!(signer_payload(&call, &extra).len(), 32);

        let short = Call::new([50, 9], "Assets.transfer_keep_alive", &Compact(8u32));
        assert_eq!(signer_payload(&short, &extra), vec![50, 9, 0x20]);
    }

    #[test]
    fn assembled_layout() {
        let meta = metadata(vec![]);
        let signer = AccountId32([1; 32]);
        let signature = MultiSignature::Ed25519([2; 64]);
        let extra = SignedExtra {
            extra: vec![0xee],
            additional: vec![0xff],
        };
        let call = Call::new([50, 9], "Assets.transfer_keep_alive", &Compact(8u32));
        let xt = assemble(&meta, &signer, &signature, &extra, &call).unwrap();

        // 1 + (1 + 32) + (1 + 64) + 1 + 3
        let body_len = 103;
        assert_eq!(Compact::<u32>::decode(&mut &xt[..]).unwrap().0, body_len);
        let body = &xt[2..];
        assert_eq!(body[0], 0x84);
        assert_eq!(body[1], 0x00);
        assert_eq!(&body[2..34], &[1; 32]);
        assert_eq!(body[34], 0x00);
        assert_eq!(body[99], 0xee);
        assert_eq!(&body[100..], &[50, 9, 0x20]);
    }
}
