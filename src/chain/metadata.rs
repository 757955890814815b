//! Runtime metadata access.
//!
//! # Responsibilities
//! - Decode the node's metadata (V14) once at connect time
//! - Resolve pallet/call indices by name
//! - Expose the signed-extension list the runtime expects
//! - Walk `System.Events` to find the dispatch outcome of one extrinsic
//!
//! # Design Decisions
//! - Events are not decoded into values; the type registry is only used to
//!   skip over fields so the next record can be found
//! - Dispatch errors are rendered as `Pallet.Error` strings using the
//!   pallet error enums from the same registry

use codec::{Compact, Decode};
use frame_metadata::v14::{PalletMetadata, RuntimeMetadataV14, SignedExtensionMetadata};
use frame_metadata::{RuntimeMetadata, RuntimeMetadataPrefixed, META_RESERVED};
use scale_info::form::PortableForm;
use scale_info::{PortableRegistry, TypeDef, TypeDefPrimitive, Variant};

use crate::chain::types::{ChainError, ChainResult};

/// When an event was emitted relative to block execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ApplyExtrinsic(u32),
    Finalization,
    Initialization,
}

/// The parts of an event record this client cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSummary {
    pub phase: Phase,
    pub pallet: String,
    pub variant: String,
    /// Rendered dispatch error of `System.ExtrinsicFailed`.
    pub dispatch_error: Option<String>,
}

/// Result of dispatching one extrinsic, read from the block's events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success,
    Failed(String),
}

/// Decoded runtime metadata.
#[derive(Debug, Clone)]
pub struct Metadata {
    inner: RuntimeMetadataV14,
}

impl Metadata {
    /// Decode `RuntimeMetadataPrefixed` bytes as returned by `state_getMetadata`.
    pub fn decode(bytes: &[u8]) -> ChainResult<Self> {
        let prefixed = RuntimeMetadataPrefixed::decode(&mut &bytes[..])
            .map_err(|e| ChainError::Metadata(format!("cannot decode metadata: {e}")))?;
        if prefixed.0 != META_RESERVED {
            return Err(ChainError::Metadata("missing metadata magic number".into()));
        }
        match prefixed.1 {
            RuntimeMetadata::V14(inner) => Ok(Self { inner }),
            other => Err(ChainError::Metadata(format!(
                "unsupported metadata version {}",
                other.version()
            ))),
        }
    }

    pub fn from_v14(inner: RuntimeMetadataV14) -> Self {
        Self { inner }
    }

    pub fn registry(&self) -> &PortableRegistry {
        &self.inner.types
    }

    /// Extrinsic format version (4 for current runtimes).
    pub fn extrinsic_version(&self) -> u8 {
        self.inner.extrinsic.version
    }

    /// Signed extensions in the order the runtime encodes them.
    pub fn signed_extensions(&self) -> &[SignedExtensionMetadata<PortableForm>] {
        &self.inner.extrinsic.signed_extensions
    }

    pub fn pallet(&self, name: &str) -> Option<&PalletMetadata<PortableForm>> {
        self.inner.pallets.iter().find(|p| p.name == name)
    }

    pub fn pallet_by_index(&self, index: u8) -> Option<&PalletMetadata<PortableForm>> {
        self.inner.pallets.iter().find(|p| p.index == index)
    }

    /// `[pallet_index, call_index]` of a dispatchable.
    pub fn call_index(&self, pallet: &str, call: &str) -> ChainResult<[u8; 2]> {
        let meta = self
            .pallet(pallet)
            .ok_or_else(|| ChainError::Metadata(format!("pallet {pallet} not found")))?;
        let calls = meta
            .calls
            .as_ref()
            .ok_or_else(|| ChainError::Metadata(format!("pallet {pallet} has no calls")))?;
        let variant = self
            .variants(calls.ty.id)?
            .iter()
            .find(|v| v.name == call)
            .ok_or_else(|| ChainError::Metadata(format!("call {pallet}.{call} not found")))?;
        Ok([meta.index, variant.index])
    }

    /// True if values of this type encode to zero bytes.
    pub fn is_zero_sized(&self, type_id: u32) -> bool {
        let Some(ty) = self.registry().resolve(type_id) else {
            return false;
        };
        match &ty.type_def {
            TypeDef::Composite(c) => c.fields.iter().all(|f| self.is_zero_sized(f.ty.id)),
            TypeDef::Tuple(t) => t.fields.iter().all(|f| self.is_zero_sized(f.id)),
            TypeDef::Array(a) => a.len == 0 || self.is_zero_sized(a.type_param.id),
            _ => false,
        }
    }

    /// Summaries of every record in an encoded `System.Events` value.
    pub fn decode_events(&self, bytes: &[u8]) -> ChainResult<Vec<EventSummary>> {
        let input = &mut &bytes[..];
        let count = Compact::<u32>::decode(input)?.0;
        // The count comes from the node; every record takes at least one byte.
        let mut events = Vec::with_capacity((count as usize).min(input.len()));
        for _ in 0..count {
            events.push(self.decode_event_record(input)?);
        }
        Ok(events)
    }

    /// Outcome of the extrinsic at `index`, if its completion event is present.
    pub fn dispatch_outcome(
        &self,
        events: &[EventSummary],
        index: u32,
    ) -> Option<DispatchOutcome> {
        events
            .iter()
            .filter(|e| e.phase == Phase::ApplyExtrinsic(index) && e.pallet == "System")
            .find_map(|e| match e.variant.as_str() {
                "ExtrinsicSuccess" => Some(DispatchOutcome::Success),
                "ExtrinsicFailed" => Some(DispatchOutcome::Failed(
                    e.dispatch_error
                        .clone()
                        .unwrap_or_else(|| "unknown dispatch error".to_string()),
                )),
                _ => None,
            })
    }

    fn decode_event_record(&self, input: &mut &[u8]) -> ChainResult<EventSummary> {
        let phase = match u8::decode(input)? {
            0 => Phase::ApplyExtrinsic(u32::decode(input)?),
            1 => Phase::Finalization,
            2 => Phase::Initialization,
            other => return Err(ChainError::Decode(format!("unknown event phase {other}"))),
        };

        let pallet_index = u8::decode(input)?;
        let pallet = self.pallet_by_index(pallet_index).ok_or_else(|| {
            ChainError::Metadata(format!("event from unknown pallet {pallet_index}"))
        })?;
        let event_ty = pallet
            .event
            .as_ref()
            .ok_or_else(|| ChainError::Metadata(format!("pallet {} has no events", pallet.name)))?
            .ty
            .id;

        let variant_index = u8::decode(input)?;
        let variant = self
            .variants(event_ty)?
            .iter()
            .find(|v| v.index == variant_index)
            .ok_or_else(|| {
                ChainError::Decode(format!(
                    "unknown event {variant_index} in pallet {}",
                    pallet.name
                ))
            })?;

        let failed = pallet.name == "System" && variant.name == "ExtrinsicFailed";
        let mut dispatch_error = None;
        for (i, field) in variant.fields.iter().enumerate() {
            let is_error_field = field.name.as_deref() == Some("dispatch_error")
                || (field.name.is_none() && i == 0);
            if failed && is_error_field && dispatch_error.is_none() {
                dispatch_error = Some(self.describe_error(field.ty.id, input)?);
            } else {
                self.skip(field.ty.id, input)?;
            }
        }

        // topics: Vec<H256>
        let topics = Compact::<u32>::decode(input)?.0 as usize;
        advance(input, topics * 32)?;

        Ok(EventSummary {
            phase,
            pallet: pallet.name.clone(),
            variant: variant.name.clone(),
            dispatch_error,
        })
    }

    /// Render a `DispatchError` as `Pallet.Error`, `Token::FundsUnavailable`
    /// or the bare variant name, consuming its bytes.
    fn describe_error(&self, type_id: u32, input: &mut &[u8]) -> ChainResult<String> {
        let variant = self.read_variant(type_id, input)?;
        let rest: &[u8] = input;

        let description = if variant.name == "Module" && variant.fields.len() == 1 {
            match rest {
                [pallet_index, error_index, ..] => {
                    self.module_error_name(*pallet_index, *error_index)
                }
                _ => None,
            }
        } else if variant.fields.len() == 1 {
            let inner = variant.fields[0].ty.id;
            match (self.variants(inner), rest.first()) {
                (Ok(variants), Some(index)) => variants
                    .iter()
                    .find(|v| v.index == *index)
                    .map(|v| format!("{}::{}", variant.name, v.name)),
                _ => None,
            }
        } else {
            None
        };

        for field in &variant.fields {
            self.skip(field.ty.id, input)?;
        }
        Ok(description.unwrap_or_else(|| variant.name.clone()))
    }

    fn module_error_name(&self, pallet_index: u8, error_index: u8) -> Option<String> {
        let pallet = self.pallet_by_index(pallet_index)?;
        let error_ty = pallet.error.as_ref()?.ty.id;
        let variant = self
            .variants(error_ty)
            .ok()?
            .iter()
            .find(|v| v.index == error_index)?;
        Some(format!("{}.{}", pallet.name, variant.name))
    }

    fn variants(&self, type_id: u32) -> ChainResult<&[Variant<PortableForm>]> {
        let ty = self.resolve(type_id)?;
        match &ty.type_def {
            TypeDef::Variant(v) => Ok(&v.variants),
            _ => Err(ChainError::Metadata(format!("type {type_id} is not an enum"))),
        }
    }

    fn read_variant(&self, type_id: u32, input: &mut &[u8]) -> ChainResult<&Variant<PortableForm>> {
        let index = u8::decode(input)?;
        self.variants(type_id)?
            .iter()
            .find(|v| v.index == index)
            .ok_or_else(|| ChainError::Decode(format!("variant {index} not in type {type_id}")))
    }

    fn resolve(&self, type_id: u32) -> ChainResult<&scale_info::Type<PortableForm>> {
        self.registry()
            .resolve(type_id)
            .ok_or_else(|| ChainError::Metadata(format!("type {type_id} not in registry")))
    }

    /// Advance `input` past one value of `type_id`.
    fn skip(&self, type_id: u32, input: &mut &[u8]) -> ChainResult<()> {
        let ty = self.resolve(type_id)?;
        match &ty.type_def {
            TypeDef::Composite(c) => {
                for field in &c.fields {
                    self.skip(field.ty.id, input)?;
                }
            }
            TypeDef::Variant(_) => {
                let variant = self.read_variant(type_id, input)?;
                for field in &variant.fields {
                    self.skip(field.ty.id, input)?;
                }
            }
            TypeDef::Sequence(s) => {
                let len = Compact::<u32>::decode(input)?.0;
                for _ in 0..len {
                    self.skip(s.type_param.id, input)?;
                }
            }
            TypeDef::Array(a) => {
                for _ in 0..a.len {
                    self.skip(a.type_param.id, input)?;
                }
            }
            TypeDef::Tuple(t) => {
                for field in &t.fields {
                    self.skip(field.id, input)?;
                }
            }
            TypeDef::Primitive(p) => skip_primitive(p, input)?,
            TypeDef::Compact(_) => skip_compact(input)?,
            TypeDef::BitSequence(b) => {
                let bits = Compact::<u32>::decode(input)?.0 as usize;
                let store_bytes = match &self.resolve(b.bit_store_type.id)?.type_def {
                    TypeDef::Primitive(p) => primitive_width(p).unwrap_or(1),
                    _ => 1,
                };
                let store_bits = store_bytes * 8;
                advance(input, bits.div_ceil(store_bits) * store_bytes)?;
            }
        }
        Ok(())
    }
}

fn primitive_width(p: &TypeDefPrimitive) -> Option<usize> {
    match p {
        TypeDefPrimitive::Bool | TypeDefPrimitive::U8 | TypeDefPrimitive::I8 => Some(1),
        TypeDefPrimitive::U16 | TypeDefPrimitive::I16 => Some(2),
        TypeDefPrimitive::U32 | TypeDefPrimitive::I32 | TypeDefPrimitive::Char => Some(4),
        TypeDefPrimitive::U64 | TypeDefPrimitive::I64 => Some(8),
        TypeDefPrimitive::U128 | TypeDefPrimitive::I128 => Some(16),
        TypeDefPrimitive::U256 | TypeDefPrimitive::I256 => Some(32),
        TypeDefPrimitive::Str => None,
    }
}

fn skip_primitive(p: &TypeDefPrimitive, input: &mut &[u8]) -> ChainResult<()> {
    match primitive_width(p) {
        Some(width) => advance(input, width),
        None => {
            let len = Compact::<u32>::decode(input)?.0 as usize;
            advance(input, len)
        }
    }
}

fn skip_compact(input: &mut &[u8]) -> ChainResult<()> {
    let first = *input
        .first()
        .ok_or_else(|| ChainError::Decode("unexpected end of input".into()))?;
    let width = match first & 0b11 {
        0 => 1,
        1 => 2,
        2 => 4,
        _ => (first >> 2) as usize + 5,
    };
    advance(input, width)
}

fn advance(input: &mut &[u8], n: usize) -> ChainResult<()> {
    if input.len() < n {
        return Err(ChainError::Decode(format!(
            "unexpected end of input: need {n} bytes, have {}",
            input.len()
        )));
    }
    *input = &input[n..];
    Ok(())
}
