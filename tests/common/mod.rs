//! In-memory ledger speaking the JSON-RPC subset the client uses.
//!
//! The ledger runs a miniature Asset Hub runtime: one `Assets` pallet at
//! index 50 whose `transfer_keep_alive` moves balances, verifies ed25519
//! signatures and nonces, and reports dispatch failures through
//! `System.Events`. Fees are not modelled.

#![allow(dead_code)]

use async_trait::async_trait;
use codec::{Compact, Decode, Encode};
use ed25519_dalek::{Signature, SigningKey, Verifier, VerifyingKey};
use frame_metadata::v14::{
    ExtrinsicMetadata, PalletCallMetadata, PalletErrorMetadata, PalletEventMetadata,
    PalletMetadata, RuntimeMetadataV14, SignedExtensionMetadata,
};
use frame_metadata::{RuntimeMetadata, RuntimeMetadataPrefixed, META_RESERVED};
use scale_info::{meta_type, TypeInfo};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use asset_hub_client::address::{decode_any, AccountId32, MultiAddress};
use asset_hub_client::chain::hashing::blake2_256;
use asset_hub_client::chain::storage::{system_events_key, AssetAccount, StorageAddress};
use asset_hub_client::chain::types::{decode_hex, encode_hex};
use asset_hub_client::chain::{AssetId, ChainConnection, ChainSpecification, MultiSignature, H256};
use asset_hub_client::rpc::{RpcError, RpcSubscription, Transport};

pub const ASSET: AssetId = AssetId(8);
pub const SPEC_VERSION: u32 = 1_016_000;
pub const TX_VERSION: u32 = 16;

const GENESIS: H256 = H256([0x67; 32]);
const FIRST_BLOCK: u64 = 1_000;
const INHERENT: &str = "0x280403000b804e5d0c9301";

// ---- miniature runtime ----------------------------------------------------

#[derive(Encode, TypeInfo)]
struct Weight {
    #[codec(compact)]
    ref_time: u64,
    #[codec(compact)]
    proof_size: u64,
}

#[derive(Encode, TypeInfo)]
struct DispatchInfo {
    weight: Weight,
    class: u8,
    pays_fee: bool,
}

#[derive(Encode, TypeInfo)]
struct ModuleError {
    index: u8,
    error: [u8; 4],
}

#[derive(Encode, TypeInfo)]
enum TokenError {
    FundsUnavailable,
    OnlyProvider,
    BelowMinimum,
}

#[derive(Encode, TypeInfo)]
enum DispatchError {
    Other,
    CannotLookup,
    BadOrigin,
    Module(ModuleError),
    ConsumerRemaining,
    NoProviders,
    TooManyConsumers,
    Token(TokenError),
}

#[derive(Encode, TypeInfo)]
enum SystemEvent {
    ExtrinsicSuccess {
        dispatch_info: DispatchInfo,
    },
    ExtrinsicFailed {
        dispatch_error: DispatchError,
        dispatch_info: DispatchInfo,
    },
}

#[derive(Encode, TypeInfo)]
enum AssetsEvent {
    #[codec(index = 9)]
    Transferred {
        asset_id: u32,
        from: [u8; 32],
        to: [u8; 32],
        amount: u128,
    },
}

#[derive(Encode, TypeInfo)]
enum AssetsError {
    BalanceLow,
    NoAccount,
}

#[allow(non_camel_case_types, dead_code)]
#[derive(TypeInfo)]
enum AssetsCall {
    #[codec(index = 8)]
    transfer {
        #[codec(compact)]
        id: u32,
        target: [u8; 32],
        #[codec(compact)]
        amount: u128,
    },
    #[codec(index = 9)]
    transfer_keep_alive {
        #[codec(compact)]
        id: u32,
        target: [u8; 32],
        #[codec(compact)]
        amount: u128,
    },
}

#[derive(Encode)]
enum Phase {
    ApplyExtrinsic(u32),
}

#[derive(Encode)]
enum RuntimeEvent {
    #[codec(index = 0)]
    System(SystemEvent),
    #[codec(index = 50)]
    Assets(AssetsEvent),
}

#[derive(Encode)]
struct EventRecord {
    phase: Phase,
    event: RuntimeEvent,
    topics: Vec<[u8; 32]>,
}

fn dispatch_info() -> DispatchInfo {
    DispatchInfo {
        weight: Weight {
            ref_time: 180_000_000,
            proof_size: 3_593,
        },
        class: 0,
        pays_fee: true,
    }
}

fn record(index: u32, event: RuntimeEvent) -> EventRecord {
    EventRecord {
        phase: Phase::ApplyExtrinsic(index),
        event,
        topics: Vec::new(),
    }
}

fn runtime_metadata() -> Vec<u8> {
    let pallets = vec![
        PalletMetadata {
            name: "System",
            storage: None,
            calls: None,
            event: Some(PalletEventMetadata {
                ty: meta_type::<SystemEvent>(),
            }),
            constants: vec![],
            error: None,
            index: 0,
        },
        PalletMetadata {
            name: "Assets",
            storage: None,
            calls: Some(PalletCallMetadata {
                ty: meta_type::<AssetsCall>(),
            }),
            event: Some(PalletEventMetadata {
                ty: meta_type::<AssetsEvent>(),
            }),
            constants: vec![],
            error: Some(PalletErrorMetadata {
                ty: meta_type::<AssetsError>(),
            }),
            index: 50,
        },
    ];
    let signed_extensions = [
        "CheckNonZeroSender",
        "CheckSpecVersion",
        "CheckTxVersion",
        "CheckGenesis",
        "CheckMortality",
        "CheckNonce",
        "CheckWeight",
        "ChargeAssetTxPayment",
    ]
    .into_iter()
    .map(|identifier| SignedExtensionMetadata {
        identifier,
        ty: meta_type::<()>(),
        additional_signed: meta_type::<()>(),
    })
    .collect();
    let extrinsic = ExtrinsicMetadata {
        ty: meta_type::<()>(),
        version: 4,
        signed_extensions,
    };
    let v14 = RuntimeMetadataV14::new(pallets, extrinsic, meta_type::<()>());
    RuntimeMetadataPrefixed(META_RESERVED, RuntimeMetadata::V14(v14)).encode()
}

// ---- extrinsic parsing ----------------------------------------------------

/// A signed extrinsic as the ledger accepted it.
#[derive(Debug, Clone)]
pub struct Submitted {
    pub signer: AccountId32,
    pub nonce: u32,
    pub tip: u128,
    pub mortal: bool,
    /// `(period, phase)` of a mortal era.
    pub era: Option<(u64, u64)>,
    /// Encoded fee-asset location from `ChargeAssetTxPayment`.
    pub fee_location: Option<Vec<u8>>,
    extra: Vec<u8>,
    call: Vec<u8>,
    signature: [u8; 64],
}

fn take<T: Decode>(input: &mut &[u8]) -> Result<T, String> {
    T::decode(input).map_err(|e| format!("could not decode: {e}"))
}

fn skip_location(input: &mut &[u8]) -> Result<(), String> {
    let _parents: u8 = take(input)?;
    let junctions: u8 = take(input)?;
    for _ in 0..junctions {
        match take::<u8>(input)? {
            0 => {
                take::<Compact<u32>>(input)?;
            }
            4 => {
                take::<u8>(input)?;
            }
            5 => {
                take::<Compact<u128>>(input)?;
            }
            other => return Err(format!("unexpected junction {other}")),
        }
    }
    Ok(())
}

fn parse_extrinsic(bytes: &[u8]) -> Result<Submitted, String> {
    let input = &mut &bytes[..];
    let len = take::<Compact<u32>>(input)?.0 as usize;
    if input.len() != len {
        return Err("length prefix mismatch".into());
    }
    if take::<u8>(input)? != 0x84 {
        return Err("not a signed v4 extrinsic".into());
    }
    let signer = match take::<MultiAddress>(input)? {
        MultiAddress::Id(id) => id,
        other => return Err(format!("unsupported signer {other:?}")),
    };
    let signature = match take::<MultiSignature>(input)? {
        MultiSignature::Ed25519(sig) => sig,
        _ => return Err("unsupported signature scheme".into()),
    };

    let extra_start: &[u8] = input;
    let era = match take::<u8>(input)? {
        0 => None,
        first => {
            let encoded = u16::from_le_bytes([first, take::<u8>(input)?]) as u64;
            let period = 2u64 << (encoded % 16);
            let quantize = (period >> 12).max(1);
            Some((period, (encoded >> 4) * quantize))
        }
    };
    let nonce = take::<Compact<u32>>(input)?.0;
    let tip = take::<Compact<u128>>(input)?.0;
    let fee_location = match take::<u8>(input)? {
        0 => None,
        1 => {
            let start: &[u8] = input;
            skip_location(input)?;
            Some(start[..start.len() - input.len()].to_vec())
        }
        other => return Err(format!("bad option tag {other}")),
    };
    let extra = extra_start[..extra_start.len() - input.len()].to_vec();

    Ok(Submitted {
        signer,
        nonce,
        tip,
        mortal: era.is_some(),
        era,
        fee_location,
        extra,
        call: input.to_vec(),
        signature,
    })
}

fn parse_transfer(call: &[u8]) -> Result<(u32, AccountId32, u128), String> {
    let input = &mut &call[..];
    let index: [u8; 2] = take(input)?;
    if index != [50, 9] {
        return Err(format!("unexpected call {index:?}"));
    }
    let id = take::<Compact<u32>>(input)?.0;
    let target = match take::<MultiAddress>(input)? {
        MultiAddress::Id(id) => id,
        other => return Err(format!("unsupported target {other:?}")),
    };
    let amount = take::<Compact<u128>>(input)?.0;
    if !input.is_empty() {
        return Err("trailing call bytes".into());
    }
    Ok((id, target, amount))
}

fn verify_signature(xt: &Submitted, checkpoint: H256) -> Result<(), String> {
    let mut payload = xt.call.clone();
    payload.extend_from_slice(&xt.extra);
    payload.extend(SPEC_VERSION.encode());
    payload.extend(TX_VERSION.encode());
    payload.extend_from_slice(&GENESIS.0);
    payload.extend_from_slice(&checkpoint.0);
    let payload = if payload.len() > 256 {
        blake2_256(&payload).to_vec()
    } else {
        payload
    };
    let key = VerifyingKey::from_bytes(&xt.signer.0).map_err(|_| "BadSigner".to_string())?;
    key.verify(&payload, &Signature::from_bytes(&xt.signature))
        .map_err(|_| "BadProof".to_string())
}

// ---- ledger state ---------------------------------------------------------

struct StorageSub {
    id: String,
    keys: Vec<String>,
    tx: mpsc::UnboundedSender<Value>,
}

struct Block {
    extrinsics: Vec<String>,
    events: Vec<u8>,
}

struct State {
    storage: HashMap<String, Vec<u8>>,
    nonces: HashMap<AccountId32, u32>,
    min_balance: u128,
    headers: HashMap<String, u64>,
    blocks: HashMap<String, Block>,
    finalized: (H256, u64),
    storage_subs: Vec<StorageSub>,
    watchers: Vec<mpsc::UnboundedSender<Value>>,
    calls: Vec<String>,
    failing: HashSet<String>,
    submissions: Vec<Submitted>,
    next_id: u64,
    /// Statuses sent for the next submission instead of executing it.
    scripted: Option<Vec<Value>>,
    /// `system_accountNextIndex` lags one behind the ledger.
    stale_index: bool,
}

impl State {
    fn storage_value(&self, key: &str) -> Value {
        self.storage
            .get(key)
            .map_or(Value::Null, |v| json!(encode_hex(v)))
    }

    fn write(&mut self, key: String, value: Option<Vec<u8>>) {
        match value {
            Some(v) => self.storage.insert(key.clone(), v),
            None => self.storage.remove(&key),
        };
        let head = self.finalized.0.to_hex();
        let change = json!([key.clone(), self.storage_value(&key)]);
        for sub in &self.storage_subs {
            if sub.keys.contains(&key) {
                let _ = sub
                    .tx
                    .send(json!({"block": head.clone(), "changes": [change.clone()]}));
            }
        }
    }

    fn balance(&self, key: &str) -> u128 {
        self.storage
            .get(key)
            .and_then(|v| u128::decode(&mut &v[..]).ok())
            .unwrap_or(0)
    }

    fn set_balance(&mut self, key: String, amount: u128) {
        let value = (amount > 0).then(|| {
            // balance, status: Liquid, reason: Consumer, extra
            let mut raw = amount.encode();
            raw.extend_from_slice(&[0, 0]);
            raw
        });
        self.write(key, value);
    }

    fn submit(&mut self, hex: &str) -> Result<Vec<Value>, String> {
        let bytes = decode_hex(hex).map_err(|e| e.to_string())?;
        let xt = parse_extrinsic(&bytes)?;
        let checkpoint = match xt.era {
            Some((period, phase)) => {
                let current = self.finalized.1;
                let birth = (current.max(phase) - phase) / period * period + phase;
                block_hash_of(birth)
            }
            None => GENESIS,
        };
        verify_signature(&xt, checkpoint)?;

        let expected = self.nonces.get(&xt.signer).copied().unwrap_or(0);
        if xt.nonce < expected {
            return Err("Stale".into());
        }
        if xt.nonce > expected {
            return Err("Future".into());
        }
        let (asset, target, amount) = parse_transfer(&xt.call)?;

        self.nonces.insert(xt.signer, expected + 1);
        self.submissions.push(xt.clone());

        let outcome = self.transfer_keep_alive(AssetId(asset), xt.signer, target, amount);
        let mut events = vec![record(
            0,
            RuntimeEvent::System(SystemEvent::ExtrinsicSuccess {
                dispatch_info: dispatch_info(),
            }),
        )];
        match outcome {
            Ok(()) => {
                events.push(record(
                    1,
                    RuntimeEvent::Assets(AssetsEvent::Transferred {
                        asset_id: asset,
                        from: xt.signer.0,
                        to: target.0,
                        amount,
                    }),
                ));
                events.push(record(
                    1,
                    RuntimeEvent::System(SystemEvent::ExtrinsicSuccess {
                        dispatch_info: dispatch_info(),
                    }),
                ));
            }
            Err(dispatch_error) => events.push(record(
                1,
                RuntimeEvent::System(SystemEvent::ExtrinsicFailed {
                    dispatch_error,
                    dispatch_info: dispatch_info(),
                }),
            )),
        }

        let extrinsics = vec![INHERENT.to_string(), hex.to_string()];
        let block = self.produce_block(extrinsics, events.encode());
        Ok(vec![
            json!("future"),
            json!("ready"),
            json!({"broadcast": ["12D3KooWJaAfPyiye7ZQBuHengTJJoMrcaz7Jj1UzHiKdNxA1Nkd"]}),
            json!({"inBlock": block.to_hex()}),
            json!({"finalized": block.to_hex()}),
        ])
    }

    fn transfer_keep_alive(
        &mut self,
        asset: AssetId,
        from: AccountId32,
        to: AccountId32,
        amount: u128,
    ) -> Result<(), DispatchError> {
        let from_key = asset_key(asset, from);
        let balance = self.balance(&from_key);
        if amount > balance {
            return Err(DispatchError::Module(ModuleError {
                index: 50,
                error: [0, 0, 0, 0],
            }));
        }
        if balance - amount < self.min_balance {
            return Err(DispatchError::Token(TokenError::FundsUnavailable));
        }
        let to_key = asset_key(asset, to);
        let received = self.balance(&to_key) + amount;
        self.set_balance(from_key, balance - amount);
        self.set_balance(to_key, received);
        Ok(())
    }

    fn produce_block(&mut self, extrinsics: Vec<String>, events: Vec<u8>) -> H256 {
        let number = self.finalized.1 + 1;
        let hash = block_hash_of(number);
        self.headers.insert(hash.to_hex(), number);
        self.blocks.insert(hash.to_hex(), Block { extrinsics, events });
        self.finalized = (hash, number);
        hash
    }

    fn header(&self, hash: &str) -> Option<Value> {
        if hash == GENESIS.to_hex() {
            let root = ChainSpecification::westend_asset_hub()
                .ok()?
                .genesis
                .state_root_hash;
            return Some(json!({"number": "0x0", "stateRoot": root}));
        }
        let number = self.headers.get(hash)?;
        Some(json!({
            "number": format!("0x{number:x}"),
            "stateRoot": H256([0x11; 32]).to_hex(),
        }))
    }
}

fn block_hash_of(number: u64) -> H256 {
    match number {
        0 => GENESIS,
        n => H256(blake2_256(&n.to_le_bytes())),
    }
}

fn asset_key(asset_id: AssetId, account: AccountId32) -> String {
    encode_hex(&AssetAccount { asset_id, account }.key())
}

fn not_found(method: &str) -> RpcError {
    RpcError::Call {
        code: -32601,
        message: format!("Method not found: {method}"),
        data: None,
    }
}

fn param_str(params: &Value, index: usize) -> Result<String, RpcError> {
    params
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RpcError::Call {
            code: -32602,
            message: format!("missing parameter {index}"),
            data: None,
        })
}

/// Hex parameters compare case-insensitively; addresses must not.
fn param_hex(params: &Value, index: usize) -> Result<String, RpcError> {
    param_str(params, index).map(|p| p.to_lowercase())
}

// ---- transport ------------------------------------------------------------

/// Shared handle to the in-memory ledger.
#[derive(Clone)]
pub struct MockLedger {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for MockLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MockLedger")
    }
}

impl MockLedger {
    pub fn new() -> Self {
        let finalized = (block_hash_of(FIRST_BLOCK), FIRST_BLOCK);
        let mut headers = HashMap::new();
        headers.insert(finalized.0.to_hex(), FIRST_BLOCK);
        Self {
            state: Arc::new(Mutex::new(State {
                storage: HashMap::new(),
                nonces: HashMap::new(),
                min_balance: 1,
                headers,
                blocks: HashMap::new(),
                finalized,
                storage_subs: Vec::new(),
                watchers: Vec::new(),
                calls: Vec::new(),
                failing: HashSet::new(),
                submissions: Vec::new(),
                next_id: 0,
                scripted: None,
                stale_index: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Run the connect handshake against this ledger.
    pub async fn connect(&self) -> ChainConnection {
        let spec = ChainSpecification::westend_asset_hub().unwrap();
        ChainConnection::from_transport(Arc::new(self.clone()), spec, None)
            .await
            .unwrap()
    }

    pub fn set_asset_balance(&self, asset_id: AssetId, account: &AccountId32, amount: u128) {
        self.lock().set_balance(asset_key(asset_id, *account), amount);
    }

    pub fn asset_balance(&self, asset_id: AssetId, account: &AccountId32) -> u128 {
        self.lock().balance(&asset_key(asset_id, *account))
    }

    pub fn set_min_balance(&self, amount: u128) {
        self.lock().min_balance = amount;
    }

    /// Every method received so far, unsubscriptions included.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|m| *m == method).count()
    }

    pub fn open_storage_subscriptions(&self) -> usize {
        self.lock().storage_subs.len()
    }

    /// Make every later call of `method` fail at the transport level.
    pub fn fail(&self, method: &str) {
        self.lock().failing.insert(method.to_string());
    }

    /// End every storage subscription from the server side.
    pub fn drop_subscriptions(&self) {
        self.lock().storage_subs.clear();
    }

    /// Finalize empty blocks until the head is at `number`.
    pub fn advance_to(&self, number: u64) {
        let mut state = self.lock();
        while state.finalized.1 < number {
            state.produce_block(Vec::new(), Vec::new());
        }
    }

    /// Consume `account`'s next nonce behind the client's back.
    pub fn bump_nonce(&self, account: &AccountId32) {
        *self.lock().nonces.entry(*account).or_insert(0) += 1;
    }

    /// Answer the next submission with `statuses` without executing it.
    pub fn script_statuses(&self, statuses: Vec<Value>) {
        self.lock().scripted = Some(statuses);
    }

    /// Report nonces one lower than the ledger expects.
    pub fn report_stale_nonces(&self) {
        self.lock().stale_index = true;
    }

    pub fn submissions(&self) -> Vec<Submitted> {
        self.lock().submissions.clone()
    }

    fn release(&self, method: &str, id: &str) {
        let mut state = self.lock();
        state.calls.push(method.to_string());
        state.storage_subs.retain(|sub| sub.id != id);
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockLedger {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let mut state = self.lock();
        state.calls.push(method.to_string());
        if state.failing.contains(method) {
            return Err(RpcError::Transport("injected failure".into()));
        }

        match method {
            "chain_getBlockHash" => {
                let number = params.get(0).and_then(Value::as_u64).unwrap_or(0);
                Ok(if number <= state.finalized.1 {
                    json!(block_hash_of(number).to_hex())
                } else {
                    Value::Null
                })
            }
            "chain_getFinalizedHead" => Ok(json!(state.finalized.0.to_hex())),
            "chain_getHeader" => {
                let hash = param_hex(&params, 0)?;
                Ok(state.header(&hash).unwrap_or(Value::Null))
            }
            "chain_getBlock" => {
                let hash = param_hex(&params, 0)?;
                Ok(match (state.blocks.get(&hash), state.header(&hash)) {
                    (Some(block), Some(header)) => json!({
                        "block": {"header": header, "extrinsics": block.extrinsics},
                        "justifications": null,
                    }),
                    _ => Value::Null,
                })
            }
            "state_getRuntimeVersion" => Ok(json!({
                "specName": "westmint",
                "implName": "westmint",
                "authoringVersion": 1,
                "specVersion": SPEC_VERSION,
                "implVersion": 0,
                "apis": [],
                "transactionVersion": TX_VERSION,
                "stateVersion": 1,
            })),
            "state_getMetadata" => Ok(json!(encode_hex(&runtime_metadata()))),
            "state_getStorage" => {
                let key = param_hex(&params, 0)?;
                if key == encode_hex(&system_events_key()) {
                    let block = param_hex(&params, 1)?;
                    return Ok(state
                        .blocks
                        .get(&block)
                        .map_or(Value::Null, |b| json!(encode_hex(&b.events))));
                }
                Ok(state.storage_value(&key))
            }
            "system_accountNextIndex" => {
                let address = param_str(&params, 0)?;
                let (_, account) = decode_any(&address).map_err(|e| RpcError::Call {
                    code: -32602,
                    message: e.to_string(),
                    data: None,
                })?;
                let nonce = state.nonces.get(&account).copied().unwrap_or(0);
                Ok(json!(if state.stale_index {
                    nonce.saturating_sub(1)
                } else {
                    nonce
                }))
            }
            other => Err(not_found(other)),
        }
    }

    async fn subscribe(
        &self,
        method: &str,
        params: Value,
        unsubscribe_method: &str,
    ) -> Result<RpcSubscription, RpcError> {
        let mut state = self.lock();
        state.calls.push(method.to_string());
        if state.failing.contains(method) {
            return Err(RpcError::Transport("injected failure".into()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.next_id += 1;
        let id = format!("sub-{}", state.next_id);

        match method {
            "state_subscribeStorage" => {
                let keys: Vec<String> = params
                    .get(0)
                    .and_then(Value::as_array)
                    .map(|keys| {
                        keys.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_lowercase)
                            .collect()
                    })
                    .unwrap_or_default();
                let changes: Vec<Value> = keys
                    .iter()
                    .map(|k| json!([k, state.storage_value(k)]))
                    .collect();
                let _ = tx.send(json!({
                    "block": state.finalized.0.to_hex(),
                    "changes": changes,
                }));
                state.storage_subs.push(StorageSub {
                    id: id.clone(),
                    keys,
                    tx,
                });
            }
            "author_submitAndWatchExtrinsic" => {
                let hex = param_hex(&params, 0)?;
                if let Some(statuses) = state.scripted.take() {
                    for status in statuses {
                        let _ = tx.send(status);
                    }
                    state.watchers.push(tx);
                    drop(state);
                    return Ok(self.release_on_cancel(id, rx, unsubscribe_method));
                }
                let statuses = state.submit(&hex).map_err(|reason| RpcError::Call {
                    code: 1010,
                    message: "Invalid Transaction".into(),
                    data: Some(json!(reason)),
                })?;
                for status in statuses {
                    let _ = tx.send(status);
                }
                state.watchers.push(tx);
            }
            other => return Err(not_found(other)),
        }
        drop(state);
        Ok(self.release_on_cancel(id, rx, unsubscribe_method))
    }
}

impl MockLedger {
    fn release_on_cancel(
        &self,
        id: String,
        rx: mpsc::UnboundedReceiver<Value>,
        unsubscribe_method: &str,
    ) -> RpcSubscription {
        let ledger = self.clone();
        let unsubscribe = unsubscribe_method.to_string();
        let sub_id = id.clone();
        RpcSubscription::new(id, rx, move || ledger.release(&unsubscribe, &sub_id))
    }
}

// ---- keys -----------------------------------------------------------------

/// Account id of an ed25519 seed.
pub fn account_of(seed: [u8; 32]) -> AccountId32 {
    AccountId32(SigningKey::from_bytes(&seed).verifying_key().to_bytes())
}
