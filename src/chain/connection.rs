//! The long-lived session to the ledger.
//!
//! # Responsibilities
//! - Connect to the first reachable endpoint and verify it serves the chain
//!   described by the chain specification
//! - Typed one-shot and streaming storage reads
//! - Sign-and-submit with a lifecycle event stream
//!
//! # Design Decisions
//! - Connection failures are fatal; there is no reconnect loop
//! - A submission is a single `author_submitAndWatchExtrinsic` call
//! - Dispatch failures are read from `System.Events` of the including block,
//!   so a failed transfer is reported as failed, not as included

use futures_util::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::address::{AccountId32, Ss58Codec, GENERIC_SS58_PREFIX};
use crate::chain::extrinsic::{
    assemble, encode_signed_extensions, extrinsic_hash, signer_payload, Call, Era,
    ExtrinsicParams, Signer, TxOptions,
};
use crate::chain::metadata::{DispatchOutcome, Metadata};
use crate::chain::spec::ChainSpecification;
use crate::chain::storage::{system_events_key, StorageAddress};
use crate::chain::subscription::{Subscription, SubscriptionHandle};
use crate::chain::types::{
    decode_hex, encode_hex, ChainError, ChainResult, RuntimeVersion, TxEvent, TxFailure, H256,
};
use crate::config::ChainConfig;
use crate::rpc::{CancelHandle, RpcError, RpcSubscription, Transport, WsTransport};

/// A verified session to one chain.
#[derive(Debug, Clone)]
pub struct ChainConnection {
    transport: Arc<dyn Transport>,
    spec: Arc<ChainSpecification>,
    metadata: Arc<Metadata>,
    runtime: RuntimeVersion,
    genesis_hash: H256,
    ss58: Ss58Codec,
}

impl ChainConnection {
    /// Connect to the configured endpoints in order and verify the chain.
    pub async fn connect(spec: ChainSpecification, config: &ChainConfig) -> ChainResult<Self> {
        let mut failures = Vec::new();

        for (i, url) in config.endpoints().enumerate() {
            let transport = match WsTransport::connect(url).await {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(endpoint = i, url = %url, error = %e, "Endpoint unreachable");
                    failures.push(format!("{url}: {e}"));
                    continue;
                }
            };

            match Self::from_transport(Arc::new(transport), spec.clone(), config.ss58_prefix).await
            {
                Ok(connection) => return Ok(connection),
                Err(e) => {
                    tracing::warn!(endpoint = i, url = %url, error = %e, "Endpoint rejected");
                    failures.push(format!("{url}: {e}"));
                }
            }
        }

        Err(ChainError::Connection(format!(
            "no usable endpoint for {}: {}",
            spec.id,
            failures.join("; ")
        )))
    }

    /// Run the connect handshake over an already open transport.
    pub async fn from_transport(
        transport: Arc<dyn Transport>,
        spec: ChainSpecification,
        ss58_prefix: Option<u16>,
    ) -> ChainResult<Self> {
        Self::handshake(transport, spec, ss58_prefix)
            .await
            .map_err(|e| match e {
                ChainError::Connection(_) => e,
                other => ChainError::Connection(other.to_string()),
            })
    }

    async fn handshake(
        transport: Arc<dyn Transport>,
        spec: ChainSpecification,
        ss58_prefix: Option<u16>,
    ) -> ChainResult<Self> {
        let expected_root = spec.genesis_state_root()?;

        let genesis_hash = parse_hash(transport.request("chain_getBlockHash", json!([0])).await?)?;
        let header = transport
            .request("chain_getHeader", json!([genesis_hash.to_hex()]))
            .await?;
        let state_root = header
            .get("stateRoot")
            .cloned()
            .ok_or_else(|| ChainError::Decode("genesis header has no stateRoot".into()))
            .and_then(parse_hash)?;

        if state_root != expected_root {
            return Err(ChainError::Connection(format!(
                "genesis mismatch for {}: expected state root {expected_root}, \
                 node reports {state_root}",
                spec.id
            )));
        }

        let runtime: RuntimeVersion =
            serde_json::from_value(transport.request("state_getRuntimeVersion", json!([])).await?)
                .map_err(|e| ChainError::Decode(format!("invalid runtime version: {e}")))?;

        let raw_metadata = transport.request("state_getMetadata", json!([])).await?;
        let metadata = Metadata::decode(&decode_hex(as_str(&raw_metadata)?)?)?;

        let prefix = ss58_prefix
            .or(spec.properties.ss58_format)
            .unwrap_or(GENERIC_SS58_PREFIX);

        tracing::info!(
            chain = %spec.name,
            genesis = %genesis_hash,
            spec_name = %runtime.spec_name,
            spec_version = runtime.spec_version,
            ss58_prefix = prefix,
            "Connected to chain"
        );

        Ok(Self {
            transport,
            spec: Arc::new(spec),
            metadata: Arc::new(metadata),
            runtime,
            genesis_hash,
            ss58: Ss58Codec::new(prefix),
        })
    }

    pub fn spec(&self) -> &ChainSpecification {
        &self.spec
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    // TODO: follow runtime upgrades via state_subscribeRuntimeVersion; the
    // version read at connect time goes stale after an upgrade.
    pub fn runtime_version(&self) -> &RuntimeVersion {
        &self.runtime
    }

    pub fn genesis_hash(&self) -> H256 {
        self.genesis_hash
    }

    /// Address codec for this chain's prefix.
    pub fn ss58(&self) -> Ss58Codec {
        self.ss58
    }

    /// Next usable nonce for `account`, including pool transactions.
    pub async fn account_next_index(&self, account: &AccountId32) -> ChainResult<u32> {
        let value = self
            .transport
            .request("system_accountNextIndex", json!([self.ss58.encode(account)]))
            .await?;
        value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| ChainError::Decode(format!("invalid account index: {value}")))
    }

    /// Hash of block `number` on the best chain.
    pub async fn block_hash(&self, number: u64) -> ChainResult<H256> {
        match self
            .transport
            .request("chain_getBlockHash", json!([number]))
            .await?
        {
            Value::Null => Err(ChainError::Decode(format!("block {number} is unknown"))),
            other => parse_hash(other),
        }
    }

    /// Hash and number of the latest finalized block.
    pub async fn finalized_head(&self) -> ChainResult<(H256, u64)> {
        let hash = parse_hash(
            self.transport
                .request("chain_getFinalizedHead", json!([]))
                .await?,
        )?;
        let header = self
            .transport
            .request("chain_getHeader", json!([hash.to_hex()]))
            .await?;
        let number = header
            .get("number")
            .and_then(Value::as_str)
            .and_then(|n| u64::from_str_radix(n.trim_start_matches("0x"), 16).ok())
            .ok_or_else(|| ChainError::Decode(format!("invalid header number in {header}")))?;
        Ok((hash, number))
    }

    /// Read a storage item once.
    pub async fn query_once<A: StorageAddress>(&self, address: &A) -> ChainResult<A::Value> {
        let key = encode_hex(&address.key());
        let raw = self
            .transport
            .request("state_getStorage", json!([key]))
            .await?;
        decode_storage_value(address, &raw)
    }

    /// Stream the decoded value of a storage item, once per change.
    ///
    /// The node sends the current value first, so a new subscription always
    /// delivers at least one value.
    pub async fn subscribe<A>(&self, address: A) -> ChainResult<Subscription<A::Value>>
    where
        A: StorageAddress + 'static,
    {
        let key = encode_hex(&address.key());
        let label = address.describe();
        let rpc = self
            .transport
            .subscribe(
                "state_subscribeStorage",
                json!([[key.clone()]]),
                "state_unsubscribeStorage",
            )
            .await?;
        tracing::debug!(item = %label, subscription = %rpc.id(), "Storage subscription opened");

        let handle = SubscriptionHandle::new(label, rpc.cancel_handle());
        let values = stream::unfold(Some((rpc, address, key)), |state| async move {
            let (mut rpc, address, key) = state?;
            loop {
                let Some(notification) = rpc.next().await else {
                    let reason = format!("storage subscription {} ended by transport", rpc.id());
                    return Some((Err(ChainError::Subscription(reason)), None));
                };
                if let Some(value) = decode_change(&address, &key, &notification) {
                    return Some((value, Some((rpc, address, key))));
                }
            }
        });

        Ok(Subscription::new(values.boxed(), handle))
    }

    /// Sign `call` as `origin` and submit it once.
    ///
    /// Returns `Err` for anything that fails before the extrinsic reaches the
    /// node (nonce lookup, encoding, signing). From then on every outcome is
    /// an event; the stream ends after the first terminal one.
    pub async fn submit(
        &self,
        call: &Call,
        origin: &AccountId32,
        options: &TxOptions,
        signer: &dyn Signer,
    ) -> ChainResult<Subscription<TxEvent>> {
        let nonce = self.account_next_index(origin).await?;
        let (era, checkpoint) = if options.mortality == 0 {
            (Era::Immortal, self.genesis_hash)
        } else {
            let (hash, number) = self.finalized_head().await?;
            let era = Era::mortal(options.mortality, number);
            let birth = era.birth(number);
            let checkpoint = if birth == number {
                hash
            } else {
                self.block_hash(birth).await?
            };
            (era, checkpoint)
        };

        let params = ExtrinsicParams {
            spec_version: self.runtime.spec_version,
            transaction_version: self.runtime.transaction_version,
            genesis_hash: self.genesis_hash,
            nonce,
            era,
            checkpoint,
            tip: options.tip,
            fee_asset: options.fee_asset.clone(),
        };
        let extra = encode_signed_extensions(&self.metadata, &params)?;
        let payload = signer_payload(call, &extra);
        let signature = signer.sign(origin, &payload).await?;
        let encoded = assemble(&self.metadata, origin, &signature, &extra, call)?;
        let tx_hash = extrinsic_hash(&encoded);

        tracing::info!(
            call = %call.label(),
            origin = %self.ss58.encode(origin),
            nonce,
            tx_hash = %tx_hash,
            "Submitting extrinsic"
        );

        let signed = stream::once(async move { Ok::<_, ChainError>(TxEvent::Signed { tx_hash }) });

        match self
            .transport
            .subscribe(
                "author_submitAndWatchExtrinsic",
                json!([encode_hex(&encoded)]),
                "author_unwatchExtrinsic",
            )
            .await
        {
            Ok(rpc) => {
                let handle = SubscriptionHandle::new(format!("tx {tx_hash}"), rpc.cancel_handle());
                let watch = TxWatch {
                    rpc,
                    transport: self.transport.clone(),
                    metadata: self.metadata.clone(),
                    tx_hash,
                    included: None,
                };
                let events = stream::unfold(Some(watch), |state| async move {
                    let mut watch = state?;
                    let event = watch.next_event().await;
                    let next = (!event.is_terminal()).then_some(watch);
                    Some((Ok::<_, ChainError>(event), next))
                });
                Ok(Subscription::new(signed.chain(events).boxed(), handle))
            }
            Err(e) => {
                tracing::warn!(tx_hash = %tx_hash, error = %e.reason(), "Extrinsic rejected");
                let failure = match e {
                    RpcError::Call { .. } => TxFailure::Submission(e.reason()),
                    other => TxFailure::Subscription(other.reason()),
                };
                let rejected =
                    stream::once(async move { Ok::<_, ChainError>(TxEvent::Failed(failure)) });
                let handle = SubscriptionHandle::new(format!("tx {tx_hash}"), CancelHandle::noop());
                Ok(Subscription::new(signed.chain(rejected).boxed(), handle))
            }
        }
    }
}

/// State of one watched extrinsic.
struct TxWatch {
    rpc: RpcSubscription,
    transport: Arc<dyn Transport>,
    metadata: Arc<Metadata>,
    tx_hash: H256,
    /// Block and index of the last successful inclusion.
    included: Option<(H256, u32)>,
}

impl TxWatch {
    async fn next_event(&mut self) -> TxEvent {
        loop {
            let Some(status) = self.rpc.next().await else {
                return TxEvent::Failed(TxFailure::Subscription(format!(
                    "status stream of {} ended before finality",
                    self.tx_hash
                )));
            };
            tracing::debug!(tx_hash = %self.tx_hash, status = %status, "Transaction status");
            if let Some(event) = self.map_status(&status).await {
                return event;
            }
        }
    }

    async fn map_status(&mut self, status: &Value) -> Option<TxEvent> {
        if let Some(name) = status.as_str() {
            return match name {
                "future" => None,
                "ready" => Some(TxEvent::Ready),
                "dropped" | "invalid" => Some(TxEvent::Failed(TxFailure::Submission(format!(
                    "transaction {name}"
                )))),
                other => {
                    tracing::warn!(status = %other, "Unknown transaction status");
                    None
                }
            };
        }

        let (name, detail) = status.as_object()?.iter().next()?;
        match name.as_str() {
            "broadcast" => Some(TxEvent::Broadcast {
                peers: detail.as_array().map_or(0, Vec::len),
            }),
            "inBlock" => {
                let block_hash = parse_hash(detail.clone()).ok()?;
                Some(match self.inclusion(block_hash).await {
                    Ok(extrinsic_index) => TxEvent::InBlock {
                        block_hash,
                        extrinsic_index,
                    },
                    Err(failure) => TxEvent::Failed(failure),
                })
            }
            "retracted" => {
                self.included = None;
                Some(TxEvent::Retracted {
                    block_hash: parse_hash(detail.clone()).ok()?,
                })
            }
            "finalized" => {
                let block_hash = parse_hash(detail.clone()).ok()?;
                let known = self
                    .included
                    .filter(|(hash, _)| *hash == block_hash)
                    .map(|(_, index)| index);
                let index = match known {
                    Some(index) => Ok(index),
                    None => self.inclusion(block_hash).await,
                };
                Some(match index {
                    Ok(extrinsic_index) => TxEvent::Finalized {
                        block_hash,
                        extrinsic_index,
                    },
                    Err(failure) => TxEvent::Failed(failure),
                })
            }
            "usurped" => Some(TxEvent::Failed(TxFailure::Submission(format!(
                "usurped by {detail}"
            )))),
            "finalityTimeout" => Some(TxEvent::Failed(TxFailure::Submission(format!(
                "finality timeout in block {detail}"
            )))),
            other => {
                tracing::warn!(status = %other, "Unknown transaction status");
                None
            }
        }
    }

    /// Locate the extrinsic in `block_hash` and check its dispatch outcome.
    async fn inclusion(&mut self, block_hash: H256) -> Result<u32, TxFailure> {
        let lookup = read_outcome(&*self.transport, &self.metadata, block_hash, self.tx_hash).await;
        match lookup {
            Ok((index, DispatchOutcome::Success)) => {
                self.included = Some((block_hash, index));
                Ok(index)
            }
            Ok((index, DispatchOutcome::Failed(reason))) => {
                tracing::warn!(
                    tx_hash = %self.tx_hash,
                    block = %block_hash,
                    extrinsic_index = index,
                    reason = %reason,
                    "Extrinsic dispatch failed"
                );
                Err(TxFailure::Inclusion { block_hash, reason })
            }
            Err(e) => Err(TxFailure::Subscription(format!(
                "cannot read outcome from block {block_hash}: {e}"
            ))),
        }
    }
}

async fn read_outcome(
    transport: &dyn Transport,
    metadata: &Metadata,
    block_hash: H256,
    tx_hash: H256,
) -> ChainResult<(u32, DispatchOutcome)> {
    let block = transport
        .request("chain_getBlock", json!([block_hash.to_hex()]))
        .await?;
    let extrinsics = block
        .pointer("/block/extrinsics")
        .and_then(Value::as_array)
        .ok_or_else(|| ChainError::Decode(format!("block {block_hash} has no extrinsics")))?;

    let mut index = None;
    for (i, xt) in extrinsics.iter().enumerate() {
        if extrinsic_hash(&decode_hex(as_str(xt)?)?) == tx_hash {
            index = Some(i as u32);
            break;
        }
    }
    let index = index.ok_or_else(|| {
        ChainError::Decode(format!("extrinsic {tx_hash} not found in block {block_hash}"))
    })?;

    let raw_events = transport
        .request(
            "state_getStorage",
            json!([encode_hex(&system_events_key()), block_hash.to_hex()]),
        )
        .await?;
    let events = match raw_events {
        Value::Null => Vec::new(),
        other => metadata.decode_events(&decode_hex(as_str(&other)?)?)?,
    };

    let outcome = metadata.dispatch_outcome(&events, index).unwrap_or_else(|| {
        tracing::warn!(block = %block_hash, extrinsic_index = index, "No dispatch event found");
        DispatchOutcome::Success
    });
    Ok((index, outcome))
}

fn decode_storage_value<A: StorageAddress>(address: &A, raw: &Value) -> ChainResult<A::Value> {
    match raw {
        Value::Null => address.decode(None),
        Value::String(s) => address.decode(Some(decode_hex(s)?.as_slice())),
        other => Err(ChainError::Decode(format!(
            "unexpected storage value for {}: {other}",
            address.describe()
        ))),
    }
}

/// Decode our key's entry from a `state_storage` notification, if present.
fn decode_change<A: StorageAddress>(
    address: &A,
    key: &str,
    notification: &Value,
) -> Option<ChainResult<A::Value>> {
    let Some(changes) = notification.get("changes").and_then(Value::as_array) else {
        return Some(Err(ChainError::Decode(format!(
            "malformed storage notification: {notification}"
        ))));
    };
    changes.iter().find_map(|change| {
        let entry_key = change.get(0).and_then(Value::as_str)?;
        if !entry_key.eq_ignore_ascii_case(key) {
            return None;
        }
        let value = change.get(1).unwrap_or(&Value::Null);
        Some(decode_storage_value(address, value))
    })
}

fn as_str(value: &Value) -> ChainResult<&str> {
    value
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("expected hex string, got {value}")))
}

fn parse_hash(value: Value) -> ChainResult<H256> {
    H256::from_hex(as_str(&value)?)
}
