//! WebSocket JSON-RPC transport.
//!
//! One socket per transport. A background task owns the socket and the
//! bookkeeping maps; callers talk to it over an unbounded command channel, so
//! no lock is held across an await.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::{RpcError, RpcSubscription, Transport};
use crate::observability::metrics;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SubscribeReply = oneshot::Sender<Result<(String, mpsc::UnboundedReceiver<Value>), RpcError>>;

enum Command {
    Call {
        method: String,
        params: Value,
        reply: oneshot::Sender<Result<Value, RpcError>>,
    },
    Subscribe {
        method: String,
        params: Value,
        unsubscribe_method: String,
        reply: SubscribeReply,
    },
    Unsubscribe {
        method: String,
        id: String,
    },
}

/// JSON-RPC over a single WebSocket connection.
#[derive(Clone)]
pub struct WsTransport {
    url: String,
    commands: mpsc::UnboundedSender<Command>,
}

impl WsTransport {
    /// Open the socket and start the I/O task.
    pub async fn connect(url: &str) -> Result<Self, RpcError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| RpcError::Transport(format!("invalid RPC URL '{url}': {e}")))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(RpcError::Transport(format!(
                "unsupported scheme '{}' in '{url}', expected ws or wss",
                parsed.scheme()
            )));
        }

        let (socket, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| RpcError::Transport(format!("failed to connect to {url}: {e}")))?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(socket, command_rx, url.to_string()));

        tracing::debug!(url = %url, "WebSocket transport connected");
        Ok(Self {
            url: url.to_string(),
            commands,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("url", &self.url)
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        metrics::record_rpc_request(method);
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Call {
                method: method.to_string(),
                params,
                reply,
            })
            .map_err(|_| RpcError::Closed)?;
        response.await.map_err(|_| RpcError::Closed)?
    }

    async fn subscribe(
        &self,
        method: &str,
        params: Value,
        unsubscribe_method: &str,
    ) -> Result<RpcSubscription, RpcError> {
        metrics::record_rpc_request(method);
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Subscribe {
                method: method.to_string(),
                params,
                unsubscribe_method: unsubscribe_method.to_string(),
                reply,
            })
            .map_err(|_| RpcError::Closed)?;
        let (id, notifications) = response.await.map_err(|_| RpcError::Closed)??;

        let commands = self.commands.clone();
        let unsubscribe_method = unsubscribe_method.to_string();
        let sub_id = id.clone();
        Ok(RpcSubscription::new(id, notifications, move || {
            // The task may already be gone; nothing left to release then.
            let _ = commands.send(Command::Unsubscribe {
                method: unsubscribe_method,
                id: sub_id,
            });
        }))
    }
}

enum Pending {
    Call(oneshot::Sender<Result<Value, RpcError>>),
    Subscribe {
        unsubscribe_method: String,
        reply: SubscribeReply,
    },
    Unsubscribe,
}

#[derive(Default)]
struct Router {
    next_id: u64,
    pending: HashMap<u64, Pending>,
    subscriptions: HashMap<String, mpsc::UnboundedSender<Value>>,
}

impl Router {
    /// Record a command and return the frame to send.
    fn register(&mut self, command: Command) -> String {
        self.next_id += 1;
        let id = self.next_id;
        let (method, params) = match command {
            Command::Call {
                method,
                params,
                reply,
            } => {
                self.pending.insert(id, Pending::Call(reply));
                (method, params)
            }
            Command::Subscribe {
                method,
                params,
                unsubscribe_method,
                reply,
            } => {
                self.pending.insert(
                    id,
                    Pending::Subscribe {
                        unsubscribe_method,
                        reply,
                    },
                );
                (method, params)
            }
            Command::Unsubscribe { method, id: sub_id } => {
                self.subscriptions.remove(&sub_id);
                self.pending.insert(id, Pending::Unsubscribe);
                (method, json!([sub_id]))
            }
        };
        request_frame(id, &method, params)
    }

    /// Route an incoming frame. May return a frame to send back.
    fn dispatch(&mut self, text: &str) -> Option<String> {
        let frame: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring non-JSON frame");
                return None;
            }
        };

        if let Some(id) = frame.get("id").and_then(Value::as_u64) {
            return self.complete(id, frame);
        }

        let params = frame.get("params")?;
        let key = params.get("subscription").and_then(subscription_key)?;
        let result = params.get("result").cloned().unwrap_or(Value::Null);
        if let Some(sender) = self.subscriptions.get(&key) {
            if sender.send(result).is_err() {
                self.subscriptions.remove(&key);
            }
        } else {
            tracing::trace!(subscription = %key, "Notification for unknown subscription");
        }
        None
    }

    fn complete(&mut self, id: u64, mut frame: Value) -> Option<String> {
        let pending = self.pending.remove(&id)?;
        let outcome = match frame.get_mut("error").map(Value::take) {
            Some(error) => Err(call_error(error)),
            None => Ok(frame.get_mut("result").map(Value::take).unwrap_or(Value::Null)),
        };

        match pending {
            Pending::Call(reply) => {
                let _ = reply.send(outcome);
                None
            }
            Pending::Unsubscribe => None,
            Pending::Subscribe {
                unsubscribe_method,
                reply,
            } => {
                let sub_id = match outcome {
                    Ok(result) => match subscription_key(&result) {
                        Some(key) => key,
                        None => {
                            let _ = reply.send(Err(RpcError::Malformed(format!(
                                "subscription id is not a string: {result}"
                            ))));
                            return None;
                        }
                    },
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        return None;
                    }
                };

                let (sender, receiver) = mpsc::unbounded_channel();
                self.subscriptions.insert(sub_id.clone(), sender);
                if reply.send(Ok((sub_id.clone(), receiver))).is_err() {
                    // Caller gave up while we waited; release the server side.
                    return Some(self.register(Command::Unsubscribe {
                        method: unsubscribe_method,
                        id: sub_id,
                    }));
                }
                None
            }
        }
    }

    fn fail_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            match pending {
                Pending::Call(reply) => {
                    let _ = reply.send(Err(RpcError::Closed));
                }
                Pending::Subscribe { reply, .. } => {
                    let _ = reply.send(Err(RpcError::Closed));
                }
                Pending::Unsubscribe => {}
            }
        }
        self.subscriptions.clear();
    }
}

async fn run(socket: Socket, mut commands: mpsc::UnboundedReceiver<Command>, url: String) {
    let (mut sink, mut stream) = socket.split();
    let mut router = Router::default();

    loop {
        let outgoing = tokio::select! {
            command = commands.recv() => match command {
                Some(command) => Some(router.register(command)),
                None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => router.dispatch(text.as_str()),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => router.dispatch(text),
                    Err(_) => None,
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::warn!(url = %url, frame = ?frame, "Node closed the connection");
                    break;
                }
                Some(Ok(_)) => None,
                Some(Err(e)) => {
                    tracing::error!(url = %url, error = %e, "WebSocket read failed");
                    break;
                }
                None => break,
            },
        };

        if let Some(frame) = outgoing {
            if let Err(e) = sink.send(Message::text(frame)).await {
                tracing::error!(url = %url, error = %e, "WebSocket write failed");
                break;
            }
        }
    }

    router.fail_all();
    tracing::info!(url = %url, "WebSocket transport stopped");
}

fn request_frame(id: u64, method: &str, params: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
    .to_string()
}

fn call_error(error: Value) -> RpcError {
    RpcError::Call {
        code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
        message: error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string(),
        data: error.get("data").cloned(),
    }
}

fn subscription_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
