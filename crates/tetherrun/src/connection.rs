//! # Connection lifecycle and the client-side channels
//!
//! A [`Connection`] is one client's binding to one named service. Binding is
//! inherently asynchronous: `connect` returns immediately in `Binding` state,
//! and the outcome arrives on the connection's event channel. From `Bound`,
//! two channels operate over the same link:
//!
//! - **RPC**: [`Connection::call`] blocks the calling task until the service
//!   replies or the link drops. One call in flight per connection.
//! - **Messenger**: [`Connection::post`] fires an envelope and returns on
//!   handoff; replies and pushes land in [`Mailbox`]es.
//!
//! A pump task demultiplexes inbound frames: Reply frames are matched to
//! their pending call by sequence number, Post frames are routed to mailboxes
//! by token.
//!
//! ## Invariants
//!
//! - The link handle exists only while `Bound`; any operation outside `Bound`
//!   fails with `NotConnected` immediately, never by blocking.
//! - `Disconnected` is emitted at most once, and only for peer-side loss.
//!   After `disconnect` returns, no further events fire.
//! - An in-flight call never outlives the connection: teardown drains every
//!   pending call with `ConnectionLost`.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::warn;

use tetherpack::Decoder;
use tetherpack::Encoder;
use tetherrpc::CallEncoder;
use tetherrpc::PostEncoder;
use tetherrpc::RpcFrame;
use tetherrpc::Value;

use crate::error::Error;
use crate::error::Result;
use crate::message::Mailbox;
use crate::message::Message;
use crate::registry::Registry;
use crate::registry::ServiceName;
use crate::transport::Transport;

/// The binding state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindState {
    /// No link; the terminal state after a client-side disconnect.
    Unbound,
    /// `connect` has been issued; the outcome is not yet known.
    Binding,
    /// A live link exists; calls and posts are possible.
    Bound,
    /// A client-side disconnect is in progress.
    Unbinding,
    /// The peer went away, or binding failed. Terminal.
    Disconnected,
}

/// Lifecycle events, delivered in order on the connection's event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnEvent {
    /// The service accepted the binding; the connection is `Bound`.
    Connected(ServiceName),
    /// The peer went away, or binding failed. At most one per connection.
    Disconnected(ServiceName),
}

/// The receiving end of a connection's lifecycle events.
pub struct ConnEvents {
    rx: mpsc::UnboundedReceiver<ConnEvent>,
}

impl ConnEvents {
    /// Receives the next lifecycle event.
    ///
    /// Returns `None` once no further events can ever fire.
    pub async fn recv(&mut self) -> Option<ConnEvent> {
        self.rx.recv().await
    }
}

/// State guarded by one lock so transitions and event emission are atomic
/// with respect to concurrent call attempts.
struct StateCell {
    state: BindState,
    /// Present only while `Bound`.
    transport: Option<Arc<dyn Transport>>,
    /// Dropped on teardown so no event can fire afterwards.
    events: Option<mpsc::UnboundedSender<ConnEvent>>,
}

struct ConnShared {
    name: ServiceName,
    cell: StdMutex<StateCell>,
    /// In-flight calls awaiting their Reply, by sequence number.
    pending: DashMap<u64, oneshot::Sender<Result<Value>>>,
    /// Open mailboxes, by routing token.
    routes: DashMap<u64, mpsc::UnboundedSender<Message>>,
    next_seq: AtomicU64,
    next_token: AtomicU64,
    /// Serializes calls: at most one outstanding RPC per connection.
    call_gate: Mutex<()>,
}

impl ConnShared {
    fn lock_cell(&self) -> std::sync::MutexGuard<'_, StateCell> {
        self.cell.lock().expect("connection state lock poisoned")
    }

    /// Binding task succeeded. Returns false if the client already gave up.
    fn complete_bind(&self, transport: Arc<dyn Transport>) -> bool {
        let mut cell = self.lock_cell();
        if cell.state != BindState::Binding {
            return false;
        }
        cell.state = BindState::Bound;
        cell.transport = Some(transport);
        if let Some(events) = &cell.events {
            let _ = events.send(ConnEvent::Connected(self.name.clone()));
        }
        debug!(service = %self.name, "Bound");
        true
    }

    /// Binding task failed: the name did not resolve or the endpoint refused.
    fn fail_bind(&self) {
        let mut cell = self.lock_cell();
        if cell.state != BindState::Binding {
            return;
        }
        cell.state = BindState::Disconnected;
        if let Some(events) = cell.events.take() {
            let _ = events.send(ConnEvent::Disconnected(self.name.clone()));
        }
        debug!(service = %self.name, "Binding failed");
    }

    /// The peer vanished. Emits `Disconnected` at most once and fails every
    /// in-flight call.
    fn connection_lost(&self) {
        {
            let mut cell = self.lock_cell();
            if cell.state == BindState::Bound {
                cell.state = BindState::Disconnected;
                cell.transport = None;
                if let Some(events) = cell.events.take() {
                    let _ = events.send(ConnEvent::Disconnected(self.name.clone()));
                }
                debug!(service = %self.name, "Peer disconnected");
            }
        }
        self.drain_pending();
    }

    fn drain_pending(&self) {
        let seqs: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for seq in seqs {
            if let Some((_, tx)) = self.pending.remove(&seq) {
                let _ = tx.send(Err(Error::ConnectionLost));
            }
        }
    }

    fn bound_transport(&self) -> Result<Arc<dyn Transport>> {
        let cell = self.lock_cell();
        match (cell.state, &cell.transport) {
            (BindState::Bound, Some(transport)) => Ok(transport.clone()),
            _ => Err(Error::NotConnected),
        }
    }

    /// Routes one inbound frame to its pending call or mailbox.
    fn route_inbound(&self, payload: &[u8]) {
        let mut dec = Decoder::new(payload);
        match RpcFrame::decode(&mut dec) {
            Ok(RpcFrame::Reply(reply)) => {
                let Some((_, tx)) = self.pending.remove(&reply.seq) else {
                    // Duplicate or very late; the caller is long gone.
                    debug!(seq = reply.seq, "Reply with no pending call");
                    return;
                };
                let _ = tx.send(reply.status.map_err(Error::Remote));
            }
            Ok(RpcFrame::Post(post)) => {
                let Some(token) = post.token else {
                    warn!("Inbound envelope without a token");
                    return;
                };
                let delivered = match self.routes.get(&token) {
                    Some(route) => route.send(Message::from_fields(post.fields)).is_ok(),
                    None => {
                        debug!(token, "Envelope dropped: no such mailbox");
                        return;
                    }
                };
                if !delivered {
                    self.routes.remove(&token);
                    debug!(token, "Envelope dropped: mailbox closed");
                }
            }
            Ok(RpcFrame::Call(_)) => warn!(service = %self.name, "Client received a Call frame"),
            Err(e) => warn!(service = %self.name, error = %e, "Undecodable frame dropped"),
        }
    }
}

/// Reads frames off the link until it drops, then tears the connection down.
async fn pump(shared: Arc<ConnShared>, transport: Arc<dyn Transport>) {
    loop {
        match transport.recv().await {
            Ok(Some(payload)) => shared.route_inbound(&payload),
            Ok(None) => {
                debug!(service = %shared.name, "Link closed by peer");
                break;
            }
            Err(e) => {
                debug!(service = %shared.name, error = %e, "Link failed");
                break;
            }
        }
    }
    shared.connection_lost();
}

/// Initiates binding. Used through [`Registry::connect`].
pub(crate) fn connect(registry: Registry, name: ServiceName) -> (Connection, ConnEvents) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(ConnShared {
        name,
        cell: StdMutex::new(StateCell {
            state: BindState::Binding,
            transport: None,
            events: Some(events_tx),
        }),
        pending: DashMap::new(),
        routes: DashMap::new(),
        next_seq: AtomicU64::new(1),
        next_token: AtomicU64::new(1),
        call_gate: Mutex::new(()),
    });

    let binder = shared.clone();
    tokio::spawn(async move {
        let opened = registry
            .resolve(binder.name.as_str())
            .and_then(|endpoint| endpoint.open());
        match opened {
            Ok(transport) => {
                if binder.complete_bind(transport.clone()) {
                    pump(binder, transport).await;
                } else {
                    // The client disconnected while we were binding.
                    transport.close();
                }
            }
            Err(e) => {
                debug!(service = %binder.name, error = %e, "Bind refused");
                binder.fail_bind();
            }
        }
    });

    (Connection { shared }, ConnEvents { rx: events_rx })
}

/// One client's binding to one named service.
///
/// Owned by the client that created it; dropping it disconnects.
pub struct Connection {
    shared: Arc<ConnShared>,
}

impl Connection {
    /// The service this connection targets.
    pub fn service(&self) -> &ServiceName {
        &self.shared.name
    }

    /// The current binding state.
    pub fn state(&self) -> BindState {
        self.shared.lock_cell().state
    }

    /// Invokes a named operation and blocks until the reply or the link drops.
    ///
    /// Calls on one connection are strictly sequential: a second call waits
    /// for the first to complete.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if the connection is not `Bound`.
    /// - `Remote` if the service's handler reported a failure.
    /// - `ConnectionLost` if the peer vanished mid-call or the connection was
    ///   disconnected while the call was in flight.
    pub async fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        // Fail fast outside Bound rather than queueing behind the gate.
        self.shared.bound_transport()?;
        let _slot = self.shared.call_gate.lock().await;

        // Re-check: the state may have changed while we waited for the slot.
        let transport = self.shared.bound_transport()?;
        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);

        let mut enc = Encoder::new();
        CallEncoder::new(seq, method, args).encode(&mut enc)?;
        let payload = enc.into_bytes().map_err(|e| Error::Marshal(e.into()))?;

        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(seq, tx);

        if transport.send(&payload).await.is_err() {
            self.shared.pending.remove(&seq);
            return Err(Error::ConnectionLost);
        }

        match rx.await {
            Ok(result) => result,
            // The sender vanished without a verdict; treat as a dead link.
            Err(_) => {
                self.shared.pending.remove(&seq);
                Err(Error::ConnectionLost)
            }
        }
    }

    /// Fires a one-shot envelope at the service.
    ///
    /// Returns once the envelope is handed to the link, not once it is
    /// processed. Attach a mailbox with [`Message::reply_to`] to receive the
    /// service's reply, if it sends one.
    pub async fn post(&self, message: Message) -> Result<()> {
        let transport = self.shared.bound_transport()?;

        let mut enc = Encoder::new();
        PostEncoder::new(message.reply_token(), message.fields()).encode(&mut enc)?;
        let payload = enc.into_bytes().map_err(|e| Error::Marshal(e.into()))?;

        transport.send(&payload).await.map_err(|_| Error::ConnectionLost)
    }

    /// Opens a mailbox on this connection and registers its reply route.
    pub fn mailbox(&self) -> Mailbox {
        let token = self.shared.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.routes.insert(token, tx);
        Mailbox::new(token, rx)
    }

    /// Tears the binding down: `Unbinding → Unbound`.
    ///
    /// Idempotent. After this returns, no further lifecycle events fire, and
    /// any in-flight call has resolved with `ConnectionLost`.
    pub fn disconnect(&self) {
        let transport = {
            let mut cell = self.shared.lock_cell();
            match cell.state {
                BindState::Bound => {
                    cell.state = BindState::Unbinding;
                    cell.events = None;
                    cell.transport.take()
                }
                BindState::Binding => {
                    cell.state = BindState::Unbound;
                    cell.events = None;
                    None
                }
                _ => return,
            }
        };

        if let Some(transport) = &transport {
            transport.close();
        }
        self.shared.drain_pending();

        let mut cell = self.shared.lock_cell();
        if cell.state == BindState::Unbinding {
            cell.state = BindState::Unbound;
        }
        debug!(service = %self.shared.name, "Unbound");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}
