//! One-shot envelopes and their reply plumbing.
//!
//! A [`Message`] is a small bag of named integer/string fields. The sender
//! fires it at a bound service and moves on; if it wants an answer, it tags
//! the envelope with a [`Mailbox`] so the service can push exactly one reply
//! envelope back. Replies ride the same link as everything else and are
//! routed to the mailbox by token on arrival.
//!
//! Delivery is best effort in both directions: a reply to a mailbox that no
//! longer exists is dropped, and the dropper has no one to tell.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use tetherrpc::PostEncoder;
use tetherrpc::Value;

use crate::transport::Transport;

/// An asynchronous envelope: named fields plus an optional reply token.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    fields: Vec<(String, Value)>,
    reply_to: Option<u64>,
}

impl Message {
    /// Creates an empty envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an integer field.
    pub fn with_int(mut self, key: impl Into<String>, value: i64) -> Self {
        self.fields.push((key.into(), Value::I64(value)));
        self
    }

    /// Adds a string field.
    pub fn with_str(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), Value::Str(value.into())));
        self
    }

    /// Tags the envelope with a mailbox for the reply.
    pub fn reply_to(mut self, mailbox: &Mailbox) -> Self {
        self.reply_to = Some(mailbox.token());
        self
    }

    /// Reads an integer field by name.
    pub fn int(&self, key: &str) -> Option<i64> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_i64())
    }

    /// Reads a string field by name.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_str())
    }

    /// All fields, in insertion order.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub(crate) fn reply_token(&self) -> Option<u64> {
        self.reply_to
    }

    pub(crate) fn from_fields(fields: Vec<(String, Value)>) -> Self {
        Self { fields, reply_to: None }
    }
}

/// The receiving end of a reply route, owned by the sender.
///
/// Created from a connection; its token travels on outbound envelopes so the
/// service knows where replies should land.
pub struct Mailbox {
    token: u64,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Mailbox {
    pub(crate) fn new(token: u64, rx: mpsc::UnboundedReceiver<Message>) -> Self {
        Self { token, rx }
    }

    /// The routing token carried by envelopes that reply here.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Receives the next envelope routed to this mailbox.
    ///
    /// Returns `None` once the owning connection is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

/// A service-side handle for pushing one reply envelope back to a sender.
///
/// Consumed by [`send`](ReplyAddress::send): one message in, at most one
/// message out. For a durable push handle, see [`ReplyAddress::peer`].
pub struct ReplyAddress {
    transport: Arc<dyn Transport>,
    token: u64,
}

impl ReplyAddress {
    pub(crate) fn new(transport: Arc<dyn Transport>, token: u64) -> Self {
        Self { transport, token }
    }

    /// Pushes the reply envelope, consuming the address.
    ///
    /// Fire and forget: if the link or the mailbox is gone, the reply
    /// evaporates without an error surfacing anywhere.
    pub fn send(self, message: Message) {
        post_envelope(self.transport, self.token, message);
    }

    /// A durable push handle to the same mailbox.
    ///
    /// A service that wants to notify this sender later (beyond the single
    /// reply) keeps one of these — the moral equivalent of holding on to a
    /// registered callback.
    pub fn peer(&self) -> Peer {
        Peer {
            transport: self.transport.clone(),
            token: self.token,
        }
    }
}

/// A durable, best-effort push handle to one client's mailbox.
#[derive(Clone)]
pub struct Peer {
    transport: Arc<dyn Transport>,
    token: u64,
}

impl Peer {
    /// Pushes an unsolicited envelope to the client's mailbox, best effort.
    pub fn post(&self, message: Message) {
        post_envelope(self.transport.clone(), self.token, message);
    }
}

/// Encode and send a Post frame on its own task; failures are swallowed.
fn post_envelope(transport: Arc<dyn Transport>, token: u64, message: Message) {
    let mut enc = tetherpack::Encoder::new();
    let encoded = PostEncoder::new(Some(token), message.fields())
        .encode(&mut enc)
        .and_then(|_| enc.into_bytes().map_err(tetherrpc::Error::from));

    match encoded {
        Ok(payload) => {
            tokio::spawn(async move {
                if transport.send(&payload).await.is_err() {
                    debug!(token, "Reply envelope dropped: link gone");
                }
            });
        }
        Err(e) => {
            debug!(token, error = %e, "Reply envelope dropped: encode failed");
        }
    }
}
