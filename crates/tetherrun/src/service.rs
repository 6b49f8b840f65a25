//! # Server-side dispatch
//!
//! A [`Service`] is the two-sided contract's server half: a dispatcher that
//! pattern-matches operation names for the RPC channel, plus a handler for
//! one-shot envelopes on the messenger channel. No code generation; the trait
//! is the interface description.
//!
//! Each accepted client gets its own service loop over its own link, so one
//! handler invocation runs at a time per connection while independent
//! connections proceed concurrently.

use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use tetherpack::Decoder;
use tetherpack::Encoder;
use tetherrpc::FailureReason;
use tetherrpc::ReplyErrEncoder;
use tetherrpc::ReplyOkEncoder;
use tetherrpc::RpcFrame;
use tetherrpc::Value;
use tetherrpc::decode_seq;

use crate::message::Message;
use crate::message::ReplyAddress;
use crate::transport::Transport;

/// A named service's handler set.
///
/// Both methods have lenient defaults so a service can speak only the channel
/// it cares about: unknown calls fail with `MethodNotFound`, and unwanted
/// envelopes are dropped on the floor.
#[async_trait::async_trait]
pub trait Service: Send + Sync + 'static {
    /// Dispatches one synchronous call.
    ///
    /// The returned value rides back to the caller as the Reply; a
    /// `FailureReason` rides back as a structured remote failure.
    async fn call(
        &self,
        method: &str,
        args: &[Value],
    ) -> std::result::Result<Value, FailureReason> {
        let _ = args;
        debug!(method, "Unhandled call");
        Err(FailureReason::MethodNotFound)
    }

    /// Handles one messenger envelope.
    ///
    /// If the sender attached a reply address, the service may push exactly
    /// one reply envelope through it — or not reply at all.
    fn deliver(&self, message: Message, reply: Option<ReplyAddress>) {
        let _ = (message, reply);
    }
}

/// Per-client service loop: reads frames off the link until the client goes
/// away, dispatching each to the service.
pub(crate) async fn serve(transport: Arc<dyn Transport>, service: Arc<dyn Service>) {
    loop {
        match transport.recv().await {
            Ok(Some(payload)) => handle_frame(&transport, service.as_ref(), &payload).await,
            Ok(None) => {
                debug!("Client closed the link");
                break;
            }
            Err(e) => {
                debug!(error = %e, "Link failed");
                break;
            }
        }
    }
    transport.close();
}

async fn handle_frame(transport: &Arc<dyn Transport>, service: &dyn Service, payload: &[u8]) {
    let mut dec = Decoder::new(payload);
    match RpcFrame::decode(&mut dec) {
        Ok(RpcFrame::Call(call)) => {
            let seq = call.seq;
            let mut enc = Encoder::new();
            let encoded = match service.call(call.method, &call.args).await {
                Ok(value) => ReplyOkEncoder::new(seq, &value).encode(&mut enc),
                Err(reason) => {
                    debug!(method = call.method, ?reason, "Call failed");
                    ReplyErrEncoder::new(seq, reason).encode(&mut enc)
                }
            };
            let reply = encoded.and_then(|_| enc.into_bytes().map_err(tetherrpc::Error::from));
            match reply {
                Ok(bytes) => {
                    if transport.send(&bytes).await.is_err() {
                        debug!(seq, "Reply dropped: client gone");
                    }
                }
                Err(e) => warn!(seq, error = %e, "Reply encode failed"),
            }
        }
        Ok(RpcFrame::Post(post)) => {
            let reply = post
                .token
                .map(|token| ReplyAddress::new(transport.clone(), token));
            service.deliver(Message::from_fields(post.fields), reply);
        }
        Ok(RpcFrame::Reply(_)) => warn!("Service received a Reply frame"),
        Err(e) => {
            warn!(error = %e, "Undecodable frame");
            // If a sequence number is salvageable, answer with a correlated
            // failure so the caller is not left waiting on a frame we threw
            // away.
            if let Ok(seq) = decode_seq(payload) {
                let mut enc = Encoder::new();
                let encoded = ReplyErrEncoder::new(seq, FailureReason::InvalidArgument)
                    .encode(&mut enc)
                    .and_then(|_| enc.into_bytes().map_err(tetherrpc::Error::from));
                if let Ok(bytes) = encoded {
                    let _ = transport.send(&bytes).await;
                }
            }
        }
    }
}
