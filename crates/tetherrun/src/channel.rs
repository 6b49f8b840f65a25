//! In-process duplex transport over paired unbounded channels.
//!
//! This is the local-host IPC link: two endpoints in one process, each seeing
//! the other's sends as its own receives. It is the transport the registry
//! hands out on connect, and the one the test suite drives.

use std::sync::Mutex as StdMutex;

use tokio::sync::Mutex;
use tokio::sync::mpsc;

use crate::transport;
use crate::transport::Transport;
use crate::transport::TransportError;

/// One endpoint of an in-process duplex link.
///
/// Messages sent on one endpoint of a [`ChannelTransport::pair`] appear on the
/// other endpoint's `recv`, and vice versa. Dropping or closing an endpoint
/// ends the stream for its peer.
pub struct ChannelTransport {
    /// `None` once closed; senders are never resurrected.
    tx: StdMutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl ChannelTransport {
    /// Creates a pair of endpoints connected to each other.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();

        let a = Self {
            tx: StdMutex::new(Some(tx_a)),
            rx: Mutex::new(rx_b),
        };
        let b = Self {
            tx: StdMutex::new(Some(tx_b)),
            rx: Mutex::new(rx_a),
        };
        (a, b)
    }
}

#[async_trait::async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        let tx = self
            .tx
            .lock()
            .expect("transport sender lock poisoned")
            .clone();
        match tx {
            Some(tx) => tx
                .send(payload.to_vec())
                .map_err(|_| TransportError::ConnectionLost("Peer receiver dropped".into())),
            None => Err(TransportError::ConnectionLost("Endpoint closed".into())),
        }
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await)
    }

    fn close(&self) {
        self.tx.lock().expect("transport sender lock poisoned").take();
    }
}
