//! In-process channel transport.
//!
//! Connects a bridge to a foreign runtime served on another thread. Requests
//! travel over an unbounded `tokio::sync::mpsc` channel; each carries a
//! `oneshot` sender for its reply, so replies can never be misrouted.
//!
//! Both ends block with `blocking_recv` and must not be driven from inside an
//! async runtime worker thread.

use tokio::sync::mpsc;
use tokio::sync::oneshot;

use crate::transport;
use crate::transport::Transport;
use crate::transport::TransportError;

/// One request waiting for the serving side.
pub struct Request {
    payload: Vec<u8>,
    reply: oneshot::Sender<Vec<u8>>,
}

impl Request {
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Sends the reply. Returns `false` if the caller has gone away.
    pub fn respond(self, bytes: Vec<u8>) -> bool {
        self.reply.send(bytes).is_ok()
    }
}

/// The calling side of the channel.
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Request>,
}

/// The serving side of the channel.
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Request>,
}

/// Creates a connected transport/inbox pair.
pub fn channel() -> (ChannelTransport, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelTransport { tx }, Inbox { rx })
}

impl Transport for ChannelTransport {
    fn call(&self, payload: &[u8]) -> transport::Result<Vec<u8>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request { payload: payload.to_vec(), reply })
            .map_err(|_| TransportError::ConnectionLost("inbox closed".into()))?;
        rx.blocking_recv()
            .map_err(|_| TransportError::ConnectionLost("request dropped without a reply".into()))
    }
}

impl Inbox {
    /// Blocks for the next request; `None` once every transport is dropped.
    pub fn recv(&mut self) -> Option<Request> {
        self.rx.blocking_recv()
    }

    /// Answers requests until every transport is dropped.
    ///
    /// A handler error drops the request unanswered, which the caller observes
    /// as a lost connection.
    pub fn serve<F>(mut self, handler: F)
    where
        F: Fn(&[u8]) -> transport::Result<Vec<u8>>,
    {
        while let Some(request) = self.recv() {
            match handler(request.payload()) {
                Ok(bytes) => {
                    if !request.respond(bytes) {
                        tracing::debug!("caller went away before the reply was sent");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "dropping request"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_over_channel() {
        let (transport, inbox) = channel();
        let server = std::thread::spawn(move || inbox.serve(|bytes| Ok(bytes.iter().rev().copied().collect())));

        assert_eq!(transport.call(&[1, 2, 3]), Ok(vec![3, 2, 1]));

        drop(transport);
        server.join().unwrap();
    }

    #[test]
    fn test_closed_inbox_is_connection_lost() {
        let (transport, inbox) = channel();
        drop(inbox);
        assert!(matches!(transport.call(&[0]), Err(TransportError::ConnectionLost(_))));
    }

    #[test]
    fn test_handler_error_surfaces_as_connection_lost() {
        let (transport, inbox) = channel();
        let server = std::thread::spawn(move || inbox.serve(|_| Err(TransportError::Io("boom".into()))));

        assert!(matches!(transport.call(&[0]), Err(TransportError::ConnectionLost(_))));

        drop(transport);
        server.join().unwrap();
    }
}
