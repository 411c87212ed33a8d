use tokio::sync::oneshot;
use tracing::debug;

use super::types::PairReply;

/// Send-once handle to the waiting HTTP caller.
///
/// The sender is consumed by the first `send`; later calls are no-ops that
/// return `false`. A second response cannot be written.
#[derive(Debug)]
pub struct ResponseSlot {
    sender: Option<oneshot::Sender<PairReply>>,
}

impl ResponseSlot {
    pub fn channel() -> (Self, oneshot::Receiver<PairReply>) {
        let (tx, rx) = oneshot::channel();
        (Self { sender: Some(tx) }, rx)
    }

    /// Returns `true` if this call delivered the reply.
    pub fn send(&mut self, reply: PairReply) -> bool {
        match self.sender.take() {
            Some(sender) => sender.send(reply).is_ok(),
            None => {
                debug!(?reply, "Response already sent, dropping reply");
                false
            }
        }
    }

    pub fn is_sent(&self) -> bool {
        self.sender.is_none()
    }
}
