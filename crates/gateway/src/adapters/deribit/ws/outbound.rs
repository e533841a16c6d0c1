use crate::error::SessionError;
use crate::messages::RpcRequest;
use arc_swap::ArcSwapOption;
use log::trace;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Write half of the current socket.
///
/// Sends never block: frames are queued to the socket writer task. Swapped
/// on every reconnect, empty while no socket is open.
#[derive(Debug, Default)]
pub struct Outbound {
    tx: ArcSwapOption<mpsc::UnboundedSender<String>>,
}

impl Outbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, tx: mpsc::UnboundedSender<String>) {
        self.tx.store(Some(Arc::new(tx)));
    }

    /// Drop the writer queue; the writer task closes the socket once drained
    pub fn detach(&self) {
        self.tx.store(None);
    }

    pub fn is_attached(&self) -> bool {
        self.tx.load_full().is_some_and(|tx| !tx.is_closed())
    }

    pub fn send(&self, request: &RpcRequest) -> Result<(), SessionError> {
        let text = serde_json::to_string(request)?;
        let tx = self.tx.load_full().ok_or(SessionError::NotConnected)?;
        tx.send(text).map_err(|_| SessionError::NotConnected)?;
        trace!("Sent {} (id {})", request.method, request.id);
        Ok(())
    }
}
