use super::outbound::Outbound;
use crate::error::SessionError;
use crate::messages::{HeartbeatKind, RpcRequest};
use log::{debug, trace};

/// Liveness probes.
///
/// The server is asked for heartbeats every `interval_secs`, and
/// independently a local timer sends `public/test`. A server `test_request`
/// is answered with a probe right away.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval_secs: u64,
}

impl HeartbeatMonitor {
    pub fn new(interval_secs: u64) -> Self {
        Self { interval_secs }
    }

    /// Ask the server to start heartbeats
    pub fn configure(&self, outbound: &Outbound) -> Result<(), SessionError> {
        outbound.send(&RpcRequest::set_heartbeat(self.interval_secs))
    }

    pub fn probe(&self, outbound: &Outbound) -> Result<(), SessionError> {
        outbound.send(&RpcRequest::test())
    }

    pub fn on_heartbeat(&self, kind: HeartbeatKind, outbound: &Outbound) -> Result<(), SessionError> {
        match kind {
            HeartbeatKind::TestRequest => {
                debug!("Server test_request, answering");
                self.probe(outbound)
            }
            HeartbeatKind::Heartbeat | HeartbeatKind::Other => {
                trace!("Server heartbeat");
                Ok(())
            }
        }
    }
}
