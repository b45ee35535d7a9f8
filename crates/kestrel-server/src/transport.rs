use kestrel_core::Address;

/// Outbound delivery of encoded consensus messages.
///
/// `send` is called from the consensus task and must not block; network
/// implementations hand the payload to a background task.
pub trait Transport: Send + Sync {
    fn send(&self, targets: &[Address], payload: Vec<u8>);
}

/// Transport for a node that has no peers
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransport;

impl Transport for NoopTransport {
    fn send(&self, _targets: &[Address], _payload: Vec<u8>) {}
}
