use domain::common::entity::PortId;
use domain::common::error::DomainError;
use domain::packet::entity::EthernetFrame;

/// Secondary port for emitting frames out of router ports.
///
/// Implemented by the datapath adapters (channel-backed in tests).
pub trait PacketTransportPort: Send + Sync {
    /// Emit a frame on the wire attached to `port`.
    fn emit(&self, port: &PortId, frame: EthernetFrame) -> Result<(), DomainError>;
}
