use domain::common::entity::PortId;
use domain::common::error::DomainError;
use domain::packet::entity::EthernetFrame;
use domain::pipeline::entity::ForwardAction;

/// Primary port: the forwarding plane as seen by whatever feeds it
/// frames (a datapath shim, a test harness).
///
/// Implemented by the router service in the application layer.
pub trait PacketProcessorPort: Send + Sync {
    /// Run one received frame through the pipeline.
    ///
    /// A `Paused` result means the packet is parked on next-hop
    /// resolution; it will be emitted through the packet transport or
    /// silently dropped when resolution completes.
    fn process(&self, in_port: &PortId, frame: EthernetFrame) -> Result<ForwardAction, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_processor_port_is_object_safe() {
        fn _check(port: &dyn PacketProcessorPort) {
            let _ = port;
        }
    }
}
