use domain::common::entity::PortId;
use domain::common::error::DomainError;
use domain::packet::entity::EthernetFrame;
use ports::secondary::packet_transport_port::PacketTransportPort;
use tokio::sync::mpsc;

/// Transport that hands emitted frames to an mpsc consumer, typically
/// the datapath writer task.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<(PortId, EthernetFrame)>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(PortId, EthernetFrame)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PacketTransportPort for ChannelTransport {
    fn emit(&self, port: &PortId, frame: EthernetFrame) -> Result<(), DomainError> {
        self.tx
            .send((port.clone(), frame))
            .map_err(|_| DomainError::Transport(format!("datapath channel closed ({port})")))
    }
}
