use std::sync::Mutex;

use domain::common::entity::PortId;
use domain::common::error::DomainError;
use domain::packet::entity::EthernetFrame;
use ports::secondary::packet_transport_port::PacketTransportPort;

/// Transport that captures emitted frames for assertion in tests.
#[derive(Default)]
pub struct RecordingTransport {
    frames: Mutex<Vec<(PortId, EthernetFrame)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything captured so far, in emission order.
    pub fn take(&self) -> Vec<(PortId, EthernetFrame)> {
        match self.frames.lock() {
            Ok(mut frames) => std::mem::take(&mut *frames),
            Err(_) => Vec::new(),
        }
    }

    /// Frames emitted on one port, without draining.
    pub fn frames_for(&self, port: &PortId) -> Vec<EthernetFrame> {
        match self.frames.lock() {
            Ok(frames) => frames
                .iter()
                .filter(|(p, _)| p == port)
                .map(|(_, f)| f.clone())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PacketTransportPort for RecordingTransport {
    fn emit(&self, port: &PortId, frame: EthernetFrame) -> Result<(), DomainError> {
        self.frames
            .lock()
            .map_err(|_| DomainError::Transport("recording transport lock poisoned".into()))?
            .push((port.clone(), frame));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::packet::entity::{FramePayload, Mac};

    #[test]
    fn records_and_drains_in_order() {
        let transport = RecordingTransport::new();
        for ethertype in [1u16, 2, 3] {
            transport
                .emit(
                    &PortId("p0".into()),
                    EthernetFrame {
                        src: Mac::ZERO,
                        dst: Mac::ZERO,
                        payload: FramePayload::Other(ethertype),
                    },
                )
                .unwrap();
        }
        assert_eq!(transport.len(), 3);
        assert_eq!(transport.frames_for(&PortId("p0".into())).len(), 3);
        let taken = transport.take();
        assert!(matches!(taken[0].1.payload, FramePayload::Other(1)));
        assert!(transport.is_empty());
    }
}
