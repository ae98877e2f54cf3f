use crate::common::entity::PortId;
use crate::packet::entity::{EthernetFrame, FlowMatch};

/// What the forwarding pipeline did with a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardAction {
    /// The frame is of a kind the pipeline does not handle (not IPv4
    /// or ARP).
    NotSupported,
    /// Dropped, silently or after a reject decision.
    Drop,
    /// Handled entirely inside the router (ARP traffic, echo requests
    /// addressed to a port).
    Consumed,
    /// Forwarding is blocked on next-hop resolution; the packet will
    /// be emitted or dropped when it completes.
    Paused,
    /// Rewritten and emitted through the given port.
    Forward { out_port: PortId },
}

/// Everything a suspended packet needs to finish forwarding once its
/// next-hop MAC resolves.
///
/// `match_in` keeps the headers as received; `match_out` carries the
/// rewrites accumulated so far (NAT, and finally the MAC swap).
#[derive(Debug, Clone)]
pub struct ForwardInfo {
    pub in_port: PortId,
    pub out_port: PortId,
    pub frame: EthernetFrame,
    pub match_in: FlowMatch,
    pub match_out: FlowMatch,
    /// The address being resolved: the route's gateway, or the packet
    /// destination when the route has none.
    pub next_hop_ip: u32,
}
