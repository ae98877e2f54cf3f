use serde::{Deserialize, Serialize};

use crate::common::entity::Protocol;

/// 48-bit link-layer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mac(pub [u8; 6]);

impl Mac {
    pub const BROADCAST: Mac = Mac([0xFF; 6]);
    pub const ZERO: Mac = Mac([0; 6]);

    /// Parse a colon-separated MAC string, e.g. `"02:0a:08:06:04:02"`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(format!("invalid MAC address: {s}"));
        }
        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| format!("invalid MAC address: {s}"))?;
        }
        Ok(Mac(bytes))
    }
}

impl std::fmt::Display for Mac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Format a host-byte-order IPv4 address as dotted quad.
pub fn fmt_ipv4(addr: u32) -> String {
    format!(
        "{}.{}.{}.{}",
        (addr >> 24) & 0xFF,
        (addr >> 16) & 0xFF,
        (addr >> 8) & 0xFF,
        addr & 0xFF
    )
}

// ── Frames ──────────────────────────────────────────────────────────

/// An Ethernet frame as seen by the forwarding plane. The wire codec
/// lives in the packet transport; the pipeline works on parsed frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    pub src: Mac,
    pub dst: Mac,
    pub payload: FramePayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    Ipv4(Ipv4Packet),
    Arp(ArpPdu),
    /// Anything else, carrying the raw ethertype (0x86DD = IPv6, ...).
    Other(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Packet {
    pub nw_src: u32,
    pub nw_dst: u32,
    pub protocol: u8,
    pub transport: Transport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Udp {
        tp_src: u16,
        tp_dst: u16,
        payload: Vec<u8>,
    },
    Tcp {
        tp_src: u16,
        tp_dst: u16,
    },
    IcmpEcho {
        kind: EchoKind,
        id: u16,
        seq: u16,
        data: Vec<u8>,
    },
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoKind {
    Request,
    Reply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOp {
    Request,
    Reply,
}

/// An ARP payload (IPv4 over Ethernet only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPdu {
    pub op: ArpOp,
    pub sender_mac: Mac,
    pub sender_ip: u32,
    pub target_mac: Mac,
    pub target_ip: u32,
}

impl ArpPdu {
    /// Build a broadcast who-has request frame.
    pub fn request(sender_mac: Mac, sender_ip: u32, target_ip: u32) -> EthernetFrame {
        EthernetFrame {
            src: sender_mac,
            dst: Mac::BROADCAST,
            payload: FramePayload::Arp(ArpPdu {
                op: ArpOp::Request,
                sender_mac,
                sender_ip,
                target_mac: Mac::ZERO,
                target_ip,
            }),
        }
    }

    /// Build a unicast is-at reply frame.
    pub fn reply(sender_mac: Mac, sender_ip: u32, target_mac: Mac, target_ip: u32) -> EthernetFrame {
        EthernetFrame {
            src: sender_mac,
            dst: target_mac,
            payload: FramePayload::Arp(ArpPdu {
                op: ArpOp::Reply,
                sender_mac,
                sender_ip,
                target_mac,
                target_ip,
            }),
        }
    }
}

// ── Flow match ──────────────────────────────────────────────────────

/// Header field view of a packet, used for rule matching and rewritten
/// in place by NAT and next-hop MAC resolution.
///
/// A pipeline invocation keeps two of these: `match_in` (the original
/// headers, immutable) and `match_out` (the working copy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMatch {
    pub dl_src: Mac,
    pub dl_dst: Mac,
    pub nw_src: u32,
    pub nw_dst: u32,
    pub nw_proto: u8,
    pub tp_src: u16,
    pub tp_dst: u16,
}

impl FlowMatch {
    /// Derive the match from a parsed IPv4 frame.
    pub fn from_ipv4(frame: &EthernetFrame, pkt: &Ipv4Packet) -> Self {
        let (tp_src, tp_dst) = match &pkt.transport {
            Transport::Udp { tp_src, tp_dst, .. } | Transport::Tcp { tp_src, tp_dst } => {
                (*tp_src, *tp_dst)
            }
            Transport::IcmpEcho { .. } | Transport::Other => (0, 0),
        };
        Self {
            dl_src: frame.src,
            dl_dst: frame.dst,
            nw_src: pkt.nw_src,
            nw_dst: pkt.nw_dst,
            nw_proto: pkt.protocol,
            tp_src,
            tp_dst,
        }
    }

    /// Rebuild a frame with this match's headers applied: MACs,
    /// addresses, and transport ports. The payload beyond the headers
    /// is carried over untouched.
    pub fn apply(&self, frame: &EthernetFrame) -> EthernetFrame {
        let payload = match &frame.payload {
            FramePayload::Ipv4(pkt) => {
                let transport = match &pkt.transport {
                    Transport::Udp { payload, .. } => Transport::Udp {
                        tp_src: self.tp_src,
                        tp_dst: self.tp_dst,
                        payload: payload.clone(),
                    },
                    Transport::Tcp { .. } => Transport::Tcp {
                        tp_src: self.tp_src,
                        tp_dst: self.tp_dst,
                    },
                    other => other.clone(),
                };
                FramePayload::Ipv4(Ipv4Packet {
                    nw_src: self.nw_src,
                    nw_dst: self.nw_dst,
                    protocol: pkt.protocol,
                    transport,
                })
            }
            other => other.clone(),
        };
        EthernetFrame {
            src: self.dl_src,
            dst: self.dl_dst,
            payload,
        }
    }

    pub fn protocol(&self) -> Protocol {
        Protocol::from_u8(self.nw_proto)
    }

    /// Whether the packet carries transport ports (TCP or UDP).
    pub fn has_transport_ports(&self) -> bool {
        matches!(self.protocol(), Protocol::Tcp | Protocol::Udp)
    }
}
