use serde::{Deserialize, Serialize};

use crate::common::entity::{Ipv4Cidr, PortId};
use crate::common::error::DomainError;
use crate::packet::entity::fmt_ipv4;

/// Where a route sends matching packets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NextHop {
    /// Emit through a materialized port, optionally via a gateway on
    /// the port's segment. Without a gateway the destination itself is
    /// resolved on the link.
    Port {
        port: PortId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gateway: Option<u32>,
    },
    /// Silently discard.
    Blackhole,
    /// Discard; the caller may signal the sender.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Source filter. `0.0.0.0/0` leaves the source unconstrained.
    #[serde(default = "Ipv4Cidr::any")]
    pub src: Ipv4Cidr,
    /// Invert the source filter.
    #[serde(default)]
    pub src_inv: bool,
    pub dst: Ipv4Cidr,
    pub next_hop: NextHop,
    /// Tie-breaker among routes with equally long destination
    /// prefixes. Lower wins.
    #[serde(default)]
    pub weight: u32,
}

impl Route {
    pub fn validate(&self) -> Result<(), DomainError> {
        self.src
            .validate()
            .map_err(|len| DomainError::InvalidConfig(format!("route src prefix /{len}")))?;
        self.dst
            .validate()
            .map_err(|len| DomainError::InvalidConfig(format!("route dst prefix /{len}")))?;
        if let NextHop::Port { port, .. } = &self.next_hop {
            port.validate()
                .map_err(|e| DomainError::InvalidConfig(format!("route port: {e}")))?;
        }
        Ok(())
    }

    pub fn matches(&self, nw_src: u32, nw_dst: u32) -> bool {
        if !self.dst.contains(nw_dst) {
            return false;
        }
        self.src.contains(nw_src) != self.src_inv
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> ", self.dst)?;
        match &self.next_hop {
            NextHop::Port { port, gateway } => {
                write!(f, "port {port}")?;
                if let Some(gw) = gateway {
                    write!(f, " via {}", fmt_ipv4(*gw))?;
                }
                Ok(())
            }
            NextHop::Blackhole => write!(f, "blackhole"),
            NextHop::Reject => write!(f, "reject"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_requires_dst_prefix() {
        let route = Route {
            src: Ipv4Cidr::any(),
            src_inv: false,
            dst: Ipv4Cidr::new(0x0A00_0200, 24),
            next_hop: NextHop::Blackhole,
            weight: 0,
        };
        assert!(route.matches(1, 0x0A00_02FF));
        assert!(!route.matches(1, 0x0A00_0300));
    }

    #[test]
    fn inverted_src_filter() {
        let route = Route {
            src: Ipv4Cidr::new(0x0A00_0100, 24),
            src_inv: true,
            dst: Ipv4Cidr::any(),
            next_hop: NextHop::Blackhole,
            weight: 0,
        };
        assert!(!route.matches(0x0A00_0105, 9));
        assert!(route.matches(0x0B00_0001, 9));
    }

    #[test]
    fn display_renders_next_hop() {
        let route = Route {
            src: Ipv4Cidr::any(),
            src_inv: false,
            dst: Ipv4Cidr::new(0x0A00_0200, 24),
            next_hop: NextHop::Port {
                port: PortId("uplink".into()),
                gateway: Some(0x0A00_0001),
            },
            weight: 10,
        };
        assert_eq!(format!("{route}"), "10.0.2.0/24 -> port uplink via 10.0.0.1");
    }
}
