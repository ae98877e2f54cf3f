use serde::{Deserialize, Serialize};

use crate::common::entity::{Ipv4Cidr, PortId};
use crate::common::error::DomainError;
use crate::packet::entity::Mac;

/// Pause between retransmitted requests for an unresolved address.
pub const ARP_RETRY_MILLIS: u64 = 10_000;
/// How long resolution may stay pending, measured from the first
/// request, before waiters are failed.
pub const ARP_TIMEOUT_MILLIS: u64 = 60_000;
/// Age at which a resolved entry still answers lookups but triggers a
/// background refresh.
pub const ARP_STALE_MILLIS: u64 = 1_800_000;
/// Age at which a resolved entry is unusable and evicted.
pub const ARP_EXPIRATION_MILLIS: u64 = 3_600_000;

/// A materialized L3 port of the router.
///
/// `subnet` is everything routed out this port; `local_segment` is the
/// sub-range directly attached to the link, the only range link-layer
/// resolution can reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterPort {
    pub id: PortId,
    pub mac: Mac,
    pub subnet: Ipv4Cidr,
    pub port_addr: u32,
    pub local_segment: Ipv4Cidr,
}

impl RouterPort {
    pub fn validate(&self) -> Result<(), DomainError> {
        self.id
            .validate()
            .map_err(|e| DomainError::InvalidConfig(format!("port {}: {e}", self.id)))?;
        self.subnet
            .validate()
            .map_err(|len| DomainError::InvalidConfig(format!("port {}: /{len}", self.id)))?;
        self.local_segment.validate().map_err(|len| {
            DomainError::InvalidConfig(format!("port {} segment: /{len}", self.id))
        })?;
        if !self.subnet.contains(self.port_addr) {
            return Err(DomainError::InvalidConfig(format!(
                "port {}: address outside its subnet",
                self.id
            )));
        }
        Ok(())
    }

    /// Whether `nw_addr` is on this port's link, i.e. reachable by ARP.
    pub fn is_local_target(&self, nw_addr: u32) -> bool {
        self.local_segment.contains(nw_addr)
    }

    /// Whether an ARP request for `target_ip` arriving on this port
    /// should be answered with the port's own MAC.
    ///
    /// The port proxies for its own address and for addresses it routes
    /// to that are not on the local segment (the requester cannot reach
    /// those directly, so the router answers in their stead).
    pub fn should_proxy_answer(&self, target_ip: u32) -> bool {
        if target_ip == self.port_addr {
            return true;
        }
        self.subnet.contains(target_ip) && !self.local_segment.contains(target_ip)
    }
}

/// Callback handed a resolved MAC, or `None` when resolution failed.
pub type ArpWaiter = Box<dyn FnOnce(Option<Mac>) + Send>;

/// One cache slot: either a resolution in flight (no MAC yet, waiters
/// queued) or a learned MAC with its timestamps.
pub struct ArpCacheEntry {
    pub mac: Option<Mac>,
    /// When the first request of the current resolution went out.
    pub first_request: u64,
    /// When the most recent request went out. Paces retries and stale
    /// refreshes.
    pub last_request: u64,
    /// When the MAC was learned. Meaningless while pending.
    pub resolved_at: u64,
    pub waiters: Vec<ArpWaiter>,
}

impl std::fmt::Debug for ArpCacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArpCacheEntry")
            .field("mac", &self.mac)
            .field("first_request", &self.first_request)
            .field("last_request", &self.last_request)
            .field("resolved_at", &self.resolved_at)
            .field("waiters", &self.waiters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port() -> RouterPort {
        RouterPort {
            id: PortId("p1".into()),
            mac: Mac::parse("02:00:11:22:00:01").unwrap(),
            // Routes 10.0.0.0/24, directly attached to 10.0.0.0/26.
            subnet: Ipv4Cidr::new(0x0A00_0000, 24),
            port_addr: 0x0A00_0001,
            local_segment: Ipv4Cidr::new(0x0A00_0000, 26),
        }
    }

    #[test]
    fn validate_address_must_be_in_subnet() {
        let mut p = port();
        assert!(p.validate().is_ok());
        p.port_addr = 0x0B00_0001;
        assert!(p.validate().is_err());
    }

    #[test]
    fn local_target_is_segment_not_subnet() {
        let p = port();
        assert!(p.is_local_target(0x0A00_003F));
        // In the subnet but beyond the attached segment.
        assert!(!p.is_local_target(0x0A00_0040));
    }

    #[test]
    fn proxy_answer_matrix() {
        let p = port();
        // Own address: always answered.
        assert!(p.should_proxy_answer(0x0A00_0001));
        // On the local segment: the real owner should answer.
        assert!(!p.should_proxy_answer(0x0A00_0002));
        // Routed but off-segment: proxied.
        assert!(p.should_proxy_answer(0x0A00_0080));
        // Outside the subnet entirely.
        assert!(!p.should_proxy_answer(0x0B00_0001));
    }
}
