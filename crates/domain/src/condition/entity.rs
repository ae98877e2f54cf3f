use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::common::entity::{Ipv4Cidr, PortId, PortRange, Protocol};
use crate::packet::entity::FlowMatch;

/// What a condition is evaluated against: the current (possibly already
/// rewritten) flow match plus the ports the packet entered and, once
/// routing has run, will leave through.
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    pub flow: &'a FlowMatch,
    pub in_port: &'a PortId,
    pub out_port: Option<&'a PortId>,
}

/// Conjunctive packet filter. Every populated field must match for the
/// condition to hold; `None` means wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_port_ids: Option<HashSet<PortId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_port_ids: Option<HashSet<PortId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nw_proto: Option<Protocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nw_src: Option<Ipv4Cidr>,
    /// Invert the `nw_src` test.
    #[serde(default)]
    pub nw_src_inv: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nw_dst: Option<Ipv4Cidr>,
    /// Invert the `nw_dst` test.
    #[serde(default)]
    pub nw_dst_inv: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tp_src: Option<PortRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tp_dst: Option<PortRange>,
}

impl Condition {
    /// A condition with no filters. Matches every packet.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), String> {
        for range in [&self.tp_src, &self.tp_dst].into_iter().flatten() {
            range
                .validate()
                .map_err(|(s, e)| format!("invalid port range {s}-{e}"))?;
        }
        for cidr in [&self.nw_src, &self.nw_dst].into_iter().flatten() {
            cidr.validate()
                .map_err(|len| format!("invalid prefix length /{len}"))?;
        }
        Ok(())
    }

    pub fn matches(&self, ctx: &RuleContext<'_>) -> bool {
        if let Some(ids) = &self.in_port_ids
            && !ids.contains(ctx.in_port)
        {
            return false;
        }
        if let Some(ids) = &self.out_port_ids {
            match ctx.out_port {
                Some(port) if ids.contains(port) => {}
                _ => return false,
            }
        }
        if let Some(proto) = &self.nw_proto
            && *proto != Protocol::Any
            && *proto != ctx.flow.protocol()
        {
            return false;
        }
        if let Some(cidr) = &self.nw_src
            && cidr.contains(ctx.flow.nw_src) == self.nw_src_inv
        {
            return false;
        }
        if let Some(cidr) = &self.nw_dst
            && cidr.contains(ctx.flow.nw_dst) == self.nw_dst_inv
        {
            return false;
        }
        if let Some(range) = &self.tp_src {
            if !ctx.flow.has_transport_ports() || !range.contains(ctx.flow.tp_src) {
                return false;
            }
        }
        if let Some(range) = &self.tp_dst {
            if !ctx.flow.has_transport_ports() || !range.contains(ctx.flow.tp_dst) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::entity::Mac;

    fn flow(nw_src: u32, nw_dst: u32, proto: u8, tp_src: u16, tp_dst: u16) -> FlowMatch {
        FlowMatch {
            dl_src: Mac::ZERO,
            dl_dst: Mac::ZERO,
            nw_src,
            nw_dst,
            nw_proto: proto,
            tp_src,
            tp_dst,
        }
    }

    fn ctx<'a>(
        flow: &'a FlowMatch,
        in_port: &'a PortId,
        out_port: Option<&'a PortId>,
    ) -> RuleContext<'a> {
        RuleContext {
            flow,
            in_port,
            out_port,
        }
    }

    // ── Wildcard ──────────────────────────────────────────────────

    #[test]
    fn empty_condition_matches_everything() {
        let f = flow(1, 2, 17, 10, 20);
        let p = PortId("p0".into());
        assert!(Condition::any().matches(&ctx(&f, &p, None)));
    }

    // ── Port sets ─────────────────────────────────────────────────

    #[test]
    fn in_port_set_membership() {
        let f = flow(1, 2, 17, 10, 20);
        let p0 = PortId("p0".into());
        let p1 = PortId("p1".into());
        let cond = Condition {
            in_port_ids: Some(HashSet::from([p0.clone()])),
            ..Condition::default()
        };
        assert!(cond.matches(&ctx(&f, &p0, None)));
        assert!(!cond.matches(&ctx(&f, &p1, None)));
    }

    #[test]
    fn out_port_filter_requires_known_out_port() {
        let f = flow(1, 2, 17, 10, 20);
        let p0 = PortId("p0".into());
        let p1 = PortId("p1".into());
        let cond = Condition {
            out_port_ids: Some(HashSet::from([p1.clone()])),
            ..Condition::default()
        };
        // No out port yet (pre-routing chain): filter cannot hold.
        assert!(!cond.matches(&ctx(&f, &p0, None)));
        assert!(cond.matches(&ctx(&f, &p0, Some(&p1))));
        assert!(!cond.matches(&ctx(&f, &p0, Some(&p0))));
    }

    // ── Network fields ────────────────────────────────────────────

    #[test]
    fn nw_dst_prefix_and_inversion() {
        let inside = flow(1, 0x0A00_0205, 17, 10, 20);
        let outside = flow(1, 0x0B00_0001, 17, 10, 20);
        let p = PortId("p0".into());
        let cidr = Ipv4Cidr::new(0x0A00_0200, 24);

        let cond = Condition {
            nw_dst: Some(cidr),
            ..Condition::default()
        };
        assert!(cond.matches(&ctx(&inside, &p, None)));
        assert!(!cond.matches(&ctx(&outside, &p, None)));

        let inv = Condition {
            nw_dst: Some(cidr),
            nw_dst_inv: true,
            ..Condition::default()
        };
        assert!(!inv.matches(&ctx(&inside, &p, None)));
        assert!(inv.matches(&ctx(&outside, &p, None)));
    }

    #[test]
    fn proto_any_is_wildcard() {
        let f = flow(1, 2, 6, 10, 20);
        let p = PortId("p0".into());
        let cond = Condition {
            nw_proto: Some(Protocol::Any),
            ..Condition::default()
        };
        assert!(cond.matches(&ctx(&f, &p, None)));
        let tcp_only = Condition {
            nw_proto: Some(Protocol::Tcp),
            ..Condition::default()
        };
        assert!(tcp_only.matches(&ctx(&f, &p, None)));
        let udp_only = Condition {
            nw_proto: Some(Protocol::Udp),
            ..Condition::default()
        };
        assert!(!udp_only.matches(&ctx(&f, &p, None)));
    }

    // ── Transport ports ───────────────────────────────────────────

    #[test]
    fn tp_ranges_only_apply_to_tcp_udp() {
        let udp = flow(1, 2, 17, 1111, 2222);
        let icmp = flow(1, 2, 1, 0, 0);
        let p = PortId("p0".into());
        let cond = Condition {
            tp_dst: Some(PortRange {
                start: 2000,
                end: 3000,
            }),
            ..Condition::default()
        };
        assert!(cond.matches(&ctx(&udp, &p, None)));
        // ICMP has no ports, so a port filter never matches it.
        assert!(!cond.matches(&ctx(&icmp, &p, None)));
    }

    #[test]
    fn tp_range_bounds_inclusive() {
        let p = PortId("p0".into());
        let cond = Condition {
            tp_src: Some(PortRange {
                start: 100,
                end: 200,
            }),
            ..Condition::default()
        };
        for (port, expect) in [(99, false), (100, true), (200, true), (201, false)] {
            let f = flow(1, 2, 6, port, 1);
            assert_eq!(cond.matches(&ctx(&f, &p, None)), expect, "port {port}");
        }
    }
}
