use serde::{Deserialize, Serialize};

use domain::arp::entity::RouterPort;
use domain::common::entity::{Ipv4Cidr, PortId, RuleId};
use domain::condition::entity::Condition;
use domain::nat::entity::NatTarget;
use domain::route::entity::{NextHop, Route};
use domain::rule::entity::{Rule, RuleAction, Verdict};

use super::common::{
    parse_cidr, parse_ipv4, parse_mac, parse_port_range, parse_protocol, ConfigError,
};

// ── Ports ──────────────────────────────────────────────────────────

/// Configuration for one materialized router port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    /// Unique port ID (e.g. `"uplink"`).
    pub id: String,
    /// Port MAC, colon-separated (e.g. `"02:0a:08:06:04:02"`).
    pub mac: String,
    /// Everything routed out this port (e.g. `"10.0.2.0/24"`).
    pub subnet: String,
    /// The port's own address; must fall inside `subnet`.
    pub addr: String,
    /// The directly attached sub-range of `subnet`. Defaults to the
    /// whole subnet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_segment: Option<String>,
}

impl PortConfig {
    pub fn to_domain(&self) -> Result<RouterPort, ConfigError> {
        let subnet = parse_cidr(&self.subnet)?;
        let local_segment = match &self.local_segment {
            Some(s) => parse_cidr(s)?,
            None => subnet,
        };
        Ok(RouterPort {
            id: PortId(self.id.clone()),
            mac: parse_mac(&self.mac)?,
            subnet,
            port_addr: parse_ipv4(&self.addr)?,
            local_segment,
        })
    }
}

// ── Routes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Source filter CIDR. Absent means any source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default)]
    pub src_inv: bool,
    pub dst: String,
    pub next_hop: NextHopConfig,
    #[serde(default)]
    pub weight: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NextHopConfig {
    Port {
        port: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gateway: Option<String>,
    },
    Blackhole,
    Reject,
}

impl RouteConfig {
    pub fn to_domain(&self) -> Result<Route, ConfigError> {
        let src = match &self.src {
            Some(s) => parse_cidr(s)?,
            None => Ipv4Cidr::any(),
        };
        let next_hop = match &self.next_hop {
            NextHopConfig::Port { port, gateway } => NextHop::Port {
                port: PortId(port.clone()),
                gateway: gateway.as_deref().map(parse_ipv4).transpose()?,
            },
            NextHopConfig::Blackhole => NextHop::Blackhole,
            NextHopConfig::Reject => NextHop::Reject,
        };
        Ok(Route {
            src,
            src_inv: self.src_inv,
            dst: parse_cidr(&self.dst)?,
            next_hop,
            weight: self.weight,
        })
    }
}

// ── Chains ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub id: String,
    pub position: u32,
    #[serde(default)]
    pub condition: ConditionConfig,
    pub action: ActionConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_ports: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_ports: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proto: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nw_src: Option<String>,
    #[serde(default)]
    pub nw_src_inv: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nw_dst: Option<String>,
    #[serde(default)]
    pub nw_dst_inv: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tp_src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tp_dst: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    Literal {
        verdict: Verdict,
    },
    Jump {
        target: String,
    },
    ForwardNat {
        dnat: bool,
        targets: Vec<NatTargetConfig>,
        verdict: Verdict,
    },
    ReverseNat {
        dnat: bool,
        verdict: Verdict,
    },
}

/// A NAT target block: `addr` is a single address or an inclusive
/// `start-end` range, `ports` likewise (defaulting to the full range).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatTargetConfig {
    pub addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<String>,
}

impl NatTargetConfig {
    pub fn to_domain(&self) -> Result<NatTarget, ConfigError> {
        let (nw_start, nw_end) = match self.addr.split_once('-') {
            Some((start, end)) => (parse_ipv4(start.trim())?, parse_ipv4(end.trim())?),
            None => {
                let addr = parse_ipv4(&self.addr)?;
                (addr, addr)
            }
        };
        let (tp_start, tp_end) = match &self.ports {
            Some(ports) => {
                let range = parse_port_range(ports)?;
                (range.start, range.end)
            }
            None => (1, u16::MAX),
        };
        if nw_start > nw_end {
            return Err(ConfigError::Validation {
                field: "addr".to_string(),
                message: format!("range start above end: {}", self.addr),
            });
        }
        Ok(NatTarget {
            nw_start,
            nw_end,
            tp_start,
            tp_end,
        })
    }
}

impl ConditionConfig {
    pub fn to_domain(&self) -> Result<Condition, ConfigError> {
        let port_set = |ids: &Option<Vec<String>>| {
            ids.as_ref()
                .map(|ids| ids.iter().map(|id| PortId(id.clone())).collect())
        };
        Ok(Condition {
            in_port_ids: port_set(&self.in_ports),
            out_port_ids: port_set(&self.out_ports),
            nw_proto: self.proto.as_deref().map(parse_protocol).transpose()?,
            nw_src: self.nw_src.as_deref().map(parse_cidr).transpose()?,
            nw_src_inv: self.nw_src_inv,
            nw_dst: self.nw_dst.as_deref().map(parse_cidr).transpose()?,
            nw_dst_inv: self.nw_dst_inv,
            tp_src: self.tp_src.as_deref().map(parse_port_range).transpose()?,
            tp_dst: self.tp_dst.as_deref().map(parse_port_range).transpose()?,
        })
    }
}

impl RuleConfig {
    pub fn to_domain(&self) -> Result<Rule, ConfigError> {
        let action = match &self.action {
            ActionConfig::Literal { verdict } => RuleAction::Literal { verdict: *verdict },
            ActionConfig::Jump { target } => RuleAction::Jump {
                target: target.clone(),
            },
            ActionConfig::ForwardNat {
                dnat,
                targets,
                verdict,
            } => RuleAction::ForwardNat {
                dnat: *dnat,
                targets: targets
                    .iter()
                    .map(NatTargetConfig::to_domain)
                    .collect::<Result<_, _>>()?,
                verdict: *verdict,
            },
            ActionConfig::ReverseNat { dnat, verdict } => RuleAction::ReverseNat {
                dnat: *dnat,
                verdict: *verdict,
            },
        };
        Ok(Rule {
            id: RuleId(self.id.clone()),
            position: self.position,
            condition: self.condition.to_domain()?,
            action,
        })
    }
}
