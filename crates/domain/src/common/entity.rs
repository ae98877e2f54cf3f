use serde::{Deserialize, Serialize};

/// Unique identifier for a logical router.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouterId(pub String);

impl std::fmt::Display for RouterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a router port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId(pub String);

impl PortId {
    /// Validate that the port ID is non-empty and contains only
    /// alphanumeric characters, dashes, and underscores.
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_id(&self.0)
    }
}

impl std::fmt::Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a rule within a router's chain set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub String);

impl RuleId {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_id(&self.0)
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_id(s: &str) -> Result<(), &'static str> {
    if s.is_empty() {
        return Err("ID must not be empty");
    }
    if !s
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err("ID must contain only alphanumeric, dashes, underscores");
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Any,
    Other(u8),
}

impl Protocol {
    /// Convert to the IP protocol number. Returns 0 for Any (wildcard).
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Tcp => 6,
            Self::Udp => 17,
            Self::Icmp => 1,
            Self::Any => 0,
            Self::Other(n) => n,
        }
    }

    /// Create from a raw IP protocol number.
    pub fn from_u8(n: u8) -> Self {
        match n {
            0 => Self::Any,
            1 => Self::Icmp,
            6 => Self::Tcp,
            17 => Self::Udp,
            other => Self::Other(other),
        }
    }
}

// ── Transport port range ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn contains(&self, port: u16) -> bool {
        port >= self.start && port <= self.end
    }

    pub fn validate(&self) -> Result<(), (u16, u16)> {
        if self.start > self.end {
            return Err((self.start, self.end));
        }
        Ok(())
    }
}

// ── IPv4 CIDR ───────────────────────────────────────────────────────

/// IPv4 address with prefix length for subnet matching.
///
/// Addresses are host-byte-order `u32`. IPv6 is not handled by the
/// forwarding plane; v6 frames terminate the pipeline as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ipv4Cidr {
    pub addr: u32,
    pub prefix_len: u8,
}

impl Ipv4Cidr {
    pub fn new(addr: u32, prefix_len: u8) -> Self {
        Self { addr, prefix_len }
    }

    /// The all-matching prefix 0.0.0.0/0.
    pub fn any() -> Self {
        Self {
            addr: 0,
            prefix_len: 0,
        }
    }

    /// Check if the given address falls within this network.
    pub fn contains(&self, ip: u32) -> bool {
        if self.prefix_len == 0 {
            return true;
        }
        if self.prefix_len >= 32 {
            return self.addr == ip;
        }
        let mask = self.mask();
        (self.addr & mask) == (ip & mask)
    }

    /// Bitmask for this prefix length.
    /// e.g. /24 -> `0xFFFF_FF00`, /0 -> `0`, /32 -> `0xFFFF_FFFF`.
    pub fn mask(&self) -> u32 {
        if self.prefix_len == 0 {
            0
        } else if self.prefix_len >= 32 {
            !0u32
        } else {
            !0u32 << (32 - self.prefix_len)
        }
    }

    pub fn validate(&self) -> Result<(), u8> {
        if self.prefix_len > 32 {
            return Err(self.prefix_len);
        }
        Ok(())
    }
}

impl std::fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}",
            crate::packet::entity::fmt_ipv4(self.addr),
            self.prefix_len
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Id tests ──────────────────────────────────────────────────

    #[test]
    fn port_id_valid() {
        assert!(PortId("uplink-1".to_string()).validate().is_ok());
        assert!(PortId("p_2".to_string()).validate().is_ok());
    }

    #[test]
    fn port_id_empty() {
        assert!(PortId(String::new()).validate().is_err());
    }

    #[test]
    fn rule_id_special_chars() {
        assert!(RuleId("rule.1".to_string()).validate().is_err());
        assert!(RuleId("rule 1".to_string()).validate().is_err());
    }

    #[test]
    fn id_display() {
        assert_eq!(format!("{}", PortId("uplink".to_string())), "uplink");
        assert_eq!(format!("{}", RuleId("r-1".to_string())), "r-1");
    }

    // ── Protocol tests ────────────────────────────────────────────

    #[test]
    fn protocol_roundtrip() {
        for proto in [Protocol::Tcp, Protocol::Udp, Protocol::Icmp, Protocol::Any] {
            assert_eq!(Protocol::from_u8(proto.to_u8()), proto);
        }
        assert_eq!(Protocol::from_u8(47), Protocol::Other(47));
    }

    #[test]
    fn protocol_known_values() {
        assert_eq!(Protocol::Tcp.to_u8(), 6);
        assert_eq!(Protocol::Udp.to_u8(), 17);
        assert_eq!(Protocol::Icmp.to_u8(), 1);
        assert_eq!(Protocol::Any.to_u8(), 0);
    }

    // ── PortRange tests ───────────────────────────────────────────

    #[test]
    fn port_range_contains() {
        let range = PortRange {
            start: 80,
            end: 443,
        };
        assert!(range.contains(80));
        assert!(range.contains(443));
        assert!(!range.contains(79));
        assert!(!range.contains(444));
    }

    #[test]
    fn port_range_validate_inverted() {
        let range = PortRange {
            start: 443,
            end: 80,
        };
        assert!(range.validate().is_err());
    }

    // ── Cidr tests ────────────────────────────────────────────────

    #[test]
    fn cidr_exact_match() {
        let cidr = Ipv4Cidr::new(0xC0A8_0001, 32);
        assert!(cidr.contains(0xC0A8_0001));
        assert!(!cidr.contains(0xC0A8_0002));
    }

    #[test]
    fn cidr_subnet_match() {
        // 192.168.1.0/24
        let cidr = Ipv4Cidr::new(0xC0A8_0100, 24);
        assert!(cidr.contains(0xC0A8_0100));
        assert!(cidr.contains(0xC0A8_01FF));
        assert!(!cidr.contains(0xC0A8_0200));
    }

    #[test]
    fn cidr_wildcard_matches_all() {
        let cidr = Ipv4Cidr::any();
        assert!(cidr.contains(0));
        assert!(cidr.contains(0xFFFF_FFFF));
    }

    #[test]
    fn cidr_mask_values() {
        assert_eq!(Ipv4Cidr::new(0, 0).mask(), 0);
        assert_eq!(Ipv4Cidr::new(0, 8).mask(), 0xFF00_0000);
        assert_eq!(Ipv4Cidr::new(0, 24).mask(), 0xFFFF_FF00);
        assert_eq!(Ipv4Cidr::new(0, 32).mask(), 0xFFFF_FFFF);
    }

    #[test]
    fn cidr_validate_invalid_prefix() {
        assert!(Ipv4Cidr::new(0, 33).validate().is_err());
        assert!(Ipv4Cidr::new(0, 32).validate().is_ok());
    }

    #[test]
    fn cidr_display() {
        let cidr = Ipv4Cidr::new(0x0A00_0200, 24);
        assert_eq!(format!("{cidr}"), "10.0.2.0/24");
    }
}
