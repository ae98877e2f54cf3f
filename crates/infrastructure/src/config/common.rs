//! Shared parsing helpers and error types used across the config module.

use domain::common::entity::{Ipv4Cidr, PortRange, Protocol};
use domain::packet::entity::Mac;
use serde::{Deserialize, Serialize};

// ── Security limits ────────────────────────────────────────────────
//
// Maximum counts to prevent OOM from excessive config.

/// Maximum materialized ports per router.
pub(super) const MAX_PORTS: usize = 256;
/// Maximum routes per router.
pub(super) const MAX_ROUTES: usize = 10_000;
/// Maximum rules across all chains.
pub(super) const MAX_RULES: usize = 4_096;

// ── Config errors ──────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(String),

    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("invalid CIDR notation '{value}': {reason}")]
    InvalidCidr { value: String, reason: String },

    #[error("invalid IPv4 address '{0}'")]
    InvalidAddr(String),

    #[error("invalid MAC address '{0}'")]
    InvalidMac(String),

    #[error("invalid port range '{value}': {reason}")]
    InvalidPortRange { value: String, reason: String },

    #[error("invalid value '{value}' for field '{field}': expected one of {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
}

impl From<serde_yaml_ng::Error> for ConfigError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        Self::Yaml(e.to_string())
    }
}

pub(super) fn check_limit(field: &str, count: usize, max: usize) -> Result<(), ConfigError> {
    if count > max {
        return Err(ConfigError::Validation {
            field: field.to_string(),
            message: format!("{count} entries exceeds the maximum of {max}"),
        });
    }
    Ok(())
}

// ── Logging options ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

// ── Value parsers ──────────────────────────────────────────────────

/// Parse a dotted-quad IPv4 address into host byte order.
pub fn parse_ipv4(s: &str) -> Result<u32, ConfigError> {
    s.parse::<std::net::Ipv4Addr>()
        .map(u32::from)
        .map_err(|_| ConfigError::InvalidAddr(s.to_string()))
}

/// Parse `"addr/len"` CIDR notation.
pub fn parse_cidr(s: &str) -> Result<Ipv4Cidr, ConfigError> {
    let Some((addr, len)) = s.split_once('/') else {
        return Err(ConfigError::InvalidCidr {
            value: s.to_string(),
            reason: "missing '/'".to_string(),
        });
    };
    let addr = parse_ipv4(addr).map_err(|_| ConfigError::InvalidCidr {
        value: s.to_string(),
        reason: "bad address".to_string(),
    })?;
    let prefix_len: u8 = len.parse().map_err(|_| ConfigError::InvalidCidr {
        value: s.to_string(),
        reason: "bad prefix length".to_string(),
    })?;
    if prefix_len > 32 {
        return Err(ConfigError::InvalidCidr {
            value: s.to_string(),
            reason: "prefix length above 32".to_string(),
        });
    }
    Ok(Ipv4Cidr::new(addr, prefix_len))
}

pub fn parse_mac(s: &str) -> Result<Mac, ConfigError> {
    Mac::parse(s).map_err(|_| ConfigError::InvalidMac(s.to_string()))
}

/// Parse `"80"` or `"80-90"` into an inclusive range.
pub fn parse_port_range(s: &str) -> Result<PortRange, ConfigError> {
    let (start, end) = match s.split_once('-') {
        Some((start, end)) => (start, end),
        None => (s, s),
    };
    let invalid = |reason: &str| ConfigError::InvalidPortRange {
        value: s.to_string(),
        reason: reason.to_string(),
    };
    let start: u16 = start.trim().parse().map_err(|_| invalid("bad start"))?;
    let end: u16 = end.trim().parse().map_err(|_| invalid("bad end"))?;
    if start > end {
        return Err(invalid("start above end"));
    }
    Ok(PortRange { start, end })
}

pub fn parse_protocol(s: &str) -> Result<Protocol, ConfigError> {
    match s.to_ascii_lowercase().as_str() {
        "tcp" => Ok(Protocol::Tcp),
        "udp" => Ok(Protocol::Udp),
        "icmp" => Ok(Protocol::Icmp),
        "any" => Ok(Protocol::Any),
        other => match other.parse::<u8>() {
            Ok(n) => Ok(Protocol::from_u8(n)),
            Err(_) => Err(ConfigError::InvalidValue {
                field: "proto".to_string(),
                value: s.to_string(),
                expected: "tcp, udp, icmp, any, or a protocol number".to_string(),
            }),
        },
    }
}
