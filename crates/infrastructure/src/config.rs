//! Router configuration: structs, parsing, and validation.
//!
//! Split across sub-modules:
//! - `common`: shared parsers and `ConfigError`
//! - `router`: ports, routes, and chain sections

mod common;
mod router;

pub use common::{
    parse_cidr, parse_ipv4, parse_mac, parse_port_range, parse_protocol, ConfigError, LogFormat,
    LogLevel,
};
pub use router::{
    ActionConfig, ChainConfig, ConditionConfig, NatTargetConfig, NextHopConfig, PortConfig,
    RouteConfig, RuleConfig,
};

use std::path::Path;

use serde::{Deserialize, Serialize};

use common::{check_limit, MAX_PORTS, MAX_ROUTES, MAX_RULES};

// ── Top-level config ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    pub router: RouterInfo,

    #[serde(default)]
    pub ports: Vec<PortConfig>,

    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    #[serde(default)]
    pub chains: Vec<ChainConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterInfo {
    /// Router identifier used in logs and metrics.
    pub id: String,

    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub log_format: LogFormat,
}

impl RouterConfig {
    /// Load config from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml_ng::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation: size limits and referential integrity.
    /// Value-level validation happens in the domain conversions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_limit("ports", self.ports.len(), MAX_PORTS)?;
        check_limit("routes", self.routes.len(), MAX_ROUTES)?;
        let rule_count: usize = self.chains.iter().map(|c| c.rules.len()).sum();
        check_limit("chains.rules", rule_count, MAX_RULES)?;

        for route in &self.routes {
            if let NextHopConfig::Port { port, .. } = &route.next_hop
                && !self.ports.iter().any(|p| &p.id == port)
            {
                return Err(ConfigError::Validation {
                    field: "routes".to_string(),
                    message: format!("next hop references unknown port '{port}'"),
                });
            }
        }
        for chain in &self.chains {
            for rule in &chain.rules {
                if let ActionConfig::Jump { target } = &rule.action
                    && !self.chains.iter().any(|c| &c.name == target)
                {
                    return Err(ConfigError::Validation {
                        field: format!("chains.{}", chain.name),
                        message: format!("jump references unknown chain '{target}'"),
                    });
                }
            }
        }
        Ok(())
    }
}
