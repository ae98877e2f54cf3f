use tracing::debug;

use crate::common::entity::PortId;
use crate::common::error::DomainError;
use crate::route::entity::{NextHop, Route};

/// Longest-prefix-match routing table.
///
/// Routes are kept sorted by descending destination prefix length,
/// then ascending weight, then insertion order; lookup is a linear
/// first-match scan. Table sizes here are per-router and small, so a
/// scan beats a trie on simplicity and is plenty fast.
#[derive(Debug, Default)]
pub struct RoutingTable {
    entries: Vec<Entry>,
    next_seq: u64,
}

#[derive(Debug)]
struct Entry {
    route: Route,
    seq: u64,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, route: Route) -> Result<(), DomainError> {
        route.validate()?;
        if self.entries.iter().any(|e| e.route == route) {
            return Err(DomainError::InvalidConfig(format!(
                "route already present: {route}"
            )));
        }
        debug!(%route, "adding route");
        self.entries.push(Entry {
            route,
            seq: self.next_seq,
        });
        self.next_seq += 1;
        self.sort();
        Ok(())
    }

    /// Remove a route by value.
    pub fn remove_route(&mut self, route: &Route) -> Result<(), DomainError> {
        let pos = self
            .entries
            .iter()
            .position(|e| &e.route == route)
            .ok_or_else(|| DomainError::InvalidConfig(format!("route not present: {route}")))?;
        self.entries.remove(pos);
        Ok(())
    }

    /// Drop every route whose next hop is the given port. Returns how
    /// many were removed.
    pub fn remove_port_routes(&mut self, port: &PortId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| {
            !matches!(&e.route.next_hop, NextHop::Port { port: p, .. } if p == port)
        });
        before - self.entries.len()
    }

    /// Find the best route for a packet. Returns `None` when no route
    /// covers the destination.
    pub fn lookup(&self, nw_src: u32, nw_dst: u32) -> Option<&Route> {
        self.entries
            .iter()
            .map(|e| &e.route)
            .find(|r| r.matches(nw_src, nw_dst))
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.entries.iter().map(|e| &e.route)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sort(&mut self) {
        self.entries.sort_by(|a, b| {
            b.route
                .dst
                .prefix_len
                .cmp(&a.route.dst.prefix_len)
                .then(a.route.weight.cmp(&b.route.weight))
                .then(a.seq.cmp(&b.seq))
        });
    }
}
