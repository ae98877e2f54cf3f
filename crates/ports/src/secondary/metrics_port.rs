// Focused sub-traits for recording Prometheus metrics, grouped by domain.
//
// All methods take `&self` because the underlying implementation uses
// atomic operations (interior mutability via `prometheus-client`).
//
// Default implementations are no-ops, allowing test mocks to implement
// only the sub-traits relevant to the service under test.

// ── Pipeline metrics ───────────────────────────────────────────────

pub trait PipelineMetrics: Send + Sync {
    /// Record a processed packet with ingress port and outcome labels
    /// (forward, drop, consumed, paused, not_supported).
    fn record_packet(&self, _in_port: &str, _outcome: &str) {}

    /// Record a packet suspended on next-hop resolution and whether it
    /// was eventually emitted.
    fn record_resume(&self, _emitted: bool) {}
}

// ── Routing / rule metrics ─────────────────────────────────────────

pub trait RoutingMetrics: Send + Sync {
    /// Record a route lookup outcome (port, blackhole, reject, none).
    fn record_route_lookup(&self, _outcome: &str) {}

    /// Set the number of routes currently loaded.
    fn set_routes_loaded(&self, _count: u64) {}

    /// Record a chain verdict (accept, drop, reject) for a chain.
    fn record_chain_verdict(&self, _chain: &str, _verdict: &str) {}
}

/// Everything the router service records, as one object-safe bound.
pub trait RouterMetrics: PipelineMetrics + RoutingMetrics + ArpMetrics {}

impl<T: PipelineMetrics + RoutingMetrics + ArpMetrics> RouterMetrics for T {}

// ── ARP metrics ────────────────────────────────────────────────────

pub trait ArpMetrics: Send + Sync {
    /// Record a transmitted ARP request (first send, retry, refresh).
    fn record_arp_request(&self, _kind: &str) {}

    /// Record a resolution completing (resolved) or timing out (failed).
    fn record_arp_resolution(&self, _outcome: &str) {}

    /// Set the current number of cache entries.
    fn set_arp_cache_size(&self, _size: u64) {}
}
