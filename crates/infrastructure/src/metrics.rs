use ports::secondary::metrics_port::{ArpMetrics, PipelineMetrics, RoutingMetrics};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

// ── Label types ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PacketLabels {
    pub port: String,
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ChainLabels {
    pub chain: String,
    pub verdict: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct KindLabels {
    pub kind: String,
}

// ── Forwarding metrics registry ─────────────────────────────────────

/// Prometheus metrics registry for the forwarding plane.
///
/// All metric families use interior mutability (atomics), so recording
/// metrics only requires `&self`. The registry itself is NOT Clone —
/// wrap in `Arc` for multi-task sharing.
pub struct ForwardingMetrics {
    registry: Registry,
    pub packets_total: Family<PacketLabels, Counter>,
    pub resumes_total: Family<OutcomeLabels, Counter>,
    pub route_lookups_total: Family<OutcomeLabels, Counter>,
    pub routes_loaded: Gauge,
    pub chain_verdicts_total: Family<ChainLabels, Counter>,
    pub arp_requests_total: Family<KindLabels, Counter>,
    pub arp_resolutions_total: Family<OutcomeLabels, Counter>,
    pub arp_cache_entries: Gauge,
}

impl ForwardingMetrics {
    /// Create a new metrics registry with all metrics registered under
    /// the `vrouterd` prefix.
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("vrouterd");

        let packets_total = Family::<PacketLabels, Counter>::default();
        registry.register(
            "packets",
            "Packets run through the forwarding pipeline",
            packets_total.clone(),
        );

        let resumes_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "resumes",
            "Suspended packets finished after next-hop resolution",
            resumes_total.clone(),
        );

        let route_lookups_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "route_lookups",
            "Route lookups by outcome",
            route_lookups_total.clone(),
        );

        let routes_loaded = Gauge::default();
        registry.register(
            "routes_loaded",
            "Routes currently in the routing table",
            routes_loaded.clone(),
        );

        let chain_verdicts_total = Family::<ChainLabels, Counter>::default();
        registry.register(
            "chain_verdicts",
            "Rule chain evaluations by chain and verdict",
            chain_verdicts_total.clone(),
        );

        let arp_requests_total = Family::<KindLabels, Counter>::default();
        registry.register(
            "arp_requests",
            "Transmitted ARP requests by kind",
            arp_requests_total.clone(),
        );

        let arp_resolutions_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "arp_resolutions",
            "Completed ARP resolutions by outcome",
            arp_resolutions_total.clone(),
        );

        let arp_cache_entries = Gauge::default();
        registry.register(
            "arp_cache_entries",
            "Entries currently in the ARP cache",
            arp_cache_entries.clone(),
        );

        Self {
            registry,
            packets_total,
            resumes_total,
            route_lookups_total,
            routes_loaded,
            chain_verdicts_total,
            arp_requests_total,
            arp_resolutions_total,
            arp_cache_entries,
        }
    }

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("encoding metrics to string should not fail");
        buffer
    }
}

impl Default for ForwardingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ── Port trait implementations ──────────────────────────────────────

impl PipelineMetrics for ForwardingMetrics {
    fn record_packet(&self, in_port: &str, outcome: &str) {
        self.packets_total
            .get_or_create(&PacketLabels {
                port: in_port.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    fn record_resume(&self, emitted: bool) {
        self.resumes_total
            .get_or_create(&OutcomeLabels {
                outcome: if emitted { "emitted" } else { "dropped" }.to_string(),
            })
            .inc();
    }
}

impl RoutingMetrics for ForwardingMetrics {
    fn record_route_lookup(&self, outcome: &str) {
        self.route_lookups_total
            .get_or_create(&OutcomeLabels {
                outcome: outcome.to_string(),
            })
            .inc();
    }

    fn set_routes_loaded(&self, count: u64) {
        self.routes_loaded.set(count.try_into().unwrap_or(i64::MAX));
    }

    fn record_chain_verdict(&self, chain: &str, verdict: &str) {
        self.chain_verdicts_total
            .get_or_create(&ChainLabels {
                chain: chain.to_string(),
                verdict: verdict.to_string(),
            })
            .inc();
    }
}

impl ArpMetrics for ForwardingMetrics {
    fn record_arp_request(&self, kind: &str) {
        self.arp_requests_total
            .get_or_create(&KindLabels {
                kind: kind.to_string(),
            })
            .inc();
    }

    fn record_arp_resolution(&self, outcome: &str) {
        self.arp_resolutions_total
            .get_or_create(&OutcomeLabels {
                outcome: outcome.to_string(),
            })
            .inc();
    }

    fn set_arp_cache_size(&self, size: u64) {
        self.arp_cache_entries
            .set(size.try_into().unwrap_or(i64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_encode() {
        let metrics = ForwardingMetrics::new();
        metrics.record_packet("uplink", "forward");
        metrics.record_route_lookup("port");
        metrics.set_routes_loaded(3);
        metrics.record_arp_request("initial");
        metrics.set_arp_cache_size(1);

        let out = metrics.encode();
        assert!(out.contains("vrouterd_packets_total"));
        assert!(out.contains("outcome=\"forward\""));
        assert!(out.contains("vrouterd_routes_loaded 3"));
        assert!(out.contains("vrouterd_arp_requests_total"));
    }

    #[test]
    fn counters_accumulate_per_label() {
        let metrics = ForwardingMetrics::new();
        metrics.record_resume(true);
        metrics.record_resume(true);
        metrics.record_resume(false);
        let out = metrics.encode();
        assert!(out.contains("outcome=\"emitted\"} 2"));
        assert!(out.contains("outcome=\"dropped\"} 1"));
    }
}
