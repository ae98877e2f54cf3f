use crate::secondary::metrics_port::{ArpMetrics, PipelineMetrics, RoutingMetrics};

/// No-op implementation of all metrics sub-traits for use in tests.
///
/// All methods inherit the default no-op implementations from the sub-traits.
pub struct NoopMetrics;

impl PipelineMetrics for NoopMetrics {}
impl RoutingMetrics for NoopMetrics {}
impl ArpMetrics for NoopMetrics {}
