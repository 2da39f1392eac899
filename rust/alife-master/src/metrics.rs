// alife-master: Prometheus metrics

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

use crate::error::MasterResult;

/// All instruments exported on /metrics, registered on one registry.
pub struct MasterMetrics {
    registry: Registry,

    /// The amount of buckets cells are currently distributed in.
    pub buckets_count: Gauge,
    /// The average number of cells throughout all buckets.
    pub buckets_average_cell_count: Gauge,
    /// The median number of cells throughout all buckets.
    pub buckets_median_cell_count: Gauge,
    /// The amount of cells the bucket with the least cells contains.
    pub buckets_min_cell_count: Gauge,
    /// The amount of cells the bucket with the most cells contains.
    pub buckets_max_cell_count: Gauge,

    /// The number of live CIS clients in the pool.
    pub cis_client_count: IntGauge,
    /// The number of times a CIS instance got called.
    pub cis_call_count: IntCounter,
    /// The amount of time it takes a CIS to respond to a call, in seconds.
    pub cis_call_duration_seconds: Histogram,

    /// The number of currently active websocket connections.
    pub websocket_connections_count: IntGauge,
}

impl MasterMetrics {
    pub fn new() -> MasterResult<Self> {
        let registry = Registry::new();

        let buckets_count = Gauge::new(
            "buckets_count",
            "the amount of buckets cells are currently distributed in",
        )?;
        let buckets_average_cell_count = Gauge::new(
            "buckets_average_cell_count",
            "the average number of cells throughout all buckets",
        )?;
        let buckets_median_cell_count = Gauge::new(
            "buckets_median_cell_count",
            "the median number of cells throughout all buckets",
        )?;
        let buckets_min_cell_count = Gauge::new(
            "buckets_min_cell_count",
            "the amount of cells the bucket with the least cells contains",
        )?;
        let buckets_max_cell_count = Gauge::new(
            "buckets_max_cell_count",
            "the amount of cells the bucket with the most cells contains",
        )?;
        let cis_client_count = IntGauge::new(
            "cis_client_count",
            "the number of used CIS clients",
        )?;
        let cis_call_count = IntCounter::new(
            "cis_call_count",
            "the number of times a CIS instance got called",
        )?;
        let cis_call_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "cis_call_duration_seconds",
                "the amount of time it takes a CIS to respond to a call in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
        )?;
        let websocket_connections_count = IntGauge::new(
            "websocket_connections_count",
            "the number of currently active websocket connections",
        )?;

        registry.register(Box::new(buckets_count.clone()))?;
        registry.register(Box::new(buckets_average_cell_count.clone()))?;
        registry.register(Box::new(buckets_median_cell_count.clone()))?;
        registry.register(Box::new(buckets_min_cell_count.clone()))?;
        registry.register(Box::new(buckets_max_cell_count.clone()))?;
        registry.register(Box::new(cis_client_count.clone()))?;
        registry.register(Box::new(cis_call_count.clone()))?;
        registry.register(Box::new(cis_call_duration_seconds.clone()))?;
        registry.register(Box::new(websocket_connections_count.clone()))?;

        Ok(Self {
            registry,
            buckets_count,
            buckets_average_cell_count,
            buckets_median_cell_count,
            buckets_min_cell_count,
            buckets_max_cell_count,
            cis_client_count,
            cis_call_count,
            cis_call_duration_seconds,
            websocket_connections_count,
        })
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn encode_text(&self) -> MasterResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| crate::error::MasterError::Metrics(e.to_string()))
    }
}
