use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub commits_total: IntCounter,
    pub transitions_total: IntCounterVec,
    pub optimizer_requests_total: IntCounterVec,
    pub optimizer_latency_seconds: HistogramVec,
    pub active_deliveries: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let commits_total =
            IntCounter::new("commits_total", "Total collection commits persisted")
                .expect("valid commits_total metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Status transitions by action and outcome"),
            &["action", "outcome"],
        )
        .expect("valid transitions_total metric");

        let optimizer_requests_total = IntCounterVec::new(
            Opts::new(
                "optimizer_requests_total",
                "Optimizer gateway calls by outcome",
            ),
            &["outcome"],
        )
        .expect("valid optimizer_requests_total metric");

        let optimizer_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "optimizer_latency_seconds",
                "Latency of optimizer gateway calls in seconds",
            ),
            &["outcome"],
        )
        .expect("valid optimizer_latency_seconds metric");

        let active_deliveries =
            IntGauge::new("active_deliveries", "Deliveries currently in the active route")
                .expect("valid active_deliveries metric");

        registry
            .register(Box::new(commits_total.clone()))
            .expect("register commits_total");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(optimizer_requests_total.clone()))
            .expect("register optimizer_requests_total");
        registry
            .register(Box::new(optimizer_latency_seconds.clone()))
            .expect("register optimizer_latency_seconds");
        registry
            .register(Box::new(active_deliveries.clone()))
            .expect("register active_deliveries");

        Self {
            registry,
            commits_total,
            transitions_total,
            optimizer_requests_total,
            optimizer_latency_seconds,
            active_deliveries,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
