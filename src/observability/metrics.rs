use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub order_transitions_total: IntCounterVec,
    pub hub_connections: IntGauge,
    pub hub_events_total: IntCounterVec,
    pub suggest_latency_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let order_transitions_total = IntCounterVec::new(
            Opts::new(
                "order_transitions_total",
                "Order transitions by action and outcome",
            ),
            &["action", "outcome"],
        )
        .expect("valid order_transitions_total metric");

        let hub_connections = IntGauge::new("hub_connections", "Currently connected realtime clients")
            .expect("valid hub_connections metric");

        let hub_events_total = IntCounterVec::new(
            Opts::new("hub_events_total", "Events emitted by the hub by name"),
            &["event"],
        )
        .expect("valid hub_events_total metric");

        let suggest_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "driver_suggest_latency_seconds",
            "Latency of driver ranking in seconds",
        ))
        .expect("valid driver_suggest_latency_seconds metric");

        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(hub_connections.clone()))
            .expect("register hub_connections");
        registry
            .register(Box::new(hub_events_total.clone()))
            .expect("register hub_events_total");
        registry
            .register(Box::new(suggest_latency_seconds.clone()))
            .expect("register driver_suggest_latency_seconds");

        Self {
            registry,
            order_transitions_total,
            hub_connections,
            hub_events_total,
            suggest_latency_seconds,
        }
    }

    pub fn record_transition(&self, action: &str, outcome: &str) {
        self.order_transitions_total
            .with_label_values(&[action, outcome])
            .inc();
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

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
