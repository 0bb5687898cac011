use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub lifecycle_transitions_total: IntCounterVec,
    pub broadcasts_total: IntCounterVec,
    pub location_updates_total: IntCounterVec,
    pub connected_sessions: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let lifecycle_transitions_total = IntCounterVec::new(
            Opts::new(
                "lifecycle_transitions_total",
                "Trip and ride-request transitions by outcome",
            ),
            &["transition", "outcome"],
        )
        .expect("valid lifecycle_transitions_total metric");

        let broadcasts_total = IntCounterVec::new(
            Opts::new("broadcasts_total", "Room broadcasts by event name"),
            &["event"],
        )
        .expect("valid broadcasts_total metric");

        let location_updates_total = IntCounterVec::new(
            Opts::new("location_updates_total", "Accepted location updates by role"),
            &["role"],
        )
        .expect("valid location_updates_total metric");

        let connected_sessions =
            IntGauge::new("connected_sessions", "Currently connected realtime sessions")
                .expect("valid connected_sessions metric");

        registry
            .register(Box::new(lifecycle_transitions_total.clone()))
            .expect("register lifecycle_transitions_total");
        registry
            .register(Box::new(broadcasts_total.clone()))
            .expect("register broadcasts_total");
        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");
        registry
            .register(Box::new(connected_sessions.clone()))
            .expect("register connected_sessions");

        Self {
            registry,
            lifecycle_transitions_total,
            broadcasts_total,
            location_updates_total,
            connected_sessions,
        }
    }

    pub fn observe_transition(&self, transition: &str, ok: bool) {
        let outcome = if ok { "success" } else { "failure" };
        self.lifecycle_transitions_total
            .with_label_values(&[transition, outcome])
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
