use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static FRAMES: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "courtside_frames_total",
            "Inbound stream frames by normalization and merge outcome",
        ),
        &["outcome"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static RECONNECT_ATTEMPTS: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::with_opts(Opts::new(
        "courtside_reconnect_attempts_total",
        "Reconnection attempts scheduled by the supervisor",
    ))
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static TRANSPORT_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::with_opts(Opts::new(
        "courtside_transport_errors_total",
        "Failed connection attempts and dropped connections",
    ))
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static CONNECTION_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "courtside_connection_transitions_total",
            "Supervisor state transitions by target state",
        ),
        &["state"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub static LIVE_MATCHES: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::with_opts(Opts::new(
        "courtside_live_matches",
        "Matches with status LIVE in the current snapshot",
    ))
    .unwrap();
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

pub const OUTCOME_APPLIED: &str = "applied";
pub const OUTCOME_UNKNOWN_MATCH: &str = "unknown_match";
pub const OUTCOME_IGNORED: &str = "ignored";
pub const OUTCOME_PARSE_ERROR: &str = "parse_error";

pub fn record_frame(outcome: &'static str) {
    FRAMES.with_label_values(&[outcome]).inc();
}

pub fn gather() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %err, "metrics encode failed");
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gathered_text_names_touched_metrics() {
        record_frame(OUTCOME_IGNORED);
        RECONNECT_ATTEMPTS.inc();
        let text = String::from_utf8(gather()).unwrap();
        assert!(text.contains("courtside_frames_total{outcome=\"ignored\"}"));
        assert!(text.contains("courtside_reconnect_attempts_total"));
    }
}
