use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};
use std::sync::OnceLock;
use tracing::warn;

struct Metrics {
    requests: IntCounterVec,
    finetuned_attempts: IntCounterVec,
    retrieval_generations: HistogramVec,
    accepted_fragments: IntCounterVec,
}

static METRICS: OnceLock<Option<Metrics>> = OnceLock::new();

fn metrics() -> Option<&'static Metrics> {
    METRICS
        .get_or_init(|| match register_all() {
            Ok(m) => Some(m),
            Err(e) => {
                warn!("Metrics registration failed, metrics disabled: {}", e);
                None
            }
        })
        .as_ref()
}

fn register_all() -> prometheus::Result<Metrics> {
    Ok(Metrics {
        requests: register_int_counter_vec!(
            "advisor_requests_total",
            "Answered requests by model path",
            &["model_used"]
        )?,
        finetuned_attempts: register_int_counter_vec!(
            "advisor_finetuned_attempts_total",
            "Calls to the fine-tuned endpoint by outcome",
            &["outcome"]
        )?,
        retrieval_generations: register_histogram_vec!(
            "advisor_retrieval_generations",
            "Extract iterations performed per retrieval loop run",
            &["source"],
            vec![1.0, 2.0, 3.0, 4.0]
        )?,
        accepted_fragments: register_int_counter_vec!(
            "advisor_accepted_fragments_total",
            "Evidence fragments that passed the acceptance threshold",
            &["source"]
        )?,
    })
}

pub fn init() {
    let _ = metrics();
}

pub fn record_request(model_used: &str) {
    if let Some(m) = metrics() {
        m.requests.with_label_values(&[model_used]).inc();
    }
}

pub fn record_finetuned_attempt(outcome: &str) {
    if let Some(m) = metrics() {
        m.finetuned_attempts.with_label_values(&[outcome]).inc();
    }
}

pub fn record_loop_run(source: &str, generations: u32, accepted: usize) {
    if let Some(m) = metrics() {
        m.retrieval_generations
            .with_label_values(&[source])
            .observe(f64::from(generations));
        m.accepted_fragments
            .with_label_values(&[source])
            .inc_by(accepted as u64);
    }
}

/// Text exposition of the default registry.
pub fn render() -> (Vec<u8>, String) {
    use prometheus::{Encoder, TextEncoder};
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        warn!("Metrics encoding failed: {}", e);
    }
    (buffer, encoder.format_type().to_string())
}
