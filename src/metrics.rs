use lazy_static::lazy_static;
use prometheus::{Counter, Histogram, register_counter, register_histogram};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("pptx_forge_requests_total", "Total number of generation requests").unwrap();
    pub static ref FAILURES_TOTAL: Counter =
        register_counter!("pptx_forge_failures_total", "Requests that ended in an error").unwrap();
    pub static ref CORRECTIVE_PROMPTS: Counter =
        register_counter!("pptx_forge_corrective_prompts_total", "Corrective re-prompts sent after unreadable plans").unwrap();
    pub static ref SLIDES_RENDERED: Counter =
        register_counter!("pptx_forge_slides_rendered_total", "Slides written into output decks").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "pptx_forge_request_latency_seconds",
        "End-to-end request latency in seconds"
    )
    .unwrap();
}
