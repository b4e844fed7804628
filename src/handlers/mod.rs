mod form;
mod generate;
mod health;
mod metrics;
mod preview;

use axum::http::{HeaderValue, header};
use axum::response::Response;

pub use form::{FormFields, check_api_key};
pub use generate::{generate_handler, output_filename};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use preview::preview_handler;

// Headers added to every response
pub async fn security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    response
}
