use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Local;

use crate::shared::format::format_number;

/// Middleware printing one line per HTTP request:
/// local time, duration, response size, status, method and path.
///
/// Successful responses get a cyan timestamp, everything else yellow.
pub async fn request_logger(req: Request<Body>, next: Next) -> Response {
    let start = std::time::Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    let (parts, body) = response.into_parts();

    // Buffer the body to report its real size
    let (bytes, size) = match to_bytes(body, usize::MAX).await {
        Ok(b) => {
            let size = format_number(b.len());
            (b, size)
        }
        Err(e) => {
            tracing::warn!("Failed to buffer response body for {} {}: {}", method, path, e);
            (Default::default(), "error".to_string())
        }
    };

    let color_code = if parts.status.is_success() { "36" } else { "33" };

    println!(
        "\x1b[{}m{}\x1b[0m | {:>5}ms | {:>12} | {} {:>6} {}",
        color_code,
        Local::now().format("%H:%M:%S"),
        start.elapsed().as_millis(),
        size,
        parts.status.as_u16(),
        method,
        path
    );

    Response::from_parts(parts, Body::from(bytes))
}
