use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Records request count and latency per (method, normalized path)
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), path.as_str(), status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method.as_str(), path.as_str()])
        .observe(start.elapsed().as_secs_f64());

    response
}

/// Collapses ids in the path so label cardinality stays bounded
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if is_uuid_like(segment) || is_numeric_id(segment) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// 8-4-4-4-12 hex characters
fn is_uuid_like(s: &str) -> bool {
    s.len() == 36 && s.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/api/v1/quiz/550e8400-e29b-41d4-a716-446655440000/submit"),
            "/api/v1/quiz/{id}/submit"
        );
        assert_eq!(
            normalize_path("/api/v1/questions/550e8400-e29b-41d4-a716-446655440000/student"),
            "/api/v1/questions/{id}/student"
        );
        assert_eq!(
            normalize_path("/api/v1/questions/difficulty/easy"),
            "/api/v1/questions/difficulty/easy"
        );
        assert_eq!(normalize_path("/api/v1/users/42"), "/api/v1/users/{id}");
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[test]
    fn test_id_detection() {
        assert!(is_uuid_like("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_uuid_like("recommendations"));
        assert!(is_numeric_id("123"));
        assert!(!is_numeric_id(""));
    }
}
