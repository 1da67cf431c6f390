use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // HTTP
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Quiz flow
    pub static ref QUIZZES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quizzes_total",
        "Quizzes by lifecycle event",
        &["status"]
    )
    .unwrap();

    pub static ref ANSWERS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "answers_submitted_total",
        "Total number of graded answers",
        &["correct"]
    )
    .unwrap();

    // Adaptive engine
    pub static ref DIFFICULTY_TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "difficulty_transitions_total",
        "Difficulty decisions by outcome",
        &["transition"]
    )
    .unwrap();

    pub static ref RECOMMENDATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "recommendations_total",
        "Question recommendations served, by recommended difficulty",
        &["difficulty"]
    )
    .unwrap();

    // Auth
    pub static ref LOGIN_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "login_attempts_total",
        "Login attempts by result",
        &["result"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();
        DIFFICULTY_TRANSITIONS_TOTAL
            .with_label_values(&["hold"])
            .inc();

        let output = render_metrics().unwrap();
        assert!(output.contains("http_requests_total"));
        assert!(output.contains("difficulty_transitions_total"));
    }
}
