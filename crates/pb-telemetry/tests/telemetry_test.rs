use pb_telemetry::metrics::{FetchMetrics, Outcome};
use pb_telemetry::tracing_setup::{create_refresh_span, generate_trace_id};

#[test]
fn test_prometheus_export_has_all_families() {
    let m = FetchMetrics::new();
    m.record_outcome("ideas", Outcome::Ok);
    m.record_outcome("ideas", Outcome::Discarded);
    m.set_records("ideas", 42);
    m.observe_duration("ideas", 0.2);

    let output = m.export_prometheus();
    assert!(output.contains("# TYPE pulseboard_fetch_total counter"));
    assert!(output.contains("pulseboard_fetch_total{feed=\"ideas\",outcome=\"ok\"} 1"));
    assert!(output.contains("pulseboard_fetch_total{feed=\"ideas\",outcome=\"discarded\"} 1"));
    assert!(output.contains("# TYPE pulseboard_records gauge"));
    assert!(output.contains("pulseboard_records{feed=\"ideas\"} 42"));
    assert!(output.contains("# TYPE pulseboard_fetch_duration_seconds histogram"));
    assert!(output.contains("pulseboard_fetch_duration_seconds_bucket{feed=\"ideas\",le=\"0.25\"} 1"));
    assert!(output.contains("pulseboard_fetch_duration_seconds_bucket{feed=\"ideas\",le=\"0.1\"} 0"));
    assert!(output.contains("pulseboard_fetch_duration_seconds_count{feed=\"ideas\"} 1"));
}

#[test]
fn test_empty_export() {
    assert!(FetchMetrics::new().export_prometheus().is_empty());
}

#[test]
fn test_concurrent_outcomes() {
    let m = std::sync::Arc::new(FetchMetrics::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let m = m.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    m.record_outcome("agents", Outcome::Ok);
                    m.observe_duration("agents", 0.01);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(m.outcome_count("agents", Outcome::Ok), 800);
    assert_eq!(m.duration_count("agents"), 800);
}

#[test]
fn test_trace_ids_are_unique() {
    assert_ne!(generate_trace_id(), generate_trace_id());
    let (_span, a) = create_refresh_span("cos_pm", 1);
    let (_span, b) = create_refresh_span("cos_pm", 2);
    assert_ne!(a, b);
}
