//! Metric instrument factories.
//!
//! Instruments come from the `"realm-import"` meter on the global
//! `MeterProvider`; without an OTLP endpoint they are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("realm-import")
}

/// Counter: items finished.
/// Labels: `kind` ("realm" | "client" | "user"), `result` ("ok" | "error").
pub fn outcomes() -> Counter<u64> {
    meter()
        .u64_counter("import.outcomes")
        .with_description("Number of work items applied")
        .build()
}

/// Counter: expiry reports handled by the credential authority.
/// Labels: `result` ("ok" | "failed" | "debounced" | "stale").
pub fn token_renewals() -> Counter<u64> {
    meter()
        .u64_counter("import.token.renewals")
        .with_description("Expiry reports and the renewals they caused")
        .build()
}

/// Histogram: duration of a single upsert attempt.
/// Labels: `kind`.
pub fn attempt_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("import.attempt.duration_ms")
        .with_description("Upsert attempt duration in milliseconds")
        .with_unit("ms")
        .build()
}
