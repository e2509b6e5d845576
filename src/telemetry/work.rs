//! Span helpers for item execution.

use tracing::Span;

use crate::model::ResourceKind;

/// Span covering every attempt of one work item.
///
/// `import.attempt` and `import.status` start empty and are filled by
/// [`record_attempt`].
pub fn start_item_span(kind: ResourceKind, realm: &str, name: &str, worker: &str) -> Span {
    tracing::info_span!(
        "import.item",
        "import.kind" = %kind,
        "import.realm" = realm,
        "import.object" = name,
        "import.worker" = worker,
        "import.attempt" = tracing::field::Empty,
        "import.status" = tracing::field::Empty,
    )
}

/// Record the latest attempt number and its status (0 on success or when
/// the failure had no HTTP status).
pub fn record_attempt(span: &Span, attempt: u32, status: u16) {
    span.record("import.attempt", attempt);
    span.record("import.status", status);
    span.in_scope(|| {
        tracing::debug!(attempt, status, "attempt finished");
    });
}
