//! Token-bearing handle used by workers and the dispatcher.
//!
//! A session holds its own copy of the current credential and the attempt
//! loop. It never writes the credential anywhere: renewals arrive through the
//! watch channel published by the [`CredentialAuthority`](super::CredentialAuthority).

use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use secrecy::ExposeSecret;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, warn};

use super::{DispatcherConfig, ExpirySignal};
use crate::error::ClassifiedError;
use crate::identity::{IdentityApi, upsert};
use crate::model::{Credential, Outcome, WorkItem};
use crate::telemetry::metrics;
use crate::telemetry::work::{record_attempt, start_item_span};

pub struct Session<A: IdentityApi> {
    identity: String,
    api: Arc<A>,
    tokens: watch::Receiver<Arc<Credential>>,
    current: Arc<Credential>,
    expired: mpsc::Sender<ExpirySignal>,
    shutdown: CancellationToken,
    max_attempts: u32,
    renewal_timeout: Duration,
}

impl<A: IdentityApi> Session<A> {
    pub fn new(
        identity: impl Into<String>,
        api: Arc<A>,
        mut tokens: watch::Receiver<Arc<Credential>>,
        expired: mpsc::Sender<ExpirySignal>,
        shutdown: CancellationToken,
        config: &DispatcherConfig,
    ) -> Self {
        let current = Arc::clone(&tokens.borrow_and_update());
        Self {
            identity: identity.into(),
            api,
            tokens,
            current,
            expired,
            shutdown,
            max_attempts: config.max_attempts.max(1),
            renewal_timeout: config.renewal_timeout,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Switch to the most recently published credential.
    pub fn adopt_latest(&mut self) {
        let latest = Arc::clone(&self.tokens.borrow_and_update());
        if latest.generation != self.current.generation {
            debug!(
                worker = %self.identity,
                generation = latest.generation,
                "adopted renewed token"
            );
        }
        self.current = latest;
    }

    /// Resolves when a credential newer than the adopted one is published.
    ///
    /// Errors once the authority has gone away.
    pub async fn token_changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.tokens.changed().await
    }

    /// Apply `item`, retrying up to the attempt budget. Always yields an outcome.
    pub async fn execute(&mut self, item: &WorkItem) -> Outcome {
        let span = start_item_span(
            item.kind(),
            item.realm_id(),
            item.name().unwrap_or_default(),
            &self.identity,
        );
        let outcome = self.attempt_loop(item, &span).instrument(span.clone()).await;

        let result = if outcome.success { "ok" } else { "error" };
        metrics::outcomes().add(
            1,
            &[
                KeyValue::new("kind", outcome.kind.to_string()),
                KeyValue::new("result", result),
            ],
        );
        outcome
    }

    async fn attempt_loop(&mut self, item: &WorkItem, span: &Span) -> Outcome {
        let mut failures = 0;
        let mut last_error: Option<ClassifiedError> = None;

        for attempt in 1..=self.max_attempts {
            self.adopt_latest();

            let started = Instant::now();
            let result = upsert::apply(&*self.api, self.current.token.expose_secret(), item).await;
            metrics::attempt_duration_ms().record(
                started.elapsed().as_secs_f64() * 1000.0,
                &[KeyValue::new("kind", item.kind().to_string())],
            );

            let err = match result {
                Ok(()) => {
                    record_attempt(span, attempt, 0);
                    last_error = None;
                    break;
                }
                Err(err) => err,
            };

            failures += 1;
            record_attempt(span, attempt, err.status_code);
            warn!(
                worker = %self.identity,
                attempt,
                status = err.status_code,
                error = %err.message,
                "attempt failed"
            );

            let unauthorized = err.is_unauthorized();
            last_error = Some(err);
            if attempt == self.max_attempts {
                break;
            }
            if unauthorized && !self.await_renewal().await {
                break;
            }
        }

        Outcome::new(self.identity.clone(), item, last_error, failures)
    }

    /// Report the rejected token and wait for its replacement.
    ///
    /// Returns false when the item should not be retried any further
    /// (shutdown requested, or the authority is gone). A timeout returns
    /// true: the next attempt runs with whatever token is current and will
    /// report expiry again if needed.
    async fn await_renewal(&mut self) -> bool {
        let signal = ExpirySignal {
            worker: self.identity.clone(),
            generation: self.current.generation,
        };
        // A full queue already holds a pending expiry report.
        if let Err(mpsc::error::TrySendError::Closed(_)) = self.expired.try_send(signal) {
            warn!(worker = %self.identity, "credential authority is gone");
            return false;
        }

        tokio::select! {
            changed = self.tokens.changed() => changed.is_ok(),
            _ = self.shutdown.cancelled() => {
                info!(worker = %self.identity, "shutdown while waiting for a renewed token");
                false
            }
            _ = tokio::time::sleep(self.renewal_timeout) => {
                warn!(
                    worker = %self.identity,
                    timeout_ms = self.renewal_timeout.as_millis() as u64,
                    "no renewed token in time, retrying with current one"
                );
                true
            }
        }
    }
}
