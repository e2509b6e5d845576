//! Credential authority: serializes logins and publishes renewed tokens.
//!
//! Expiry reports from all sessions funnel into one loop. A report about a
//! token that has already been replaced, or arriving within the debounce
//! window of the last login, is dropped; the reporter is released by the
//! token that login already published. Otherwise the
//! authority logs in once and replaces the watched credential, which every
//! session observes in the same step.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::ExpirySignal;
use crate::error::{ClassifiedError, Error, Result};
use crate::identity::{Credentials, IdentityApi};
use crate::model::Credential;
use crate::telemetry::metrics;

pub struct CredentialAuthority<A: IdentityApi> {
    api: Arc<A>,
    credentials: Credentials,
    debounce: Duration,
    last_renewal: Instant,
    generation: u64,
    tokens: watch::Sender<Arc<Credential>>,
    signals: mpsc::Receiver<ExpirySignal>,
}

impl<A: IdentityApi> CredentialAuthority<A> {
    /// Log in for the first time.
    ///
    /// Fails with [`Error::Login`]: without a first token nothing can start.
    pub async fn login(
        api: Arc<A>,
        credentials: Credentials,
        debounce: Duration,
        signals: mpsc::Receiver<ExpirySignal>,
    ) -> Result<Self> {
        let token = api
            .login(&credentials)
            .await
            .map_err(|e| Error::Login(ClassifiedError::from(e)))?;
        info!(realm = %credentials.realm, login = %credentials.login, "logged in");

        let (tokens, _) = watch::channel(Credential::new(token, 0));
        Ok(Self {
            api,
            credentials,
            debounce,
            last_renewal: Instant::now(),
            generation: 0,
            tokens,
            signals,
        })
    }

    /// A new receiver of published credentials, starting at the current one.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Credential>> {
        self.tokens.subscribe()
    }

    /// Serve expiry reports until shutdown.
    pub async fn run(mut self, shutdown: CancellationToken) {
        debug!("credential authority started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                signal = self.signals.recv() => match signal {
                    Some(signal) => self.on_expired(signal).await,
                    None => break,
                },
            }
        }
        debug!("credential authority stopped");
    }

    async fn on_expired(&mut self, signal: ExpirySignal) {
        if signal.generation < self.generation {
            debug!(
                worker = %signal.worker,
                generation = signal.generation,
                current = self.generation,
                "expiry report for a replaced token, ignoring"
            );
            metrics::token_renewals().add(1, &[KeyValue::new("result", "stale")]);
            return;
        }

        let since = self.last_renewal.elapsed();
        if since < self.debounce {
            debug!(
                worker = %signal.worker,
                generation = signal.generation,
                since_ms = since.as_millis() as u64,
                "token renewed recently, ignoring expiry report"
            );
            metrics::token_renewals().add(1, &[KeyValue::new("result", "debounced")]);
            return;
        }

        let token = match self.api.login(&self.credentials).await {
            Ok(token) => token,
            Err(e) => {
                error!(worker = %signal.worker, error = %e, "cannot renew token");
                metrics::token_renewals().add(1, &[KeyValue::new("result", "failed")]);
                return;
            }
        };

        self.last_renewal = Instant::now();
        self.generation += 1;
        self.tokens.send_replace(Credential::new(token, self.generation));
        metrics::token_renewals().add(1, &[KeyValue::new("result", "ok")]);
        info!(
            worker = %signal.worker,
            generation = self.generation,
            "token renewed"
        );
    }
}
