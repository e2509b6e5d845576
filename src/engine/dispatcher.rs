//! Dispatcher: the public API for importing realms.
//!
//! Owns the worker pool, the shared work queue, the credential authority and
//! the result stream. Realms are applied in-line by the dispatcher; clients
//! and users go through the queue.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::worker::{SharedQueue, Submission};
use super::{CredentialAuthority, DispatcherConfig, Session, Worker};
use crate::error::{Error, Result};
use crate::identity::{Credentials, IdentityApi};
use crate::model::{
    ClientRepresentation, Outcome, RealmRepresentation, UserRepresentation, WorkItem,
};

/// Identity reported on outcomes produced by the dispatcher itself.
pub const DISPATCHER_IDENTITY: &str = "dispatcher";

pub struct Dispatcher<A: IdentityApi> {
    session: Session<A>,
    queue: mpsc::Sender<Submission>,
    results_tx: mpsc::Sender<Outcome>,
    results_rx: Option<mpsc::Receiver<Outcome>>,
    /// Built at connect time, spawned by `start`.
    idle_workers: Vec<Worker<A>>,
    idle_authority: Option<CredentialAuthority<A>>,
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl<A: IdentityApi> Dispatcher<A> {
    /// Log in and build the pool. Nothing runs until [`start`](Self::start).
    ///
    /// A failed first login is returned as [`Error::Login`].
    pub async fn connect(
        api: Arc<A>,
        credentials: Credentials,
        config: DispatcherConfig,
    ) -> Result<Self> {
        let workers = config.workers.max(1);
        let (expired_tx, expired_rx) = mpsc::channel(workers + 1);
        let authority = CredentialAuthority::login(
            Arc::clone(&api),
            credentials,
            config.renewal_debounce,
            expired_rx,
        )
        .await?;

        let shutdown = CancellationToken::new();
        let (queue_tx, queue_rx) = mpsc::channel(1);
        let queue: SharedQueue = Arc::new(Mutex::new(queue_rx));
        let (results_tx, results_rx) = mpsc::channel(workers);

        let idle_workers = (0..workers)
            .map(|i| {
                let session = Session::new(
                    format!("worker-{i:03}"),
                    Arc::clone(&api),
                    authority.subscribe(),
                    expired_tx.clone(),
                    shutdown.clone(),
                    &config,
                );
                Worker::new(
                    session,
                    Arc::clone(&queue),
                    results_tx.clone(),
                    shutdown.clone(),
                )
            })
            .collect();

        let session = Session::new(
            DISPATCHER_IDENTITY,
            api,
            authority.subscribe(),
            expired_tx,
            shutdown.clone(),
            &config,
        );

        Ok(Self {
            session,
            queue: queue_tx,
            results_tx,
            results_rx: Some(results_rx),
            idle_workers,
            idle_authority: Some(authority),
            handles: Vec::new(),
            shutdown,
        })
    }

    /// Take the result stream. Returns `None` after the first call.
    ///
    /// The stream ends once [`stop`](Self::stop) has joined every worker.
    /// Keep draining it while submitting: workers wait for room in the
    /// stream before taking their next item.
    pub fn results(&mut self) -> Option<mpsc::Receiver<Outcome>> {
        self.results_rx.take()
    }

    /// Spawn the workers and the renewal loop. Returns immediately.
    pub fn start(&mut self) {
        if let Some(authority) = self.idle_authority.take() {
            self.handles
                .push(tokio::spawn(authority.run(self.shutdown.clone())));
        }
        let workers = std::mem::take(&mut self.idle_workers);
        info!(workers = workers.len(), "starting workers");
        self.handles
            .extend(workers.into_iter().map(|w| tokio::spawn(w.run())));
    }

    /// Stop every worker and the renewal loop, waiting for each to exit.
    ///
    /// Items already taken by a worker finish and report their outcome. If
    /// the result stream was never taken, those outcomes are discarded.
    pub async fn stop(self) {
        let Self {
            results_tx,
            results_rx,
            handles,
            shutdown,
            ..
        } = self;
        shutdown.cancel();
        // Workers blocked on a full, undrained stream fail their send and exit.
        drop(results_rx);
        drop(results_tx);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "task ended abnormally");
            }
        }
        info!("dispatcher stopped");
    }

    /// Apply a realm directly, before any of its clients or users.
    ///
    /// The outcome goes to the result stream like any other.
    pub async fn apply_realm(&mut self, realm: RealmRepresentation) {
        let item = WorkItem::Realm(realm);
        let outcome = self.session.execute(&item).await;
        if self.results_tx.send(outcome).await.is_err() {
            warn!("result stream closed, realm outcome dropped");
        }
    }

    /// Queue a client; returns once a worker has taken it.
    pub async fn apply_client(&self, realm: &str, client: ClientRepresentation) -> Result<()> {
        self.submit(WorkItem::Client {
            realm: realm.to_string(),
            client,
        })
        .await
    }

    /// Queue a user; returns once a worker has taken it.
    pub async fn apply_user(&self, realm: &str, user: UserRepresentation) -> Result<()> {
        self.submit(WorkItem::User {
            realm: realm.to_string(),
            user,
        })
        .await
    }

    async fn submit(&self, item: WorkItem) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Stopped);
        }
        let (accepted, taken) = oneshot::channel();
        self.queue
            .send(Submission { item, accepted })
            .await
            .map_err(|_| Error::Stopped)?;
        tokio::select! {
            taken = taken => taken.map_err(|_| Error::Stopped),
            _ = self.shutdown.cancelled() => Err(Error::Stopped),
        }
    }

    /// Import a whole realm: the realm first, then its users and clients.
    pub async fn import_realm(&mut self, realm: RealmRepresentation) -> Result<()> {
        let Some(realm_id) = realm.id.clone() else {
            return Err(Error::Validation(
                "missing realm id in realm representation".to_string(),
            ));
        };
        let (realm, clients, users) = realm.split();
        info!(
            realm = %realm_id,
            clients = clients.len(),
            users = users.len(),
            "importing realm"
        );

        self.apply_realm(realm).await;
        for user in users {
            self.apply_user(&realm_id, user).await?;
        }
        for client in clients {
            self.apply_client(&realm_id, client).await?;
        }
        Ok(())
    }
}
