//! A worker serves one queued item at a time.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Session;
use crate::identity::IdentityApi;
use crate::model::{Outcome, WorkItem};

/// An item handed to the pool. `accepted` fires when a worker takes it.
#[derive(Debug)]
pub struct Submission {
    pub item: WorkItem,
    pub accepted: oneshot::Sender<()>,
}

/// Receiving end of the work queue, shared by all workers.
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<Submission>>>;

pub struct Worker<A: IdentityApi> {
    session: Session<A>,
    queue: SharedQueue,
    results: mpsc::Sender<Outcome>,
    shutdown: CancellationToken,
}

impl<A: IdentityApi> Worker<A> {
    pub fn new(
        session: Session<A>,
        queue: SharedQueue,
        results: mpsc::Sender<Outcome>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session,
            queue,
            results,
            shutdown,
        }
    }

    pub fn identity(&self) -> &str {
        self.session.identity()
    }

    /// Serve items until shutdown or until the queue closes.
    ///
    /// Waits on the next item, a renewed token and shutdown with equal
    /// priority. An item that has been taken always produces an outcome.
    pub async fn run(mut self) {
        debug!(worker = %self.identity(), "worker started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                changed = self.session.token_changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.session.adopt_latest();
                }
                submission = next(&self.queue) => {
                    let Some(Submission { item, accepted }) = submission else {
                        break;
                    };
                    // The submitter may have given up; the item is ours either way.
                    let _ = accepted.send(());

                    let outcome = self.session.execute(&item).await;
                    if self.results.send(outcome).await.is_err() {
                        info!(worker = %self.identity(), "result stream closed");
                        break;
                    }
                }
            }
        }
        debug!(worker = %self.identity(), "worker stopped");
    }
}

async fn next(queue: &SharedQueue) -> Option<Submission> {
    queue.lock().await.recv().await
}
