//! Import engine: worker pool, shared credential, result stream.
//!
//! The [`Dispatcher`] owns everything. Workers pull items off one shared
//! queue and apply them through their own [`Session`]; when a call comes back
//! 401 the session asks the [`CredentialAuthority`] for a fresh token, which is
//! published to every session at once.

pub mod dispatcher;
pub mod progress;
pub mod renewer;
pub mod session;
pub mod worker;

use std::time::Duration;

pub use dispatcher::Dispatcher;
pub use progress::{Progress, Summary};
pub use renewer::CredentialAuthority;
pub use session::Session;
pub use worker::Worker;

/// Pool and retry policy.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Attempts per item, 401 retries included.
    pub max_attempts: u32,
    /// Minimum time between two logins.
    pub renewal_debounce: Duration,
    /// How long a session waits for a new token after reporting expiry.
    pub renewal_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            max_attempts: 3,
            renewal_debounce: Duration::from_secs(5),
            renewal_timeout: Duration::from_secs(30),
        }
    }
}

/// Sent by a session whose token was rejected.
#[derive(Debug, Clone)]
pub struct ExpirySignal {
    pub worker: String,
    /// Generation of the token that was rejected. Reports older than the
    /// published generation do not trigger a login.
    pub generation: u64,
}
