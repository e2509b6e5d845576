//! Core data model.
//!
//! Representations mirror the Keycloak admin JSON: the fields the importer
//! needs are typed, everything else is carried through untouched. A work
//! item is one upsert, an outcome is what happened to it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClassifiedError;

// ---------------------------------------------------------------------------
// Representations
// ---------------------------------------------------------------------------

/// A realm definition as found in a realm export file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealmRepresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients: Option<Vec<ClientRepresentation>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserRepresentation>>,

    /// Every other realm attribute, passed to the server as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RealmRepresentation {
    /// Detach the clients and users so the realm itself can be applied first.
    ///
    /// The returned realm carries empty client and user lists.
    pub fn split(mut self) -> (Self, Vec<ClientRepresentation>, Vec<UserRepresentation>) {
        let clients = self.clients.replace(Vec::new()).unwrap_or_default();
        let users = self.users.replace(Vec::new()).unwrap_or_default();
        (self, clients, users)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientRepresentation {
    /// Server-side internal id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRepresentation {
    /// Server-side internal id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// Kind of resource an upsert targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Realm,
    Client,
    User,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::Realm => "realm",
            ResourceKind::Client => "client",
            ResourceKind::User => "user",
        };
        write!(f, "{s}")
    }
}

/// A unit of import work. Immutable once submitted.
#[derive(Debug, Clone)]
pub enum WorkItem {
    Realm(RealmRepresentation),
    Client {
        realm: String,
        client: ClientRepresentation,
    },
    User {
        realm: String,
        user: UserRepresentation,
    },
}

impl WorkItem {
    pub fn kind(&self) -> ResourceKind {
        match self {
            WorkItem::Realm(_) => ResourceKind::Realm,
            WorkItem::Client { .. } => ResourceKind::Client,
            WorkItem::User { .. } => ResourceKind::User,
        }
    }

    /// Target realm identifier. Empty for a realm without an id.
    pub fn realm_id(&self) -> &str {
        match self {
            WorkItem::Realm(realm) => realm.id.as_deref().unwrap_or_default(),
            WorkItem::Client { realm, .. } | WorkItem::User { realm, .. } => realm,
        }
    }

    /// Human name of the object: clientId or username. None for realms.
    pub fn name(&self) -> Option<&str> {
        match self {
            WorkItem::Realm(_) => None,
            WorkItem::Client { client, .. } => client.client_id.as_deref(),
            WorkItem::User { user, .. } => user.username.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// An access token and when it was obtained.
///
/// Never mutated: a renewal publishes a new `Arc<Credential>`.
#[derive(Debug)]
pub struct Credential {
    pub token: SecretString,
    pub issued_at: DateTime<Utc>,
    /// 0 for the initial login, incremented by each renewal.
    pub generation: u64,
}

impl Credential {
    pub fn new(token: SecretString, generation: u64) -> Arc<Self> {
        Arc::new(Self {
            token,
            issued_at: Utc::now(),
            generation,
        })
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of applying one work item. Exactly one per accepted item.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub kind: ResourceKind,
    pub realm: String,
    pub name: Option<String>,
    pub success: bool,
    pub error: Option<ClassifiedError>,
    /// Number of failed attempts.
    pub retries: u32,
    /// Identity of the worker (or "dispatcher") that produced it.
    pub worker: String,
}

impl Outcome {
    pub fn new(
        worker: impl Into<String>,
        item: &WorkItem,
        error: Option<ClassifiedError>,
        retries: u32,
    ) -> Self {
        Self {
            kind: item.kind(),
            realm: item.realm_id().to_string(),
            name: item.name().map(str::to_string),
            success: error.is_none(),
            error,
            retries,
            worker: worker.into(),
        }
    }

    /// "realm r1" or "client r1/my-app".
    pub fn object_name(&self) -> String {
        match self.kind {
            ResourceKind::Realm => format!("realm {}", self.realm),
            kind => format!(
                "{kind} {}/{}",
                self.realm,
                self.name.as_deref().unwrap_or_default()
            ),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verdict = if self.success { "Success" } else { "Failure" };
        write!(f, "{} => {verdict}(type = {}, realm = {}", self.worker, self.kind, self.realm)?;
        if self.kind != ResourceKind::Realm {
            write!(f, ", name = {}", self.name.as_deref().unwrap_or_default())?;
        }
        write!(f, ")")?;
        if let Some(ref err) = self.error {
            write!(f, ": {err}")?;
        }
        Ok(())
    }
}
