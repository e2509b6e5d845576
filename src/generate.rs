//! Synthetic realm files for load testing an import.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{ClientRepresentation, RealmRepresentation, UserRepresentation};

/// `realms` realms, each with `clients` clients and `users` users.
///
/// Realm ids are zero-padded to three digits, client ids and usernames to six.
pub fn generate_realms(realms: usize, clients: usize, users: usize) -> Vec<RealmRepresentation> {
    (0..realms)
        .map(|r| generate_realm(&format!("{r:03}"), clients, users))
        .collect()
}

pub fn generate_realm(id: &str, clients: usize, users: usize) -> RealmRepresentation {
    RealmRepresentation {
        id: Some(id.to_string()),
        realm: Some(id.to_string()),
        clients: Some((0..clients).map(generate_client).collect()),
        users: Some((0..users).map(generate_user).collect()),
        extra: object(json!({ "enabled": true })),
    }
}

fn generate_client(n: usize) -> ClientRepresentation {
    ClientRepresentation {
        id: None,
        client_id: Some(format!("{n:06}")),
        extra: object(json!({
            "enabled": true,
            "publicClient": false,
            "secret": Uuid::new_v4().to_string(),
            "serviceAccountsEnabled": true,
        })),
    }
}

fn generate_user(n: usize) -> UserRepresentation {
    let username = format!("{n:06}");
    UserRepresentation {
        id: None,
        extra: object(json!({
            "enabled": true,
            "email": format!("{username}@example.test"),
            "credentials": [{ "type": "password", "value": username, "temporary": false }],
        })),
        username: Some(username),
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Write each realm to `dir/realm-<id>.json`, creating `dir` if needed.
pub fn write_realm_files(dir: &Path, realms: &[RealmRepresentation]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(realms.len());
    for realm in realms {
        let id = realm.id.as_deref().unwrap_or("unnamed");
        let path = dir.join(format!("realm-{id}.json"));
        std::fs::write(&path, serde_json::to_vec_pretty(realm)?)?;
        info!(path = %path.display(), "realm file written");
        written.push(path);
    }
    Ok(written)
}
