//! Create-or-update on top of [`IdentityApi`].
//!
//! Every call creates first; a 409 falls back to a lookup and an update of
//! the existing object. All failures leave here as [`ClassifiedError`].

use tracing::debug;

use super::IdentityApi;
use crate::error::ClassifiedError;
use crate::model::{ClientRepresentation, RealmRepresentation, UserRepresentation, WorkItem};

/// Apply one work item with the given token.
pub async fn apply<A: IdentityApi + ?Sized>(
    api: &A,
    token: &str,
    item: &WorkItem,
) -> Result<(), ClassifiedError> {
    match item {
        WorkItem::Realm(realm) => apply_realm(api, token, realm).await,
        WorkItem::Client { realm, client } => apply_client(api, token, realm, client).await,
        WorkItem::User { realm, user } => apply_user(api, token, realm, user).await,
    }
}

pub async fn apply_realm<A: IdentityApi + ?Sized>(
    api: &A,
    token: &str,
    realm: &RealmRepresentation,
) -> Result<(), ClassifiedError> {
    let realm_id = realm
        .id
        .as_deref()
        .ok_or_else(|| ClassifiedError::unclassified("missing realm id in realm representation"))?;

    match api.create_realm(token, realm).await.map_err(ClassifiedError::from) {
        Err(err) if err.is_conflict() => {
            debug!(realm = realm_id, "realm exists, updating");
            api.update_realm(token, realm_id, realm).await?;
            Ok(())
        }
        other => other,
    }
}

pub async fn apply_client<A: IdentityApi + ?Sized>(
    api: &A,
    token: &str,
    realm_id: &str,
    client: &ClientRepresentation,
) -> Result<(), ClassifiedError> {
    let client_id = client
        .client_id
        .as_deref()
        .ok_or_else(|| ClassifiedError::unclassified("missing clientId in client representation"))?;

    match api
        .create_client(token, realm_id, client)
        .await
        .map_err(ClassifiedError::from)
    {
        Err(err) if err.is_conflict() => {
            let existing = api.find_clients(token, realm_id, client_id).await?;
            let internal_id = single_id(existing.iter().map(|c| c.id.as_deref()))
                .ok_or_else(|| {
                    ClassifiedError::unclassified(format!(
                        "cannot find client {client_id} in realm {realm_id}"
                    ))
                })?;
            debug!(realm = realm_id, client_id, internal_id, "client exists, updating");
            api.update_client(token, realm_id, internal_id, client).await?;
            Ok(())
        }
        other => other,
    }
}

pub async fn apply_user<A: IdentityApi + ?Sized>(
    api: &A,
    token: &str,
    realm_id: &str,
    user: &UserRepresentation,
) -> Result<(), ClassifiedError> {
    let username = user
        .username
        .as_deref()
        .ok_or_else(|| ClassifiedError::unclassified("missing username in user representation"))?;

    match api
        .create_user(token, realm_id, user)
        .await
        .map_err(ClassifiedError::from)
    {
        Err(err) if err.is_conflict() => {
            let existing = api.find_users(token, realm_id, username).await?;
            let internal_id = single_id(existing.iter().map(|u| u.id.as_deref()))
                .ok_or_else(|| {
                    ClassifiedError::unclassified(format!(
                        "cannot find user {username} in realm {realm_id}"
                    ))
                })?;
            debug!(realm = realm_id, username, internal_id, "user exists, updating");
            api.update_user(token, realm_id, internal_id, user).await?;
            Ok(())
        }
        other => other,
    }
}

/// The internal id of the only match, if there is exactly one.
fn single_id<'a>(mut ids: impl Iterator<Item = Option<&'a str>>) -> Option<&'a str> {
    match (ids.next(), ids.next()) {
        (Some(id), None) => id,
        _ => None,
    }
}
