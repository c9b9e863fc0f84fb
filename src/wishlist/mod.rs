//! Per-tourist wishlists ("Dream List") and the upsert that adds a destination to one.
//!
//! The client-side upsert is a single pass: read the tourist's wishlist, then either
//! create it or patch its destinations. Nothing is retried. Two concurrent upserts
//! for the same tourist can both observe the same state and race on the write; the
//! server-side add-if-absent endpoint ([`WishlistService::add_atomic`]) does not.

use crate::client::{RemoteClient, RemoteError};
use crate::destination::DestinationId;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

pub type WishlistId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TouristId(pub i64);

impl fmt::Display for TouristId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wishlist {
    pub id: WishlistId,
    pub tourist_id: TouristId,
    #[serde(default, deserialize_with = "lenient_ids")]
    pub destinations: Vec<DestinationId>,
}

impl Wishlist {
    pub fn contains(&self, destination: DestinationId) -> bool {
        self.destinations.contains(&destination)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWishlist {
    pub tourist_id: TouristId,
    #[serde(default, deserialize_with = "lenient_ids")]
    pub destinations: Vec<DestinationId>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

// Older stores kept ids as strings; a missing or null list means empty.
fn lenient_ids<'de, D>(deserializer: D) -> Result<Vec<DestinationId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<RawId>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|id| match id {
            RawId::Number(n) => Ok(n),
            RawId::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid destination id {s:?}"))),
        })
        .collect()
}

/// Decodes the body of a wishlist read.
///
/// An empty body or a falsy value (`null`, `false`, `0`, `""`) means the tourist has
/// no wishlist yet.
pub fn decode_wishlist_body(body: &[u8]) -> Result<Option<Wishlist>, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice::<serde_json::Value>(body)? {
        serde_json::Value::Null | serde_json::Value::Bool(false) => Ok(None),
        serde_json::Value::String(s) if s.is_empty() => Ok(None),
        serde_json::Value::Number(n) if n.as_f64() == Some(0.0) => Ok(None),
        value => serde_json::from_value(value).map(Some),
    }
}

/// Removes repeated ids, keeping the first occurrence of each.
pub fn dedup_preserving_order<I>(ids: I) -> Vec<DestinationId>
where
    I: IntoIterator<Item = DestinationId>,
{
    let mut unique = Vec::new();
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}

/// What an upsert has to write, given what the store currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertPlan {
    Create(NewWishlist),
    Append {
        wishlist_id: WishlistId,
        destinations: Vec<DestinationId>,
    },
    AlreadyPresent,
}

pub fn plan_upsert(
    existing: Option<&Wishlist>,
    tourist: TouristId,
    destination: DestinationId,
) -> UpsertPlan {
    match existing {
        None => UpsertPlan::Create(NewWishlist {
            tourist_id: tourist,
            destinations: vec![destination],
        }),
        Some(wishlist) if wishlist.contains(destination) => UpsertPlan::AlreadyPresent,
        Some(wishlist) => {
            let mut destinations = wishlist.destinations.clone();
            destinations.push(destination);
            UpsertPlan::Append {
                wishlist_id: wishlist.id,
                destinations,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Appended,
    AlreadyPresent,
}

/// Response of the server-side add-if-absent endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddDestinationResponse {
    pub outcome: UpsertOutcome,
    pub wishlist: Wishlist,
}

#[derive(Debug, thiserror::Error)]
pub enum UpsertError {
    #[error("could not read wishlist")]
    ReadFailed(#[source] RemoteError),
    #[error("could not create wishlist")]
    CreateFailed(#[source] RemoteError),
    #[error("could not update wishlist")]
    UpdateFailed(#[source] RemoteError),
    #[error("could not add destination to wishlist")]
    AddFailed(#[source] RemoteError),
}

impl UpsertError {
    pub fn remote(&self) -> &RemoteError {
        match self {
            UpsertError::ReadFailed(e)
            | UpsertError::CreateFailed(e)
            | UpsertError::UpdateFailed(e)
            | UpsertError::AddFailed(e) => e,
        }
    }
}

/// Upserts in flight, counted per tourist. Tourists with none have no entry.
type InFlight = Arc<Mutex<HashMap<TouristId, usize>>>;

/// Marks one upsert for a tourist as in flight until dropped.
struct Adding {
    in_flight: InFlight,
    tourist: TouristId,
}

impl Adding {
    fn begin(in_flight: &InFlight, tourist: TouristId) -> Self {
        let mut counts = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        *counts.entry(tourist).or_insert(0) += 1;
        Adding {
            in_flight: in_flight.clone(),
            tourist,
        }
    }
}

impl Drop for Adding {
    fn drop(&mut self) {
        let mut counts = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = counts.get_mut(&self.tourist) {
            *count -= 1;
            if *count == 0 {
                counts.remove(&self.tourist);
            }
        }
    }
}

#[derive(Clone)]
pub struct WishlistService {
    client: RemoteClient,
    in_flight: InFlight,
}

impl WishlistService {
    pub fn new(client: RemoteClient) -> Self {
        Self {
            client,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// True while an upsert for `tourist` started through this service has not reached a
    /// terminal state. Other tourists' upserts do not count.
    pub fn is_adding(&self, tourist: TouristId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&tourist)
    }

    /// Ensures `destination` is in the tourist's wishlist by reading it and writing back.
    ///
    /// Re-adding a destination that is already present issues no write.
    pub async fn add_to_wishlist(
        &self,
        tourist: TouristId,
        destination: DestinationId,
    ) -> Result<UpsertOutcome, UpsertError> {
        let _adding = Adding::begin(&self.in_flight, tourist);

        let existing = self
            .client
            .get_wishlist(tourist)
            .await
            .map_err(|e| logged(UpsertError::ReadFailed(e), tourist, destination))?;

        match plan_upsert(existing.as_ref(), tourist, destination) {
            UpsertPlan::AlreadyPresent => {
                info!(%tourist, destination, "destination already in wishlist");
                Ok(UpsertOutcome::AlreadyPresent)
            }
            UpsertPlan::Create(new_wishlist) => {
                self.client
                    .create_wishlist(&new_wishlist)
                    .await
                    .map_err(|e| logged(UpsertError::CreateFailed(e), tourist, destination))?;
                info!(%tourist, destination, "created wishlist");
                Ok(UpsertOutcome::Created)
            }
            UpsertPlan::Append {
                wishlist_id,
                destinations,
            } => {
                self.client
                    .update_wishlist_destinations(wishlist_id, &destinations)
                    .await
                    .map_err(|e| logged(UpsertError::UpdateFailed(e), tourist, destination))?;
                info!(%tourist, destination, wishlist_id, "appended destination to wishlist");
                Ok(UpsertOutcome::Appended)
            }
        }
    }

    /// Same guarantee as [`WishlistService::add_to_wishlist`], decided by the server in one step.
    pub async fn add_atomic(
        &self,
        tourist: TouristId,
        destination: DestinationId,
    ) -> Result<UpsertOutcome, UpsertError> {
        let _adding = Adding::begin(&self.in_flight, tourist);

        let response = self
            .client
            .add_destination_atomic(tourist, destination)
            .await
            .map_err(|e| logged(UpsertError::AddFailed(e), tourist, destination))?;
        info!(%tourist, destination, outcome = ?response.outcome, "wishlist add-if-absent");
        Ok(response.outcome)
    }
}

fn logged(err: UpsertError, tourist: TouristId, destination: DestinationId) -> UpsertError {
    error!(%tourist, destination, cause = %err.remote(), "{}", err);
    err
}
