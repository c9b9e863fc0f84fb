//! Destination records and the loader used by the detail page.
//!
//! A destination is owned by the destination-management service: this side only
//! reads it. The loader keeps successfully fetched records for a revalidation
//! window so repeated page views do not hit the service every time.

use crate::client::{RemoteClient, RemoteError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub type DestinationId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: DestinationId,
    pub name: String,
    pub image: String,
    pub district: String,
    pub province: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub climate: String,
    /// Overview paragraphs, rendered in this order.
    pub details: Vec<String>,
    pub activities: Vec<String>,
}

/// A destination as submitted for creation or replacement, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDestination {
    pub name: String,
    pub image: String,
    pub district: String,
    pub province: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub climate: String,
    #[serde(default)]
    pub details: Vec<String>,
    #[serde(default)]
    pub activities: Vec<String>,
}

impl NewDestination {
    pub fn with_id(self, id: DestinationId) -> Destination {
        Destination {
            id,
            name: self.name,
            image: self.image,
            district: self.district,
            province: self.province,
            kind: self.kind,
            climate: self.climate,
            details: self.details,
            activities: self.activities,
        }
    }
}

/// Parses a raw route value into a destination id.
///
/// Only positive integers are accepted; anything else is treated as a failed lookup.
pub fn parse_route_id(raw: &str) -> Option<DestinationId> {
    raw.trim()
        .parse::<DestinationId>()
        .ok()
        .filter(|id| *id > 0)
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("destination {0} not found")]
    NotFound(DestinationId),
    #[error("could not load destination: {0}")]
    Remote(#[source] RemoteError),
}

struct CachedDestination {
    fetched_at: Instant,
    destination: Destination,
}

pub struct DestinationLoader {
    client: RemoteClient,
    revalidate: Duration,
    cache: RwLock<HashMap<DestinationId, CachedDestination>>,
}

impl DestinationLoader {
    pub fn new(client: RemoteClient, revalidate: Duration) -> Self {
        Self {
            client,
            revalidate,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Loads a destination, telling a missing record apart from a failed request.
    pub async fn try_load(&self, id: DestinationId) -> Result<Destination, LoadError> {
        if let Some(destination) = self.fresh(id).await {
            debug!(destination_id = id, "serving destination from cache");
            return Ok(destination);
        }

        match self.client.get_destination(id).await {
            Ok(destination) => {
                self.cache.write().await.insert(
                    id,
                    CachedDestination {
                        fetched_at: Instant::now(),
                        destination: destination.clone(),
                    },
                );
                Ok(destination)
            }
            Err(RemoteError::NotFound) => Err(LoadError::NotFound(id)),
            Err(e) => Err(LoadError::Remote(e)),
        }
    }

    /// Loads a destination, collapsing every failure into `None`.
    ///
    /// Callers cannot distinguish a missing record from a transient error here;
    /// use [`DestinationLoader::try_load`] when that matters.
    pub async fn load(&self, id: DestinationId) -> Option<Destination> {
        match self.try_load(id).await {
            Ok(destination) => Some(destination),
            Err(LoadError::NotFound(_)) => {
                debug!(destination_id = id, "destination not found");
                None
            }
            Err(e) => {
                warn!(destination_id = id, error = %e, "failed to fetch destination");
                None
            }
        }
    }

    /// Loads a destination from an unparsed route value.
    pub async fn load_route(&self, raw: &str) -> Option<Destination> {
        match parse_route_id(raw) {
            Some(id) => self.load(id).await,
            None => {
                debug!(route_value = raw, "route value is not a destination id");
                None
            }
        }
    }

    async fn fresh(&self, id: DestinationId) -> Option<Destination> {
        let cache = self.cache.read().await;
        cache
            .get(&id)
            .filter(|entry| entry.fetched_at.elapsed() < self.revalidate)
            .map(|entry| entry.destination.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{MockRemote, MockState};
    use axum::http::StatusCode;

    fn sigiriya() -> Destination {
        Destination {
            id: 12,
            name: "Sigiriya".to_string(),
            image: "https://images.example/sigiriya.jpg".to_string(),
            district: "Matale".to_string(),
            province: "Central".to_string(),
            kind: "Heritage".to_string(),
            climate: "Dry".to_string(),
            details: vec!["Rock fortress.".to_string(), "Built by King Kashyapa.".to_string()],
            activities: vec!["Hiking".to_string(), "Photography".to_string()],
        }
    }

    #[test]
    fn test_parse_route_id() {
        assert_eq!(parse_route_id("42"), Some(42));
        assert_eq!(parse_route_id(" 7 "), Some(7));
        assert_eq!(parse_route_id("0"), None);
        assert_eq!(parse_route_id("-3"), None);
        assert_eq!(parse_route_id("abc"), None);
        assert_eq!(parse_route_id("4.5"), None);
        assert_eq!(parse_route_id(""), None);
    }

    #[test]
    fn test_destination_uses_type_field_on_the_wire() {
        let json = serde_json::to_value(sigiriya()).unwrap();
        assert_eq!(json["type"], "Heritage");
        assert!(json.get("kind").is_none());
    }

    #[tokio::test]
    async fn test_load_returns_record_unchanged() {
        let mut state = MockState::default();
        state.destinations.insert(12, sigiriya());
        let remote = MockRemote::start(state).await;
        let loader = DestinationLoader::new(remote.client(), Duration::from_secs(3600));

        assert_eq!(loader.load(12).await, Some(sigiriya()));
    }

    #[tokio::test]
    async fn test_missing_destination_is_absent() {
        let remote = MockRemote::start(MockState::default()).await;
        let loader = DestinationLoader::new(remote.client(), Duration::from_secs(3600));

        assert!(matches!(loader.try_load(99).await, Err(LoadError::NotFound(99))));
        assert_eq!(loader.load(99).await, None);
    }

    #[tokio::test]
    async fn test_server_error_is_absent_but_tagged() {
        let mut state = MockState::default();
        state.destinations.insert(12, sigiriya());
        state.destination_status = Some(StatusCode::INTERNAL_SERVER_ERROR);
        let remote = MockRemote::start(state).await;
        let loader = DestinationLoader::new(remote.client(), Duration::from_secs(3600));

        assert!(matches!(
            loader.try_load(12).await,
            Err(LoadError::Remote(RemoteError::Status(StatusCode::INTERNAL_SERVER_ERROR)))
        ));
        assert_eq!(loader.load(12).await, None);
    }

    #[tokio::test]
    async fn test_malformed_body_is_absent() {
        let mut state = MockState::default();
        state.raw_destination_body = Some(r#"{"id": 12, "name": 5}"#.to_string());
        let remote = MockRemote::start(state).await;
        let loader = DestinationLoader::new(remote.client(), Duration::from_secs(3600));

        assert!(matches!(
            loader.try_load(12).await,
            Err(LoadError::Remote(RemoteError::Decode(_)))
        ));
    }

    #[tokio::test]
    async fn test_unparseable_route_value_issues_no_request() {
        let remote = MockRemote::start(MockState::default()).await;
        let loader = DestinationLoader::new(remote.client(), Duration::from_secs(3600));

        assert_eq!(loader.load_route("not-a-number").await, None);
        assert_eq!(loader.load_route("0").await, None);
        assert_eq!(remote.state().await.destination_gets, 0);
    }

    #[tokio::test]
    async fn test_fresh_entries_are_served_from_cache() {
        let mut state = MockState::default();
        state.destinations.insert(12, sigiriya());
        let remote = MockRemote::start(state).await;
        let loader = DestinationLoader::new(remote.client(), Duration::from_secs(3600));

        loader.load(12).await.unwrap();
        loader.load_route("12").await.unwrap();
        assert_eq!(remote.state().await.destination_gets, 1);
    }

    #[tokio::test]
    async fn test_stale_entries_are_refetched() {
        let mut state = MockState::default();
        state.destinations.insert(12, sigiriya());
        let remote = MockRemote::start(state).await;
        let loader = DestinationLoader::new(remote.client(), Duration::ZERO);

        loader.load(12).await.unwrap();
        loader.load(12).await.unwrap();
        assert_eq!(remote.state().await.destination_gets, 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let remote = MockRemote::start(MockState::default()).await;
        let loader = DestinationLoader::new(remote.client(), Duration::from_secs(3600));

        assert_eq!(loader.load(12).await, None);
        remote.state().await.destinations.insert(12, sigiriya());
        assert_eq!(loader.load(12).await, Some(sigiriya()));
    }
}
