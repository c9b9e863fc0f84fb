//! HTTP client for the destination-management service.

#[cfg(test)]
pub mod mock;

use crate::config::RemoteConfig;
use crate::destination::{Destination, DestinationId};
use crate::wishlist::{decode_wishlist_body, AddDestinationResponse, NewWishlist, TouristId, Wishlist, WishlistId};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Error from destination-management service calls.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("resource not found")]
    NotFound,
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("service error: HTTP {0}")]
    Status(StatusCode),
    #[error("parse error: {0}")]
    Decode(String),
}

#[derive(Clone, Debug)]
pub struct RemoteClient {
    client: Client,
    base_url: String,
}

impl RemoteClient {
    /// Create a client with no request timeout.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the service (e.g., "http://127.0.0.1:8000")
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self, RemoteError> {
        match config.timeout() {
            Some(timeout) => Self::with_timeout(&config.base_url, timeout),
            None => Ok(Self::new(&config.base_url)),
        }
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /destinations/destination/{id}`
    pub async fn get_destination(&self, id: DestinationId) -> Result<Destination, RemoteError> {
        let response = self
            .client
            .get(self.url(&format!("/destinations/destination/{id}")))
            .send()
            .await?;
        decode_json(checked(response)?).await
    }

    /// `GET /wishlist/{touristId}`; `None` when the tourist has no wishlist yet.
    pub async fn get_wishlist(&self, tourist: TouristId) -> Result<Option<Wishlist>, RemoteError> {
        let response = self
            .client
            .get(self.url(&format!("/wishlist/{tourist}")))
            .send()
            .await?;
        let body = checked(response)?.bytes().await?;
        decode_wishlist_body(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    /// `POST /wishlist/add`
    pub async fn create_wishlist(&self, wishlist: &NewWishlist) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(self.url("/wishlist/add"))
            .json(wishlist)
            .send()
            .await?;
        checked(response)?;
        Ok(())
    }

    /// `PATCH /wishlist/{wishlistId}/update-destinations` with the full replacement list.
    pub async fn update_wishlist_destinations(
        &self,
        wishlist_id: WishlistId,
        destinations: &[DestinationId],
    ) -> Result<(), RemoteError> {
        let response = self
            .client
            .patch(self.url(&format!("/wishlist/{wishlist_id}/update-destinations")))
            .json(destinations)
            .send()
            .await?;
        checked(response)?;
        Ok(())
    }

    /// `POST /wishlist/{touristId}/destinations/{destinationId}`
    pub async fn add_destination_atomic(
        &self,
        tourist: TouristId,
        destination: DestinationId,
    ) -> Result<AddDestinationResponse, RemoteError> {
        let response = self
            .client
            .post(self.url(&format!("/wishlist/{tourist}/destinations/{destination}")))
            .send()
            .await?;
        decode_json(checked(response)?).await
    }
}

fn checked(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound);
    }
    if !status.is_success() {
        return Err(RemoteError::Status(status));
    }
    Ok(response)
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| RemoteError::Decode(e.to_string()))
}
