//! Database module backing the destination-management service, using SQLite.
//!
//! This module provides:
//! - Destination records (create, list, count, fetch, replace, delete).
//! - One wishlist per tourist, holding an ordered list of destination ids.
//! - An add-if-absent operation that decides and writes in one serialized step.
//!
//! Lists are stored as JSON text columns. Every wishlist write goes through a
//! single write gate, so concurrent adds for the same tourist cannot interleave
//! their read and write.

use crate::config::DatabaseConfig;
use crate::destination::{Destination, DestinationId, NewDestination};
use crate::wishlist::{
    dedup_preserving_order, plan_upsert, AddDestinationResponse, NewWishlist, TouristId,
    UpsertOutcome, UpsertPlan, Wishlist, WishlistId,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

const SCHEMA: &str = include_str!("../schema.sql");

/// Database wrapper that provides an interface for destinations and wishlists.
#[derive(Clone, Debug)]
pub struct Database {
    pub pool: Arc<SqlitePool>,
    wishlist_writes: Arc<Mutex<()>>,
}

impl Database {
    /// Creates a new database instance with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Database {
            pool: Arc::new(pool),
            wishlist_writes: Arc::new(Mutex::new(())),
        }
    }

    /// Opens (creating if needed) the configured database and applies the schema.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;
        let database = Self::with_schema(pool).await?;
        info!(url = %config.url, "database initialized");
        Ok(database)
    }

    async fn with_schema(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Database::new(pool))
    }

    #[cfg(test)]
    pub async fn in_memory() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        Self::with_schema(pool).await.unwrap()
    }

    /// Retrieves every destination, ordered by id.
    pub async fn get_destinations(&self) -> Result<Vec<Destination>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, name, image, district, province, destination_type, climate, details, activities
             FROM destinations ORDER BY id",
        )
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(destination_from_row).collect()
    }

    pub async fn count_destinations(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM destinations")
            .fetch_one(&*self.pool)
            .await?;

        row.try_get("count")
    }

    /// Retrieves a destination by id.
    ///
    /// # Returns
    /// * `Ok(Some(Destination))` - If the destination exists.
    /// * `Ok(None)` - If no destination has this id.
    /// * `Err(sqlx::Error)` - If a database error occurs.
    pub async fn get_destination(&self, id: DestinationId) -> Result<Option<Destination>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, name, image, district, province, destination_type, climate, details, activities
             FROM destinations WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        row.as_ref().map(destination_from_row).transpose()
    }

    /// Stores a new destination.
    ///
    /// # Returns
    /// * `Ok(Destination)` - The stored destination with its assigned id.
    /// * `Err(sqlx::Error)` - If the insertion fails.
    pub async fn create_destination(&self, destination: &NewDestination) -> Result<Destination, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO destinations (name, image, district, province, destination_type, climate, details, activities)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&destination.name)
        .bind(&destination.image)
        .bind(&destination.district)
        .bind(&destination.province)
        .bind(&destination.kind)
        .bind(&destination.climate)
        .bind(to_json(&destination.details)?)
        .bind(to_json(&destination.activities)?)
        .execute(&*self.pool)
        .await?;

        Ok(destination.clone().with_id(result.last_insert_rowid()))
    }

    /// Replaces every field of an existing destination except its id.
    ///
    /// # Returns
    /// * `Ok(Some(Destination))` - The updated destination.
    /// * `Ok(None)` - If no destination has this id.
    /// * `Err(sqlx::Error)` - If the update fails.
    pub async fn update_destination(
        &self,
        id: DestinationId,
        destination: &NewDestination,
    ) -> Result<Option<Destination>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE destinations
             SET name = ?1, image = ?2, district = ?3, province = ?4, destination_type = ?5,
                 climate = ?6, details = ?7, activities = ?8
             WHERE id = ?9",
        )
        .bind(&destination.name)
        .bind(&destination.image)
        .bind(&destination.district)
        .bind(&destination.province)
        .bind(&destination.kind)
        .bind(&destination.climate)
        .bind(to_json(&destination.details)?)
        .bind(to_json(&destination.activities)?)
        .bind(id)
        .execute(&*self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(destination.clone().with_id(id)))
    }

    /// Deletes a destination. Returns false if it did not exist.
    pub async fn delete_destination(&self, id: DestinationId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM destinations WHERE id = ?1")
            .bind(id)
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Retrieves the wishlist owned by a tourist, if one was created.
    pub async fn get_wishlist(&self, tourist: TouristId) -> Result<Option<Wishlist>, sqlx::Error> {
        let row = sqlx::query("SELECT id, tourist_id, destinations FROM wishlists WHERE tourist_id = ?1")
            .bind(tourist.0)
            .fetch_optional(&*self.pool)
            .await?;

        row.as_ref().map(wishlist_from_row).transpose()
    }

    async fn get_wishlist_by_id(&self, id: WishlistId) -> Result<Option<Wishlist>, sqlx::Error> {
        let row = sqlx::query("SELECT id, tourist_id, destinations FROM wishlists WHERE id = ?1")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?;

        row.as_ref().map(wishlist_from_row).transpose()
    }

    /// Creates the wishlist of a tourist. Repeated ids are stored once.
    ///
    /// # Returns
    /// * `Ok(Some(Wishlist))` - The created wishlist.
    /// * `Ok(None)` - If the tourist already owns a wishlist.
    /// * `Err(sqlx::Error)` - If the insertion fails.
    pub async fn create_wishlist(&self, wishlist: &NewWishlist) -> Result<Option<Wishlist>, sqlx::Error> {
        let _writes = self.wishlist_writes.lock().await;

        if self.get_wishlist(wishlist.tourist_id).await?.is_some() {
            return Ok(None);
        }
        let created = self
            .insert_wishlist(wishlist.tourist_id, dedup_preserving_order(wishlist.destinations.iter().copied()))
            .await?;
        Ok(Some(created))
    }

    /// Replaces the destinations of a wishlist, keeping their order and dropping repeats.
    ///
    /// # Returns
    /// * `Ok(Some(Wishlist))` - The updated wishlist.
    /// * `Ok(None)` - If no wishlist has this id.
    /// * `Err(sqlx::Error)` - If the update fails.
    pub async fn update_wishlist_destinations(
        &self,
        id: WishlistId,
        destinations: &[DestinationId],
    ) -> Result<Option<Wishlist>, sqlx::Error> {
        let _writes = self.wishlist_writes.lock().await;

        let destinations = dedup_preserving_order(destinations.iter().copied());
        if !self.write_destinations(id, &destinations).await? {
            return Ok(None);
        }
        self.get_wishlist_by_id(id).await
    }

    /// Ensures a destination is in the tourist's wishlist, creating the wishlist if needed.
    pub async fn add_destination_if_absent(
        &self,
        tourist: TouristId,
        destination: DestinationId,
    ) -> Result<AddDestinationResponse, sqlx::Error> {
        let _writes = self.wishlist_writes.lock().await;

        let existing = self.get_wishlist(tourist).await?;
        let (outcome, wishlist) = match (plan_upsert(existing.as_ref(), tourist, destination), existing) {
            (UpsertPlan::Create(new_wishlist), _) => {
                let created = self
                    .insert_wishlist(new_wishlist.tourist_id, new_wishlist.destinations)
                    .await?;
                (UpsertOutcome::Created, created)
            }
            (UpsertPlan::Append { wishlist_id, destinations }, _) => {
                let updated = self.append_destinations(wishlist_id, tourist, destinations).await?;
                (UpsertOutcome::Appended, updated)
            }
            (UpsertPlan::AlreadyPresent, Some(current)) => (UpsertOutcome::AlreadyPresent, current),
            (UpsertPlan::AlreadyPresent, None) => return Err(sqlx::Error::RowNotFound),
        };

        Ok(AddDestinationResponse { outcome, wishlist })
    }

    async fn insert_wishlist(
        &self,
        tourist: TouristId,
        destinations: Vec<DestinationId>,
    ) -> Result<Wishlist, sqlx::Error> {
        let result = sqlx::query("INSERT INTO wishlists (tourist_id, destinations) VALUES (?1, ?2)")
            .bind(tourist.0)
            .bind(to_json(&destinations)?)
            .execute(&*self.pool)
            .await?;

        Ok(Wishlist {
            id: result.last_insert_rowid(),
            tourist_id: tourist,
            destinations,
        })
    }

    /// Writes an appended list back to an existing wishlist.
    ///
    /// # Returns
    /// `RowNotFound` if the wishlist row is gone.
    async fn append_destinations(
        &self,
        id: WishlistId,
        tourist: TouristId,
        destinations: Vec<DestinationId>,
    ) -> Result<Wishlist, sqlx::Error> {
        if !self.write_destinations(id, &destinations).await? {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(Wishlist {
            id,
            tourist_id: tourist,
            destinations,
        })
    }

    async fn write_destinations(
        &self,
        id: WishlistId,
        destinations: &[DestinationId],
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE wishlists SET destinations = ?1 WHERE id = ?2")
            .bind(to_json(&destinations)?)
            .bind(id)
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn destination_from_row(row: &SqliteRow) -> Result<Destination, sqlx::Error> {
    Ok(Destination {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        image: row.try_get("image")?,
        district: row.try_get("district")?,
        province: row.try_get("province")?,
        kind: row.try_get("destination_type")?,
        climate: row.try_get("climate")?,
        details: json_column(row, "details")?,
        activities: json_column(row, "activities")?,
    })
}

fn wishlist_from_row(row: &SqliteRow) -> Result<Wishlist, sqlx::Error> {
    Ok(Wishlist {
        id: row.try_get("id")?,
        tourist_id: TouristId(row.try_get("tourist_id")?),
        destinations: json_column(row, "destinations")?,
    })
}

fn json_column<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error> {
    let text: String = row.try_get(column)?;
    serde_json::from_str(&text).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, sqlx::Error> {
    serde_json::to_string(value).map_err(|e| sqlx::Error::Protocol(format!("Failed to encode list: {e}")))
}
