//! Record store interface and local implementations.
//!
//! The dispatch core never talks to the backing database directly. It reads a
//! roster snapshot and writes routes through `RecordStore`, which exposes only
//! the primitives the import needs:
//!
//! - full listings of children and drivers
//! - route lookup through the (child, date, period) composite index
//! - route insert and driver reassignment
//! - the (date, period) listing used by the dispatch board
//!
//! `MemoryStore` keeps everything in process. `FileStore` persists JSON
//! documents in the data directory.

pub mod error;
pub mod file;
pub mod memory;

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{Child, Driver, DriverId, NewRoute, Period, Route, RouteId, RouteKey};

pub use error::StoreError;
pub use file::{CollectionStatus, FileStore, StoredData};
pub use memory::MemoryStore;

/// Narrow view of the persistent record store.
///
/// Implementations are not required to make `find_route` + `insert_route`
/// atomic, but an insert into an occupied slot must fail with
/// `StoreError::SlotTaken` so the caller can fall back to a reassignment.
#[allow(async_fn_in_trait)]
pub trait RecordStore {
    /// Every child record, active or not, in creation order.
    async fn list_children(&self) -> Result<Vec<Child>, StoreError>;

    /// Every driver record, active or not, in creation order.
    async fn list_drivers(&self) -> Result<Vec<Driver>, StoreError>;

    /// Look up the route occupying a slot.
    async fn find_route(&self, key: &RouteKey) -> Result<Option<Route>, StoreError>;

    async fn insert_route(&self, route: NewRoute, now: DateTime<Utc>) -> Result<RouteId, StoreError>;

    /// Reassign the driver of an existing route, leaving status and type alone.
    async fn patch_route_driver(
        &self,
        id: &RouteId,
        driver_id: &DriverId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn routes_for_date_period(
        &self,
        date: NaiveDate,
        period: Period,
    ) -> Result<Vec<Route>, StoreError>;
}
