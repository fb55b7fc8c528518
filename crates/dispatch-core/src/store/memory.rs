use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::models::{Child, Driver, DriverId, NewRoute, Period, Route, RouteId, RouteKey};

use super::{RecordStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    children: Vec<Child>,
    drivers: Vec<Driver>,
    routes: Vec<Route>,
    /// Composite (child, date, period) index into `routes`.
    by_slot: HashMap<RouteKey, usize>,
}

/// In-process record store.
///
/// Used by tests and dry runs against a roster snapshot. The slot index is
/// enforced as unique, so a second insert for the same slot is an error.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roster(children: Vec<Child>, drivers: Vec<Driver>) -> Self {
        Self {
            tables: Mutex::new(Tables {
                children,
                drivers,
                ..Tables::default()
            }),
        }
    }

    pub async fn add_driver(&self, driver: Driver) {
        self.tables.lock().await.drivers.push(driver);
    }

    pub async fn all_routes(&self) -> Vec<Route> {
        self.tables.lock().await.routes.clone()
    }

    pub async fn route_count(&self) -> usize {
        self.tables.lock().await.routes.len()
    }
}

impl RecordStore for MemoryStore {
    async fn list_children(&self) -> Result<Vec<Child>, StoreError> {
        Ok(self.tables.lock().await.children.clone())
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, StoreError> {
        Ok(self.tables.lock().await.drivers.clone())
    }

    async fn find_route(&self, key: &RouteKey) -> Result<Option<Route>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.by_slot.get(key).map(|&idx| tables.routes[idx].clone()))
    }

    async fn insert_route(&self, route: NewRoute, now: DateTime<Utc>) -> Result<RouteId, StoreError> {
        let mut tables = self.tables.lock().await;
        let key = route.key();
        if tables.by_slot.contains_key(&key) {
            return Err(StoreError::SlotTaken(key));
        }

        let id = RouteId::generate();
        let idx = tables.routes.len();
        tables.routes.push(route.into_route(id.clone(), now));
        tables.by_slot.insert(key, idx);
        Ok(id)
    }

    async fn patch_route_driver(
        &self,
        id: &RouteId,
        driver_id: &DriverId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let route = tables
            .routes
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::RouteNotFound(id.clone()))?;
        route.driver_id = driver_id.clone();
        route.updated_at = now;
        Ok(())
    }

    async fn routes_for_date_period(
        &self,
        date: NaiveDate,
        period: Period,
    ) -> Result<Vec<Route>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .routes
            .iter()
            .filter(|r| r.date == date && r.period == period)
            .cloned()
            .collect())
    }
}
