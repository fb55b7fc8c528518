use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::{Child, Driver, DriverId, NewRoute, Period, Route, RouteId, RouteKey};

use super::{RecordStore, StoreError};

const CHILDREN: &str = "children";
const DRIVERS: &str = "drivers";
const ROUTES: &str = "routes";

/// A stored collection together with the time it was last written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredData<T> {
    pub data: T,
    pub saved_at: DateTime<Utc>,
}

impl<T> StoredData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            saved_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.saved_at).num_minutes()
    }

    /// Rounded age: "just now", "12m ago", "3h ago", "2d ago".
    pub fn age_display(&self) -> String {
        match self.age_minutes() {
            // Future timestamps too
            m if m < 1 => "just now".to_string(),
            m if m < 60 => format!("{}m ago", m),
            m if m < 24 * 60 => format!("{}h ago", (m + 30) / 60),
            m => format!("{}d ago", (m + 12 * 60) / (24 * 60)),
        }
    }
}

/// Count and age of one stored collection, for status output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStatus {
    pub name: &'static str,
    pub count: usize,
    pub age: Option<String>,
}

/// Routes of one `routes.json` snapshot with their slot index.
#[derive(Debug, Default)]
struct RouteTable {
    routes: Vec<Route>,
    by_slot: HashMap<RouteKey, usize>,
}

impl RouteTable {
    fn from_routes(routes: Vec<Route>) -> Self {
        let by_slot = routes
            .iter()
            .enumerate()
            .map(|(idx, r)| (r.key(), idx))
            .collect();
        Self { routes, by_slot }
    }

    fn get(&self, key: &RouteKey) -> Option<&Route> {
        self.by_slot.get(key).map(|&idx| &self.routes[idx])
    }
}

/// Record store persisted as JSON documents in a data directory.
///
/// Nothing is cached between calls. Every route write re-reads `routes.json`
/// under the write lock, applies the change and replaces the file atomically,
/// so handles sharing a directory see each other's routes.
pub struct FileStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(data_dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&data_dir).map_err(|e| StoreError::io(&data_dir, e))?;
        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn document_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<StoredData<T>>, StoreError> {
        let path = self.document_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
        let stored: StoredData<T> =
            serde_json::from_str(&contents).map_err(|e| StoreError::corrupt(name, e))?;
        Ok(Some(stored))
    }

    /// Write a document through a temp file in the data directory, then rename
    /// it over the old one. Readers never see a partial document.
    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<(), StoreError> {
        let stored = StoredData::new(data);
        let path = self.document_path(name);
        let contents =
            serde_json::to_vec_pretty(&stored).map_err(|e| StoreError::corrupt(name, e))?;

        let mut file = NamedTempFile::new_in(&self.data_dir)
            .map_err(|e| StoreError::io(&self.data_dir, e))?;
        file.write_all(&contents)
            .map_err(|e| StoreError::io(file.path(), e))?;
        file.persist(&path)
            .map_err(|e| StoreError::io(&path, e.error))?;
        debug!(document = name, path = %path.display(), "Saved store document");
        Ok(())
    }

    fn load_list<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, StoreError> {
        Ok(self.load::<Vec<T>>(name)?.map(|s| s.data).unwrap_or_default())
    }

    // ===== Roster =====

    pub async fn save_children(&self, children: &[Child]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.save(CHILDREN, &children)
    }

    pub async fn save_drivers(&self, drivers: &[Driver]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.save(DRIVERS, &drivers)
    }

    // ===== Routes =====

    fn read_routes(&self) -> Result<RouteTable, StoreError> {
        let routes: Vec<Route> = self.load_list(ROUTES)?;
        Ok(RouteTable::from_routes(routes))
    }

    /// Apply `f` to the current route table and persist the result.
    /// Nothing is written when `f` fails.
    async fn update_routes<R>(
        &self,
        f: impl FnOnce(&mut RouteTable) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut table = self.read_routes()?;
        let result = f(&mut table)?;
        self.save(ROUTES, &table.routes)?;
        Ok(result)
    }

    // ===== Status =====

    fn collection_status<T: DeserializeOwned>(&self, name: &'static str) -> CollectionStatus {
        match self.load::<Vec<T>>(name) {
            Ok(Some(stored)) => CollectionStatus {
                name,
                count: stored.data.len(),
                age: Some(stored.age_display()),
            },
            Ok(None) => CollectionStatus { name, count: 0, age: None },
            Err(e) => {
                debug!(document = name, error = %e, "Failed to load document for status");
                CollectionStatus { name, count: 0, age: None }
            }
        }
    }

    pub fn status(&self) -> Vec<CollectionStatus> {
        vec![
            self.collection_status::<Child>(CHILDREN),
            self.collection_status::<Driver>(DRIVERS),
            self.collection_status::<Route>(ROUTES),
        ]
    }
}

impl RecordStore for FileStore {
    async fn list_children(&self) -> Result<Vec<Child>, StoreError> {
        self.load_list(CHILDREN)
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, StoreError> {
        self.load_list(DRIVERS)
    }

    async fn find_route(&self, key: &RouteKey) -> Result<Option<Route>, StoreError> {
        Ok(self.read_routes()?.get(key).cloned())
    }

    async fn insert_route(&self, route: NewRoute, now: DateTime<Utc>) -> Result<RouteId, StoreError> {
        self.update_routes(|table| {
            let key = route.key();
            if table.by_slot.contains_key(&key) {
                return Err(StoreError::SlotTaken(key));
            }

            let id = RouteId::generate();
            table.routes.push(route.into_route(id.clone(), now));
            table.by_slot.insert(key, table.routes.len() - 1);
            Ok(id)
        })
        .await
    }

    async fn patch_route_driver(
        &self,
        id: &RouteId,
        driver_id: &DriverId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.update_routes(|table| {
            let route = table
                .routes
                .iter_mut()
                .find(|r| &r.id == id)
                .ok_or_else(|| StoreError::RouteNotFound(id.clone()))?;
            route.driver_id = driver_id.clone();
            route.updated_at = now;
            Ok(())
        })
        .await
    }

    async fn routes_for_date_period(
        &self,
        date: NaiveDate,
        period: Period,
    ) -> Result<Vec<Route>, StoreError> {
        Ok(self
            .read_routes()?
            .routes
            .into_iter()
            .filter(|r| r.date == date && r.period == period)
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
