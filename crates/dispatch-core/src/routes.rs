//! Route writes and the dispatch board queries.
//!
//! Everything here works on the (date, period) route index plus the roster:
//! upserting one slot, listing a board with names, finding who is still
//! unassigned, and copying a day's board to another date.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

#[cfg(feature = "ts")]
use ts_rs::TS;

use crate::models::{
    Child, ChildId, Driver, DriverId, NewRoute, Period, Route, RouteId, RouteKey, RouteStatus,
    RouteType,
};
use crate::store::{RecordStore, StoreError};

/// Result of an upsert: the route occupying the slot and whether it is new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: RouteId,
    pub created: bool,
}

async fn reassign<S: RecordStore>(
    store: &S,
    existing: Route,
    driver_id: &DriverId,
    now: DateTime<Utc>,
) -> Result<UpsertOutcome, StoreError> {
    store.patch_route_driver(&existing.id, driver_id, now).await?;
    debug!(
        route = %existing.id,
        child = %existing.child_id,
        from = %existing.driver_id,
        to = %driver_id,
        "Reassigned existing route"
    );
    Ok(UpsertOutcome {
        id: existing.id,
        created: false,
    })
}

/// Create the route for (child, date, period), or point the existing one at
/// `driver_id`.
///
/// An existing route keeps its status and type; only the driver and the
/// update timestamp change. Calling this any number of times for the same slot
/// leaves exactly one route. If another writer fills the slot between the
/// lookup and the insert, that route is reassigned instead.
pub async fn upsert_route<S: RecordStore>(
    store: &S,
    child_id: &ChildId,
    driver_id: &DriverId,
    date: NaiveDate,
    period: Period,
    route_type: RouteType,
    status: RouteStatus,
) -> Result<UpsertOutcome, StoreError> {
    let key = RouteKey::new(child_id.clone(), date, period);
    let now = Utc::now();

    if let Some(existing) = store.find_route(&key).await? {
        return reassign(store, existing, driver_id, now).await;
    }

    let new_route = NewRoute {
        child_id: child_id.clone(),
        driver_id: driver_id.clone(),
        date,
        period,
        route_type,
        status,
    };
    match store.insert_route(new_route, now).await {
        Ok(id) => {
            debug!(route = %id, child = %child_id, driver = %driver_id, %date, %period, "Created route");
            Ok(UpsertOutcome { id, created: true })
        }
        Err(StoreError::SlotTaken(key)) => match store.find_route(&key).await? {
            Some(existing) => reassign(store, existing, driver_id, now).await,
            None => Err(StoreError::SlotTaken(key)),
        },
        Err(e) => Err(e),
    }
}

// ============================================================================
// Board queries
// ============================================================================

/// A route with the names of the child and driver it refers to.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct Assignment {
    #[serde(flatten)]
    pub route: Route,
    #[serde(rename = "childName")]
    pub child_name: String,
    #[serde(rename = "driverName")]
    pub driver_name: String,
}

const UNKNOWN_NAME: &str = "Unknown";

/// Routes of one date and period, named and sorted by child name.
pub async fn list_assignments<S: RecordStore>(
    store: &S,
    date: NaiveDate,
    period: Period,
) -> Result<Vec<Assignment>, StoreError> {
    let (routes, children, drivers) = futures::try_join!(
        store.routes_for_date_period(date, period),
        store.list_children(),
        store.list_drivers()
    )?;

    let child_names: HashMap<&ChildId, String> =
        children.iter().map(|c| (&c.id, c.full_name())).collect();
    let driver_names: HashMap<&DriverId, String> =
        drivers.iter().map(|d| (&d.id, d.full_name())).collect();
    let name_of = |name: Option<&String>| name.cloned().unwrap_or_else(|| UNKNOWN_NAME.to_string());

    let mut assignments: Vec<Assignment> = routes
        .into_iter()
        .map(|route| Assignment {
            child_name: name_of(child_names.get(&route.child_id)),
            driver_name: name_of(driver_names.get(&route.driver_id)),
            route,
        })
        .collect();

    assignments.sort_by_cached_key(|a| a.child_name.to_lowercase());
    Ok(assignments)
}

/// Active children with no route in the (date, period) slot, in roster order.
pub async fn unassigned_children<S: RecordStore>(
    store: &S,
    date: NaiveDate,
    period: Period,
) -> Result<Vec<Child>, StoreError> {
    let (routes, children) = futures::try_join!(
        store.routes_for_date_period(date, period),
        store.list_children()
    )?;
    let assigned: HashSet<&ChildId> = routes.iter().map(|r| &r.child_id).collect();

    Ok(children
        .into_iter()
        .filter(|c| c.active && !assigned.contains(&c.id))
        .collect())
}

/// Active drivers with no route in the date and period, in roster order.
pub async fn unassigned_drivers<S: RecordStore>(
    store: &S,
    date: NaiveDate,
    period: Period,
) -> Result<Vec<Driver>, StoreError> {
    let (routes, drivers) = futures::try_join!(
        store.routes_for_date_period(date, period),
        store.list_drivers()
    )?;
    let busy: HashSet<&DriverId> = routes.iter().map(|r| &r.driver_id).collect();

    Ok(drivers
        .into_iter()
        .filter(|d| d.active && !busy.contains(&d.id))
        .collect())
}

// ============================================================================
// Copying
// ============================================================================

/// Summary of copying one date's routes onto another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct CopyReport {
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub from: NaiveDate,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub to: NaiveDate,
    /// Routes found on the source date.
    pub source_routes: usize,
    pub created: usize,
    /// Target slots that already had a route and now carry the source driver.
    pub reassigned: usize,
}

impl CopyReport {
    fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from,
            to,
            source_routes: 0,
            created: 0,
            reassigned: 0,
        }
    }
}

/// Copy the routes of `from` onto `to`, for one period or both.
///
/// Every copied route goes through `upsert_route` as a `Scheduled` route, so
/// copying twice is harmless and occupied target slots are reassigned rather
/// than duplicated.
pub async fn copy_routes<S: RecordStore>(
    store: &S,
    from: NaiveDate,
    to: NaiveDate,
    period: Option<Period>,
) -> Result<CopyReport, StoreError> {
    let periods = match period {
        Some(p) => vec![p],
        None => Period::ALL.to_vec(),
    };

    let mut report = CopyReport::new(from, to);
    for period in periods {
        let source = store.routes_for_date_period(from, period).await?;
        report.source_routes += source.len();

        for route in source {
            let outcome = upsert_route(
                store,
                &route.child_id,
                &route.driver_id,
                to,
                period,
                period.route_type(),
                RouteStatus::Scheduled,
            )
            .await?;
            if outcome.created {
                report.created += 1;
            } else {
                report.reassigned += 1;
            }
        }
    }

    info!(
        %from,
        %to,
        source = report.source_routes,
        created = report.created,
        reassigned = report.reassigned,
        "Copied routes"
    );
    Ok(report)
}

/// Copy both periods of the day before `to`.
pub async fn copy_from_previous_day<S: RecordStore>(
    store: &S,
    to: NaiveDate,
) -> Result<CopyReport, StoreError> {
    match to.pred_opt() {
        Some(from) => copy_routes(store, from, to, None).await,
        None => Ok(CopyReport::new(to, to)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::store::MemoryStore;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 5).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_creates_then_reassigns() {
        let store = MemoryStore::new();
        let child = ChildId::new("c1");

        let first = upsert_route(
            &store,
            &child,
            &DriverId::new("d1"),
            date(),
            Period::Am,
            RouteType::Pickup,
            RouteStatus::Scheduled,
        )
        .await
        .unwrap();
        assert!(first.created);

        let second = upsert_route(
            &store,
            &child,
            &DriverId::new("d2"),
            date(),
            Period::Am,
            RouteType::Pickup,
            RouteStatus::Scheduled,
        )
        .await
        .unwrap();
        assert!(!second.created);
        assert_eq!(second.id, first.id);

        let routes = store.all_routes().await;
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].driver_id, DriverId::new("d2"));
        assert!(routes[0].updated_at >= routes[0].created_at);
    }

    #[tokio::test]
    async fn test_upsert_preserves_status_and_type() {
        let store = MemoryStore::new();
        let child = ChildId::new("c1");
        upsert_route(
            &store,
            &child,
            &DriverId::new("d1"),
            date(),
            Period::Pm,
            RouteType::Dropoff,
            RouteStatus::Completed,
        )
        .await
        .unwrap();

        upsert_route(
            &store,
            &child,
            &DriverId::new("d2"),
            date(),
            Period::Pm,
            RouteType::Pickup,
            RouteStatus::Scheduled,
        )
        .await
        .unwrap();

        let routes = store.all_routes().await;
        assert_eq!(routes[0].status, RouteStatus::Completed);
        assert_eq!(routes[0].route_type, RouteType::Dropoff);
        assert_eq!(routes[0].driver_id, DriverId::new("d2"));
    }

    #[tokio::test]
    async fn test_upsert_separate_periods_are_separate_routes() {
        let store = MemoryStore::new();
        let child = ChildId::new("c1");
        for period in Period::ALL {
            let outcome = upsert_route(
                &store,
                &child,
                &DriverId::new("d1"),
                date(),
                period,
                period.route_type(),
                RouteStatus::Scheduled,
            )
            .await
            .unwrap();
            assert!(outcome.created);
        }
        assert_eq!(store.route_count().await, 2);
    }

    #[tokio::test]
    async fn test_list_assignments_names_and_order() {
        let store = MemoryStore::with_roster(
            vec![Child::new("c1", "Zoe", "Adams"), Child::new("c2", "Ana", "Lima")],
            vec![Driver::new("d1", "John", "Smith")],
        );
        for child in ["c1", "c2"] {
            upsert_route(
                &store,
                &ChildId::new(child),
                &DriverId::new("d1"),
                date(),
                Period::Am,
                RouteType::Pickup,
                RouteStatus::Scheduled,
            )
            .await
            .unwrap();
        }
        // Driver record no longer exists
        upsert_route(
            &store,
            &ChildId::new("c3"),
            &DriverId::new("gone"),
            date(),
            Period::Am,
            RouteType::Pickup,
            RouteStatus::Scheduled,
        )
        .await
        .unwrap();

        let listed = list_assignments(&store, date(), Period::Am).await.unwrap();
        let names: Vec<(&str, &str)> = listed
            .iter()
            .map(|a| (a.child_name.as_str(), a.driver_name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Ana Lima", "John Smith"),
                ("Unknown", "Unknown"),
                ("Zoe Adams", "John Smith"),
            ]
        );

        assert!(list_assignments(&store, date(), Period::Pm).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_assignments_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::store::FileStore::new(dir.path().to_path_buf()).unwrap();
        store
            .save_children(&[Child::new("c1", "Ana", "Lima")])
            .await
            .unwrap();
        store
            .save_drivers(&[Driver::new("d1", "John", "Smith")])
            .await
            .unwrap();
        upsert_route(
            &store,
            &ChildId::new("c1"),
            &DriverId::new("d1"),
            date(),
            Period::Pm,
            RouteType::Dropoff,
            RouteStatus::Scheduled,
        )
        .await
        .unwrap();

        let listed = list_assignments(&store, date(), Period::Pm).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].child_name, "Ana Lima");
        assert_eq!(listed[0].driver_name, "John Smith");
    }

    // ===== Concurrent writers =====

    /// Store whose first slot lookup misses, as if another writer filled the
    /// slot right after it.
    struct LateWriter {
        inner: MemoryStore,
        missed: AtomicBool,
    }

    impl RecordStore for LateWriter {
        async fn list_children(&self) -> Result<Vec<Child>, StoreError> {
            self.inner.list_children().await
        }

        async fn list_drivers(&self) -> Result<Vec<Driver>, StoreError> {
            self.inner.list_drivers().await
        }

        async fn find_route(&self, key: &RouteKey) -> Result<Option<Route>, StoreError> {
            if !self.missed.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_route(key).await
        }

        async fn insert_route(
            &self,
            route: NewRoute,
            now: DateTime<Utc>,
        ) -> Result<RouteId, StoreError> {
            self.inner.insert_route(route, now).await
        }

        async fn patch_route_driver(
            &self,
            id: &RouteId,
            driver_id: &DriverId,
            now: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.inner.patch_route_driver(id, driver_id, now).await
        }

        async fn routes_for_date_period(
            &self,
            date: NaiveDate,
            period: Period,
        ) -> Result<Vec<Route>, StoreError> {
            self.inner.routes_for_date_period(date, period).await
        }
    }

    #[tokio::test]
    async fn test_upsert_reassigns_when_slot_filled_after_lookup() {
        let inner = MemoryStore::new();
        let existing = upsert_route(
            &inner,
            &ChildId::new("c1"),
            &DriverId::new("d1"),
            date(),
            Period::Am,
            RouteType::Pickup,
            RouteStatus::Scheduled,
        )
        .await
        .unwrap();
        let store = LateWriter {
            inner,
            missed: AtomicBool::new(false),
        };

        let outcome = upsert_route(
            &store,
            &ChildId::new("c1"),
            &DriverId::new("d2"),
            date(),
            Period::Am,
            RouteType::Pickup,
            RouteStatus::Scheduled,
        )
        .await
        .unwrap();

        assert_eq!(outcome, UpsertOutcome { id: existing.id, created: false });
        let routes = store.inner.all_routes().await;
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].driver_id, DriverId::new("d2"));
    }

    // ===== Unassigned =====

    async fn assign(store: &MemoryStore, child: &str, driver: &str, on: NaiveDate, period: Period) {
        upsert_route(
            store,
            &ChildId::new(child),
            &DriverId::new(driver),
            on,
            period,
            period.route_type(),
            RouteStatus::Scheduled,
        )
        .await
        .unwrap();
    }

    fn board_store() -> MemoryStore {
        let mut inactive_child = Child::new("c3", "Old", "Rider");
        inactive_child.active = false;
        let mut inactive_driver = Driver::new("d3", "Retired", "Driver");
        inactive_driver.active = false;
        MemoryStore::with_roster(
            vec![
                Child::new("c1", "Ana", "Lima"),
                Child::new("c2", "Leo", "Park"),
                inactive_child,
            ],
            vec![
                Driver::new("d1", "John", "Smith"),
                Driver::new("d2", "Maria", "Santos"),
                inactive_driver,
            ],
        )
    }

    #[tokio::test]
    async fn test_unassigned_children_and_drivers() {
        let store = board_store();
        assign(&store, "c1", "d1", date(), Period::Am).await;

        let children = unassigned_children(&store, date(), Period::Am).await.unwrap();
        let ids: Vec<_> = children.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![ChildId::new("c2")]);

        let drivers = unassigned_drivers(&store, date(), Period::Am).await.unwrap();
        let ids: Vec<_> = drivers.iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec![DriverId::new("d2")]);

        // The PM board is untouched
        assert_eq!(unassigned_children(&store, date(), Period::Pm).await.unwrap().len(), 2);
        assert_eq!(unassigned_drivers(&store, date(), Period::Pm).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_driver_with_two_children_is_busy() {
        let store = board_store();
        assign(&store, "c1", "d2", date(), Period::Pm).await;
        assign(&store, "c2", "d2", date(), Period::Pm).await;

        assert!(unassigned_children(&store, date(), Period::Pm).await.unwrap().is_empty());
        let drivers = unassigned_drivers(&store, date(), Period::Pm).await.unwrap();
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].id, DriverId::new("d1"));
    }

    // ===== Copying =====

    fn next_day() -> NaiveDate {
        date().succ_opt().unwrap()
    }

    #[tokio::test]
    async fn test_copy_from_previous_day_both_periods() {
        let store = board_store();
        assign(&store, "c1", "d1", date(), Period::Am).await;
        assign(&store, "c1", "d2", date(), Period::Pm).await;
        assign(&store, "c2", "d2", date(), Period::Pm).await;

        let report = copy_from_previous_day(&store, next_day()).await.unwrap();
        assert_eq!(
            report,
            CopyReport {
                from: date(),
                to: next_day(),
                source_routes: 3,
                created: 3,
                reassigned: 0,
            }
        );

        let pm = store.routes_for_date_period(next_day(), Period::Pm).await.unwrap();
        assert_eq!(pm.len(), 2);
        assert!(pm.iter().all(|r| r.route_type == RouteType::Dropoff));
        assert!(pm.iter().all(|r| r.status == RouteStatus::Scheduled));
        assert_eq!(store.route_count().await, 6);
    }

    #[tokio::test]
    async fn test_copy_twice_creates_nothing_new() {
        let store = board_store();
        assign(&store, "c1", "d1", date(), Period::Am).await;

        copy_routes(&store, date(), next_day(), None).await.unwrap();
        let again = copy_routes(&store, date(), next_day(), None).await.unwrap();

        assert_eq!(again.created, 0);
        assert_eq!(again.reassigned, 1);
        assert_eq!(store.route_count().await, 2);
    }

    #[tokio::test]
    async fn test_copy_one_period_reassigns_occupied_slot() {
        let store = board_store();
        assign(&store, "c1", "d1", date(), Period::Am).await;
        assign(&store, "c1", "d1", date(), Period::Pm).await;
        assign(&store, "c1", "d2", next_day(), Period::Am).await;

        let report = copy_routes(&store, date(), next_day(), Some(Period::Am))
            .await
            .unwrap();
        assert_eq!(report.source_routes, 1);
        assert_eq!(report.created, 0);
        assert_eq!(report.reassigned, 1);

        let am = store.routes_for_date_period(next_day(), Period::Am).await.unwrap();
        assert_eq!(am.len(), 1);
        assert_eq!(am[0].driver_id, DriverId::new("d1"));
        assert!(store
            .routes_for_date_period(next_day(), Period::Pm)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_copy_from_empty_day() {
        let store = board_store();
        let report = copy_from_previous_day(&store, next_day()).await.unwrap();
        assert_eq!(report.source_routes, 0);
        assert_eq!(store.route_count().await, 0);
    }
}
