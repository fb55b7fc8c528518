//! Data models for dispatch entities.
//!
//! This module contains the records shared with the dispatch and driver apps:
//!
//! - `Child`, `Driver`: roster records with their opaque store ids
//! - `Route`: one pickup or dropoff for a child on a date and period
//! - `RouteKey`: the (child, date, period) slot a route occupies

pub mod person;
pub mod route;

pub use person::{Child, ChildId, Driver, DriverId};
pub use route::{NewRoute, Period, Route, RouteId, RouteKey, RouteStatus, RouteType};
