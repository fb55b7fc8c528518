use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "ts")]
use ts_rs::TS;

use super::person::{ChildId, DriverId};

/// Half of a service day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub enum Period {
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "PM")]
    Pm,
}

impl Period {
    pub const ALL: [Period; 2] = [Period::Am, Period::Pm];

    /// Morning legs pick the child up, afternoon legs drop them off.
    pub fn route_type(&self) -> RouteType {
        match self {
            Period::Am => RouteType::Pickup,
            Period::Pm => RouteType::Dropoff,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Am => "AM",
            Period::Pm => "PM",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AM" => Ok(Period::Am),
            "PM" => Ok(Period::Pm),
            other => Err(format!("unknown period '{}', expected AM or PM", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub enum RouteType {
    Pickup,
    Dropoff,
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteType::Pickup => write!(f, "pickup"),
            RouteType::Dropoff => write!(f, "dropoff"),
        }
    }
}

/// Lifecycle of a route. Imports only ever create `Scheduled` routes; the
/// other states are reached through the driver app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub enum RouteStatus {
    Draft,
    Scheduled,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
    EmergencyStop,
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouteStatus::Draft => "draft",
            RouteStatus::Scheduled => "scheduled",
            RouteStatus::Assigned => "assigned",
            RouteStatus::InProgress => "in_progress",
            RouteStatus::Completed => "completed",
            RouteStatus::Cancelled => "cancelled",
            RouteStatus::EmergencyStop => "emergency_stop",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct RouteId(pub String);

impl RouteId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Composite key of a route. A child has at most one route per slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub child_id: ChildId,
    pub date: NaiveDate,
    pub period: Period,
}

impl RouteKey {
    pub fn new(child_id: ChildId, date: NaiveDate, period: Period) -> Self {
        Self {
            child_id,
            date,
            period,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct Route {
    pub id: RouteId,
    #[serde(rename = "childId")]
    pub child_id: ChildId,
    #[serde(rename = "driverId")]
    pub driver_id: DriverId,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub date: NaiveDate,
    pub period: Period,
    #[serde(rename = "type")]
    pub route_type: RouteType,
    pub status: RouteStatus,
    #[serde(rename = "createdAt")]
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub updated_at: DateTime<Utc>,
}

impl Route {
    pub fn key(&self) -> RouteKey {
        RouteKey::new(self.child_id.clone(), self.date, self.period)
    }
}

/// Fields supplied when a route is first written.
#[derive(Debug, Clone)]
pub struct NewRoute {
    pub child_id: ChildId,
    pub driver_id: DriverId,
    pub date: NaiveDate,
    pub period: Period,
    pub route_type: RouteType,
    pub status: RouteStatus,
}

impl NewRoute {
    pub fn key(&self) -> RouteKey {
        RouteKey::new(self.child_id.clone(), self.date, self.period)
    }

    pub fn into_route(self, id: RouteId, now: DateTime<Utc>) -> Route {
        Route {
            id,
            child_id: self.child_id,
            driver_id: self.driver_id,
            date: self.date,
            period: self.period,
            route_type: self.route_type,
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}
