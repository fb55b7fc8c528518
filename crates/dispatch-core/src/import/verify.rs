//! Pairing verification: compare a sheet against the routes already stored.
//!
//! Read-only. Every row is resolved with the same `Matcher` an import would
//! use, and each leg is checked against the route in its (child, date, period)
//! slot.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

#[cfg(feature = "ts")]
use ts_rs::TS;

use crate::models::{DriverId, Period, RouteKey};
use crate::store::{RecordStore, StoreError};

use super::matcher::MatchTier;
use super::reconcile::{
    driver_diagnostic, plan_row, ExternalRow, ImportOptions, LegPlan, Reconciler, RowPlan,
};

/// How one leg of the sheet compares with the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub enum LegStatus {
    /// The stored route has the sheet's driver.
    Confirmed { driver: DriverId },
    DriverMismatch { expected: DriverId, actual: DriverId },
    /// The sheet names a driver but no route exists.
    MissingRoute { expected: DriverId },
    /// The sheet names nobody but a route exists.
    UnexpectedRoute { actual: DriverId },
    /// The sheet names nobody and no route exists.
    Unassigned,
    /// The child or driver could not be matched, so there is nothing to compare.
    Unresolved { detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct LegCheck {
    /// Zero-based data row index.
    pub row: usize,
    pub rider: String,
    pub period: Period,
    #[serde(flatten)]
    pub status: LegStatus,
    /// How the sheet's driver label resolved, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<MatchTier>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct VerificationReport {
    pub total_rows: usize,
    pub confirmed: usize,
    pub mismatched: usize,
    pub missing: usize,
    pub unexpected: usize,
    pub unassigned: usize,
    pub unresolved: usize,
    /// Riders listed on more than one row.
    pub duplicate_riders: Vec<String>,
    pub entries: Vec<LegCheck>,
}

impl VerificationReport {
    fn push(&mut self, check: LegCheck) {
        match check.status {
            LegStatus::Confirmed { .. } => self.confirmed += 1,
            LegStatus::DriverMismatch { .. } => self.mismatched += 1,
            LegStatus::MissingRoute { .. } => self.missing += 1,
            LegStatus::UnexpectedRoute { .. } => self.unexpected += 1,
            LegStatus::Unassigned => self.unassigned += 1,
            LegStatus::Unresolved { .. } => self.unresolved += 1,
        }
        self.entries.push(check);
    }

    /// True when every resolvable leg agrees with the store.
    pub fn is_clean(&self) -> bool {
        self.mismatched == 0 && self.missing == 0 && self.unexpected == 0
    }
}

/// Check every row of a sheet against the routes stored for `date`.
pub async fn verify_pairings<S: RecordStore>(
    rows: &[ExternalRow],
    store: &S,
    date: NaiveDate,
) -> Result<VerificationReport, StoreError> {
    let reconciler = Reconciler::from_store(store, ImportOptions::dry_run(date)).await?;
    let matcher = reconciler.matcher();

    let mut report = VerificationReport {
        total_rows: rows.len(),
        ..VerificationReport::default()
    };
    let mut seen = HashSet::new();

    for (idx, row) in rows.iter().enumerate() {
        let rider = row.rider_name();
        let (child, legs) = match plan_row(matcher, row) {
            RowPlan::UnmatchedChild { name } => {
                for period in Period::ALL {
                    report.push(LegCheck {
                        row: idx,
                        rider: rider.clone(),
                        period,
                        status: LegStatus::Unresolved {
                            detail: format!("child not found: {}", name),
                        },
                        tier: None,
                    });
                }
                continue;
            }
            RowPlan::Child { child, legs } => (child, legs),
        };

        if !seen.insert(child.clone()) {
            report.duplicate_riders.push(rider.clone());
        }

        for (period, leg) in Period::ALL.into_iter().zip(legs) {
            let stored = store
                .find_route(&RouteKey::new(child.clone(), date, period))
                .await?
                .map(|route| route.driver_id);
            let tier = match &leg {
                LegPlan::Assign { tier, .. } => Some(*tier),
                _ => None,
            };

            let status = match (leg, stored) {
                (LegPlan::Unmatched { raw, .. }, _) => LegStatus::Unresolved {
                    detail: format!("driver not found: {}", driver_diagnostic(&raw)),
                },
                (LegPlan::Unassigned, None) => LegStatus::Unassigned,
                (LegPlan::Unassigned, Some(actual)) => LegStatus::UnexpectedRoute { actual },
                (LegPlan::Assign { driver, .. }, None) => {
                    LegStatus::MissingRoute { expected: driver }
                }
                (LegPlan::Assign { driver, .. }, Some(actual)) if actual == driver => {
                    LegStatus::Confirmed { driver }
                }
                (LegPlan::Assign { driver, .. }, Some(actual)) => LegStatus::DriverMismatch {
                    expected: driver,
                    actual,
                },
            };

            report.push(LegCheck {
                row: idx,
                rider: rider.clone(),
                period,
                status,
                tier,
            });
        }
    }

    info!(
        rows = report.total_rows,
        confirmed = report.confirmed,
        mismatched = report.mismatched,
        missing = report.missing,
        unexpected = report.unexpected,
        unresolved = report.unresolved,
        %date,
        "Verification finished"
    );
    Ok(report)
}
