//! Pairing import: sheet rows in, routes and an `ImportReport` out.
//!
//! A run works in two passes. Matching turns every row into a `RowPlan`
//! against the roster snapshot; nothing in that pass depends on other rows.
//! Committing then walks the plans in input order, upserting one route at a
//! time, and each row yields a `RowOutcome`. The report is a fold over those
//! outcomes.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[cfg(feature = "ts")]
use ts_rs::TS;

use crate::models::{ChildId, DriverId, Period, RouteStatus};
use crate::routes::upsert_route;
use crate::store::{RecordStore, StoreError};

use super::error::ImportError;
use super::matcher::{DriverMatch, MatchTier, Matcher, UnmatchedReason};
use super::normalize::clean_driver_label;

/// One row of a pairing sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRow {
    pub rider_first: String,
    pub rider_last: String,
    pub am_driver: String,
    pub pm_driver: String,
    /// Other sheet columns, carried along untouched.
    #[serde(default)]
    pub passthrough: BTreeMap<String, String>,
}

impl ExternalRow {
    pub fn new(rider_first: &str, rider_last: &str, am_driver: &str, pm_driver: &str) -> Self {
        Self {
            rider_first: rider_first.to_string(),
            rider_last: rider_last.to_string(),
            am_driver: am_driver.to_string(),
            pm_driver: pm_driver.to_string(),
            passthrough: BTreeMap::new(),
        }
    }

    pub fn driver_label(&self, period: Period) -> &str {
        match period {
            Period::Am => &self.am_driver,
            Period::Pm => &self.pm_driver,
        }
    }

    /// The rider as written on the sheet, for diagnostics.
    pub fn rider_name(&self) -> String {
        format!("{} {}", self.rider_first, self.rider_last)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Every route written by the run is for this date.
    pub target_date: NaiveDate,
    /// Write routes. When false the run only previews.
    pub commit: bool,
}

impl ImportOptions {
    pub fn dry_run(target_date: NaiveDate) -> Self {
        Self {
            target_date,
            commit: false,
        }
    }

    pub fn commit(target_date: NaiveDate) -> Self {
        Self {
            target_date,
            commit: true,
        }
    }
}

/// Summary of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct ImportReport {
    pub total_rows: usize,
    pub matched_children: usize,
    pub unmatched_children: Vec<String>,
    pub matched_drivers: usize,
    pub unmatched_drivers: Vec<String>,
    pub routes_created: usize,
}

impl ImportReport {
    fn new(total_rows: usize) -> Self {
        Self {
            total_rows,
            ..Self::default()
        }
    }

    fn apply(mut self, outcome: RowOutcome) -> Self {
        match outcome {
            RowOutcome::UnmatchedChild(name) => self.unmatched_children.push(name),
            RowOutcome::Legs(legs) => {
                self.matched_children += 1;
                for leg in legs {
                    match leg {
                        LegOutcome::Unassigned => {}
                        LegOutcome::Assigned { created } => {
                            self.matched_drivers += 1;
                            if created {
                                self.routes_created += 1;
                            }
                        }
                        LegOutcome::Unmatched(diagnostic) => {
                            self.unmatched_drivers.push(diagnostic)
                        }
                    }
                }
            }
        }
        self
    }
}

/// `"{raw} (Raw) -> {cleaned} (Clean)"`, the form dispatchers search for.
pub fn driver_diagnostic(raw: &str) -> String {
    format!("{} (Raw) -> {} (Clean)", raw, clean_driver_label(raw))
}

// ============================================================================
// Planning
// ============================================================================

/// What matching decided for one leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegPlan {
    /// The sheet names nobody for this leg.
    Unassigned,
    Assign {
        period: Period,
        driver: DriverId,
        tier: MatchTier,
    },
    Unmatched { raw: String, reason: UnmatchedReason },
}

/// What matching decided for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowPlan {
    UnmatchedChild { name: String },
    Child { child: ChildId, legs: Vec<LegPlan> },
}

pub fn plan_row(matcher: &Matcher, row: &ExternalRow) -> RowPlan {
    let Some(child) = matcher.match_child(&row.rider_first, &row.rider_last) else {
        debug!(rider = %row.rider_name(), "Unmatched child");
        return RowPlan::UnmatchedChild {
            name: row.rider_name(),
        };
    };

    let legs = Period::ALL
        .iter()
        .map(|&period| {
            let raw = row.driver_label(period);
            match matcher.match_driver(raw) {
                DriverMatch::Matched { driver, tier } => LegPlan::Assign {
                    period,
                    driver,
                    tier,
                },
                DriverMatch::Unmatched(UnmatchedReason::Unassigned) => LegPlan::Unassigned,
                DriverMatch::Unmatched(reason) => {
                    debug!(rider = %row.rider_name(), %period, label = %raw, ?reason, "Unmatched driver");
                    LegPlan::Unmatched {
                        raw: raw.to_string(),
                        reason,
                    }
                }
            }
        })
        .collect();

    RowPlan::Child { child, legs }
}

// ============================================================================
// Committing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum LegOutcome {
    Unassigned,
    Assigned { created: bool },
    Unmatched(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RowOutcome {
    UnmatchedChild(String),
    Legs(Vec<LegOutcome>),
}

async fn commit_row<S: RecordStore>(
    store: &S,
    plan: RowPlan,
    options: &ImportOptions,
) -> Result<RowOutcome, StoreError> {
    let (child, legs) = match plan {
        RowPlan::UnmatchedChild { name } => return Ok(RowOutcome::UnmatchedChild(name)),
        RowPlan::Child { child, legs } => (child, legs),
    };

    let mut outcomes = Vec::with_capacity(legs.len());
    for leg in legs {
        let outcome = match leg {
            LegPlan::Unassigned => LegOutcome::Unassigned,
            LegPlan::Unmatched { raw, .. } => LegOutcome::Unmatched(driver_diagnostic(&raw)),
            LegPlan::Assign {
                period,
                driver,
                tier,
            } if options.commit => {
                debug!(child = %child, %period, driver = %driver, %tier, "Assigning driver");
                let upserted = upsert_route(
                    store,
                    &child,
                    &driver,
                    options.target_date,
                    period,
                    period.route_type(),
                    RouteStatus::Scheduled,
                )
                .await?;
                LegOutcome::Assigned {
                    created: upserted.created,
                }
            }
            LegPlan::Assign { .. } => LegOutcome::Assigned { created: false },
        };
        outcomes.push(outcome);
    }
    Ok(RowOutcome::Legs(outcomes))
}

/// Import driver bound to one roster snapshot.
#[derive(Debug)]
pub struct Reconciler {
    matcher: Matcher,
    options: ImportOptions,
}

impl Reconciler {
    pub fn new(matcher: Matcher, options: ImportOptions) -> Self {
        Self { matcher, options }
    }

    /// Take the roster snapshot for a run. Children and drivers load concurrently.
    pub async fn from_store<S: RecordStore>(
        store: &S,
        options: ImportOptions,
    ) -> Result<Self, StoreError> {
        let (children, drivers) =
            futures::try_join!(store.list_children(), store.list_drivers())?;
        info!(
            children = children.len(),
            drivers = drivers.len(),
            "Loaded roster snapshot"
        );

        Ok(Self::new(Matcher::from_roster(&children, &drivers), options))
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn plan(&self, rows: &[ExternalRow]) -> Vec<RowPlan> {
        rows.iter().map(|row| plan_row(&self.matcher, row)).collect()
    }

    /// Match and, in commit mode, write every row. Upserts run one at a time in
    /// row order, AM before PM.
    pub async fn run<S: RecordStore>(
        &self,
        store: &S,
        rows: &[ExternalRow],
    ) -> Result<ImportReport, StoreError> {
        let plans = self.plan(rows);

        let mut outcomes = Vec::with_capacity(plans.len());
        for plan in plans {
            outcomes.push(commit_row(store, plan, &self.options).await?);
        }

        let report = outcomes
            .into_iter()
            .fold(ImportReport::new(rows.len()), ImportReport::apply);

        info!(
            rows = report.total_rows,
            matched_children = report.matched_children,
            unmatched_children = report.unmatched_children.len(),
            matched_drivers = report.matched_drivers,
            unmatched_drivers = report.unmatched_drivers.len(),
            routes_created = report.routes_created,
            commit = self.options.commit,
            date = %self.options.target_date,
            "Import finished"
        );
        Ok(report)
    }
}

/// Reconcile `rows` against the store's current roster.
///
/// Returns one complete report, or the first store error. Row-level match
/// failures never abort the run.
pub async fn run_import<S: RecordStore>(
    store: &S,
    rows: &[ExternalRow],
    options: ImportOptions,
) -> Result<ImportReport, ImportError> {
    let reconciler = Reconciler::from_store(store, options).await?;
    Ok(reconciler.run(store, rows).await?)
}

// ============================================================================
// Tests
// ============================================================================
