//! Pairing sheet import.
//!
//! A pairing sheet says, for each rider, which driver does the morning pickup
//! and which does the afternoon dropoff. Importing one for a date:
//!
//! 1. `sheet` turns the CSV export into `ExternalRow`s
//! 2. `index` builds name lookup tables from the current roster
//! 3. `matcher` resolves rider and driver names against them
//! 4. `reconcile` upserts one route per resolved leg and reports the rest
//!
//! `verify` runs the same matching read-only and compares it with the routes
//! already stored.

pub mod error;
pub mod index;
pub mod matcher;
pub mod normalize;
pub mod reconcile;
pub mod sheet;
pub mod verify;

pub use error::ImportError;
pub use index::{ChildIndex, DriverIndex, MatchIndex, Slot};
pub use matcher::{DriverMatch, MatchTier, Matcher, UnmatchedReason};
pub use normalize::{clean_driver_label, full_name_key, is_unassigned_label, normalize};
pub use reconcile::{run_import, ExternalRow, ImportOptions, ImportReport, Reconciler};
pub use sheet::{read_csv, read_csv_path, rows_from_table, SheetColumns};
pub use verify::{verify_pairings, LegCheck, LegStatus, VerificationReport};
