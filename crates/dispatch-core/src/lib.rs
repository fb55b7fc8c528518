//! Core library for dispatch.
//!
//! Holds the roster models, the record store seam, pairing sheet import and
//! reconciliation, and the route board. The CLI is a thin shell over this crate.

pub mod config;
pub mod import;
pub mod models;
pub mod routes;
pub mod store;

pub use config::Config;
pub use import::{
    run_import, verify_pairings, ExternalRow, ImportError, ImportOptions, ImportReport,
    SheetColumns, VerificationReport,
};
pub use routes::{
    copy_from_previous_day, copy_routes, list_assignments, unassigned_children,
    unassigned_drivers, upsert_route, Assignment, CopyReport, UpsertOutcome,
};
pub use store::{FileStore, MemoryStore, RecordStore, StoreError};
