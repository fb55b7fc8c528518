use std::path::PathBuf;

use thiserror::Error;

use crate::models::{RouteId, RouteKey};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt store document '{name}': {source}")]
    Corrupt {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Route not found: {0}")]
    RouteNotFound(RouteId),

    #[error("Route slot already taken for child {} on {} {}", .0.child_id, .0.date, .0.period)]
    SlotTaken(RouteKey),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(name: &str, source: serde_json::Error) -> Self {
        StoreError::Corrupt {
            name: name.to_string(),
            source,
        }
    }
}
