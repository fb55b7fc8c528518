//! Per-run lookup tables from normalized name keys to roster ids.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::models::{Child, ChildId, Driver, DriverId};

use super::normalize::{full_name_key, normalize};

/// One key's entry in a collision-aware map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    Unique(T),
    /// Two or more distinct records share the key. Never resolves.
    Ambiguous,
}

/// Record `id` under `key`; a second distinct id turns the slot ambiguous for good.
fn claim<T: PartialEq>(map: &mut HashMap<String, Slot<T>>, key: String, id: T) {
    if key.is_empty() {
        return;
    }
    match map.entry(key) {
        Entry::Vacant(e) => {
            e.insert(Slot::Unique(id));
        }
        Entry::Occupied(mut e) => {
            if matches!(e.get(), Slot::Unique(existing) if *existing != id) {
                e.insert(Slot::Ambiguous);
            }
        }
    }
}

/// Children by `"first last"` key.
#[derive(Debug, Default)]
pub struct ChildIndex {
    by_full_name: HashMap<String, ChildId>,
    collisions: Vec<String>,
}

impl ChildIndex {
    pub fn build(children: &[Child]) -> Self {
        let mut index = Self::default();
        for child in children {
            let key = full_name_key(&child.first_name, &child.last_name);
            if key.trim().is_empty() {
                continue;
            }
            if let Some(previous) = index.by_full_name.insert(key.clone(), child.id.clone()) {
                if previous != child.id {
                    warn!(
                        name = %key,
                        kept = %child.id,
                        replaced = %previous,
                        "Two children share a full name; the later record wins"
                    );
                    index.collisions.push(key);
                }
            }
        }
        index
    }

    pub fn get(&self, key: &str) -> Option<&ChildId> {
        self.by_full_name.get(key)
    }

    /// Full-name keys shared by more than one child in this roster.
    pub fn collisions(&self) -> &[String] {
        &self.collisions
    }
}

/// A driver's full normalized name split into tokens, for containment checks.
#[derive(Debug, Clone)]
pub struct DriverTokens {
    pub id: DriverId,
    pub tokens: Vec<String>,
}

/// Drivers by full name, by full first name and by first word of the first name.
#[derive(Debug, Default)]
pub struct DriverIndex {
    by_full_name: HashMap<String, DriverId>,
    by_first_name: HashMap<String, Slot<DriverId>>,
    roster: Vec<DriverTokens>,
}

impl DriverIndex {
    pub fn build(drivers: &[Driver]) -> Self {
        let mut index = Self::default();
        for driver in drivers {
            let full = full_name_key(&driver.first_name, &driver.last_name);
            if !full.trim().is_empty() {
                index.by_full_name.insert(full.clone(), driver.id.clone());
            }

            let first = normalize(&driver.first_name);
            claim(&mut index.by_first_name, first.clone(), driver.id.clone());

            // "benhur calixto" is also reachable as "benhur"
            if let Some(first_word) = first.split(' ').next() {
                if first_word != first {
                    claim(
                        &mut index.by_first_name,
                        first_word.to_string(),
                        driver.id.clone(),
                    );
                }
            }

            index.roster.push(DriverTokens {
                id: driver.id.clone(),
                tokens: full.split_whitespace().map(str::to_string).collect(),
            });
        }

        debug!(
            drivers = drivers.len(),
            first_name_keys = index.by_first_name.len(),
            ambiguous = index.ambiguous_first_names().len(),
            "Built driver index"
        );
        index
    }

    pub fn by_full_name(&self, key: &str) -> Option<&DriverId> {
        self.by_full_name.get(key)
    }

    pub fn by_first_name(&self, key: &str) -> Option<&Slot<DriverId>> {
        self.by_first_name.get(key)
    }

    pub fn roster(&self) -> &[DriverTokens] {
        &self.roster
    }

    /// First-name keys that can never resolve, sorted.
    pub fn ambiguous_first_names(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .by_first_name
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ambiguous))
            .map(|(key, _)| key.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }
}

/// Everything the matcher needs, built once at the start of an import run.
#[derive(Debug, Default)]
pub struct MatchIndex {
    pub children: ChildIndex,
    pub drivers: DriverIndex,
}

impl MatchIndex {
    pub fn build(children: &[Child], drivers: &[Driver]) -> Self {
        Self {
            children: ChildIndex::build(children),
            drivers: DriverIndex::build(drivers),
        }
    }
}
