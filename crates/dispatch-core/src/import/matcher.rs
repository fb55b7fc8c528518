//! Resolution of sheet names to roster records.
//!
//! Children resolve only by exact normalized full name. A wrong child means a
//! wrong pickup, so there is no looser fallback.
//!
//! Drivers are written on pairing sheets however the dispatcher remembers
//! them ("Benhur", "Alexandre Nery", "Denis C", "Evaldo - PM Only"), so driver
//! labels go through three tiers, first hit wins:
//!
//! 1. the cleaned label equals a driver's full name;
//! 2. the cleaned label equals a first name (or first word of a first name)
//!    that belongs to exactly one driver;
//! 3. every word of the label is a prefix of some word of exactly one driver's
//!    full name, in any order.
//!
//! A tier that sees more than one plausible driver never picks one.

use std::fmt;

use serde::Serialize;
use tracing::trace;

#[cfg(feature = "ts")]
use ts_rs::TS;

use crate::models::{Child, ChildId, Driver, DriverId};

use super::index::{MatchIndex, Slot};
use super::normalize::{clean_driver_label, full_name_key, is_unassigned_label};

/// Which strategy resolved a driver label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub enum MatchTier {
    FullName,
    FirstName,
    TokenContainment,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchTier::FullName => write!(f, "full name"),
            MatchTier::FirstName => write!(f, "first name"),
            MatchTier::TokenContainment => write!(f, "token containment"),
        }
    }
}

/// Why a driver label did not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmatchedReason {
    /// The cell intentionally names nobody: blank, "No Ride", "Parent", or
    /// nothing left after cleaning.
    Unassigned,
    /// No driver fits the label.
    NotFound,
    /// More than one driver fits the label.
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverMatch {
    Matched { driver: DriverId, tier: MatchTier },
    Unmatched(UnmatchedReason),
}

/// Name resolver over one roster snapshot.
#[derive(Debug)]
pub struct Matcher {
    index: MatchIndex,
}

impl Matcher {
    pub fn new(index: MatchIndex) -> Self {
        Self { index }
    }

    pub fn from_roster(children: &[Child], drivers: &[Driver]) -> Self {
        Self::new(MatchIndex::build(children, drivers))
    }

    pub fn index(&self) -> &MatchIndex {
        &self.index
    }

    pub fn match_child(&self, first: &str, last: &str) -> Option<ChildId> {
        let key = full_name_key(first, last);
        if key.trim().is_empty() {
            return None;
        }
        self.index.children.get(&key).cloned()
    }

    pub fn match_driver(&self, raw: &str) -> DriverMatch {
        if is_unassigned_label(raw) {
            return DriverMatch::Unmatched(UnmatchedReason::Unassigned);
        }
        let key = clean_driver_label(raw);
        if key.is_empty() {
            return DriverMatch::Unmatched(UnmatchedReason::Unassigned);
        }

        let drivers = &self.index.drivers;

        // Drivers without a surname are keyed as "first " (trailing space)
        let full = drivers
            .by_full_name(&key)
            .or_else(|| drivers.by_full_name(&format!("{} ", key)));
        if let Some(id) = full {
            return matched(id, MatchTier::FullName, &key);
        }

        let mut ambiguous = false;
        match drivers.by_first_name(&key) {
            Some(Slot::Unique(id)) => return matched(id, MatchTier::FirstName, &key),
            Some(Slot::Ambiguous) => ambiguous = true,
            None => {}
        }

        let candidates = self.containment_candidates(&key);
        match candidates.as_slice() {
            [only] => matched(only, MatchTier::TokenContainment, &key),
            [] if !ambiguous => DriverMatch::Unmatched(UnmatchedReason::NotFound),
            _ => {
                trace!(label = %key, candidates = candidates.len(), "Ambiguous driver label");
                DriverMatch::Unmatched(UnmatchedReason::Ambiguous)
            }
        }
    }

    /// Drivers whose name words cover every word of `key` by prefix.
    /// Stops at two, which is already too many.
    fn containment_candidates(&self, key: &str) -> Vec<&DriverId> {
        let label_tokens: Vec<&str> = key.split_whitespace().collect();
        self.index
            .drivers
            .roster()
            .iter()
            .filter(|driver| {
                label_tokens
                    .iter()
                    .all(|lt| driver.tokens.iter().any(|dt| dt.starts_with(lt)))
            })
            .map(|driver| &driver.id)
            .take(2)
            .collect()
    }
}

fn matched(id: &DriverId, tier: MatchTier, key: &str) -> DriverMatch {
    trace!(label = %key, driver = %id, tier = %tier, "Driver label resolved");
    DriverMatch::Matched {
        driver: id.clone(),
        tier,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(drivers: &[(&str, &str, &str)]) -> Matcher {
        let drivers: Vec<Driver> = drivers
            .iter()
            .map(|(id, first, last)| Driver::new(*id, first, last))
            .collect();
        let children = vec![
            Child::new("c1", "Ana", "Lima"),
            Child::new("c2", "Astrid", "Vargus Lara"),
        ];
        Matcher::from_roster(&children, &drivers)
    }

    fn hit(id: &str, tier: MatchTier) -> DriverMatch {
        DriverMatch::Matched {
            driver: DriverId::new(id),
            tier,
        }
    }

    // -------------------------------------------------------------------------
    // Children
    // -------------------------------------------------------------------------

    #[test]
    fn test_match_child_exact_normalized() {
        let m = matcher(&[]);
        assert_eq!(m.match_child("Ana", "Lima"), Some(ChildId::new("c1")));
        assert_eq!(m.match_child(" ANA ", "lima "), Some(ChildId::new("c1")));
        assert_eq!(
            m.match_child("Astrid", " Vargus  Lara "),
            Some(ChildId::new("c2"))
        );
    }

    #[test]
    fn test_match_child_has_no_fuzzy_fallback() {
        let m = matcher(&[]);
        assert_eq!(m.match_child("Ana", ""), None);
        assert_eq!(m.match_child("Ana", "Lim"), None);
        assert_eq!(m.match_child("Astrid", "Vargus"), None);
        assert_eq!(m.match_child("", ""), None);
    }

    // -------------------------------------------------------------------------
    // Sentinels
    // -------------------------------------------------------------------------

    #[test]
    fn test_sentinels_are_unassigned() {
        let m = matcher(&[("d1", "Parent", "Volunteer")]);
        for raw in ["NO RIDE", "no ride", "", "   ", "Parent", "PARENT", "PM Only", " - "] {
            let result = m.match_driver(raw);
            assert_eq!(
                result,
                DriverMatch::Unmatched(UnmatchedReason::Unassigned),
                "label {:?}",
                raw
            );
        }
    }

    // -------------------------------------------------------------------------
    // Tiers
    // -------------------------------------------------------------------------

    #[test]
    fn test_full_name_tier() {
        let m = matcher(&[("d1", "John", "Smith"), ("d2", "John", "Cotten")]);
        assert_eq!(m.match_driver("John Smith"), hit("d1", MatchTier::FullName));
        assert_eq!(m.match_driver(" john smith - PM Only"), hit("d1", MatchTier::FullName));
    }

    #[test]
    fn test_full_name_tier_without_surname() {
        let m = matcher(&[("d1", "Fatima", ""), ("d2", "Fatima Maria", "Souza")]);
        // "fatima" is ambiguous as a first name, but is d1's whole name
        assert_eq!(m.match_driver("Fatima"), hit("d1", MatchTier::FullName));
    }

    #[test]
    fn test_unique_first_name_tier() {
        let m = matcher(&[
            ("d1", "Evaldo", "Simao da Silva"),
            ("d2", "Benhur Calixto", "De Quevedo"),
        ]);
        assert_eq!(m.match_driver("Evaldo PM ONLY"), hit("d1", MatchTier::FirstName));
        assert_eq!(m.match_driver(" Evaldo - PM Only "), hit("d1", MatchTier::FirstName));
        assert_eq!(m.match_driver("Benhur"), hit("d2", MatchTier::FirstName));
        assert_eq!(m.match_driver("benhur calixto"), hit("d2", MatchTier::FirstName));
    }

    #[test]
    fn test_first_name_ambiguity_refused() {
        let m = matcher(&[("d1", "Maria", "Santos"), ("d2", "Maria", "Silva")]);
        assert_eq!(
            m.match_driver("Maria"),
            DriverMatch::Unmatched(UnmatchedReason::Ambiguous)
        );

        // A full name still resolves
        assert_eq!(m.match_driver("Maria Silva"), hit("d2", MatchTier::FullName));
    }

    #[test]
    fn test_token_containment_unique() {
        let m = matcher(&[("d1", "Alexandre", "Magalhaes Nery"), ("d2", "John", "Smith")]);
        assert_eq!(
            m.match_driver("Alexandre Nery"),
            hit("d1", MatchTier::TokenContainment)
        );
        // Order does not matter
        assert_eq!(
            m.match_driver("Nery Alexandre"),
            hit("d1", MatchTier::TokenContainment)
        );
    }

    #[test]
    fn test_token_containment_two_candidates_is_unmatched() {
        let m = matcher(&[
            ("d1", "Alexandre", "Magalhaes Nery"),
            ("d2", "Alexandre", "Oliveira Nery"),
        ]);
        assert_eq!(
            m.match_driver("Alexandre Nery"),
            DriverMatch::Unmatched(UnmatchedReason::Ambiguous)
        );
    }

    #[test]
    fn test_token_containment_by_prefix() {
        let m = matcher(&[
            ("d1", "Alexandre", "Nascimento Carvalho"),
            ("d2", "Alexandre", "Magalhaes Nery"),
            ("d3", "Denis", "Campos"),
        ]);
        assert_eq!(m.match_driver("Alexandre C"), hit("d1", MatchTier::TokenContainment));
        assert_eq!(m.match_driver("Denis C"), hit("d3", MatchTier::TokenContainment));
    }

    #[test]
    fn test_unknown_label_not_found() {
        let m = matcher(&[("d1", "John", "Smith")]);
        assert_eq!(
            m.match_driver("Zelda"),
            DriverMatch::Unmatched(UnmatchedReason::NotFound)
        );
    }

    #[test]
    fn test_misspelling_is_not_guessed() {
        // "Behur" is a typo for Benhur; prefix matching does not cover it
        let m = matcher(&[("d1", "Benhur", "Calixto")]);
        assert_eq!(
            m.match_driver("Behur PM Only"),
            DriverMatch::Unmatched(UnmatchedReason::NotFound)
        );
    }
}
