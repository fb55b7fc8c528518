//! Comparison keys for free-text names.
//!
//! Every name that takes part in matching goes through `normalize` first, so a
//! key built from the roster and a key built from a sheet cell compare equal
//! whenever they differ only in case or spacing.

use std::sync::OnceLock;

use regex::Regex;

/// Shift-availability notes written after a driver's name.
static PM_ONLY: OnceLock<Regex> = OnceLock::new();
static AM_ONLY: OnceLock<Regex> = OnceLock::new();
/// A hyphen and everything after it ("Abdul - Wed Only", "Denis- PM").
static HYPHEN_TAIL: OnceLock<Regex> = OnceLock::new();

fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("name cleaning pattern is valid"))
}

/// Lower-case, trim and collapse inner whitespace runs to a single space.
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Key for a first/last name pair: `"first last"`.
///
/// A blank last name leaves a trailing space, matching how roster keys for
/// drivers without a surname are built.
pub fn full_name_key(first: &str, last: &str) -> String {
    format!("{} {}", normalize(first), normalize(last))
}

/// Reduce a driver cell from a pairing sheet to the part that names the driver.
///
/// Removes "pm only" / "am only" qualifiers with their surrounding whitespace,
/// then drops everything from the first hyphen on.
pub fn clean_driver_label(raw: &str) -> String {
    let n = normalize(raw);
    let n = pattern(&PM_ONLY, r"\s*pm only\s*").replace_all(&n, "");
    let n = pattern(&AM_ONLY, r"\s*am only\s*").replace_all(&n, "");
    let n = pattern(&HYPHEN_TAIL, r"\s*-.*$").replace(&n, "");
    n.trim().to_string()
}

/// Driver cells that mean "nobody drives this leg" rather than naming someone.
pub fn is_unassigned_label(raw: &str) -> bool {
    matches!(normalize(raw).as_str(), "" | "no ride" | "parent")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_case_and_spacing() {
        assert_eq!(normalize("  John  "), "john");
        assert_eq!(normalize(" Vargus   Lara "), "vargus lara");
        assert_eq!(normalize("DeMilton\tdos Santos"), "demilton dos santos");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_full_name_key() {
        assert_eq!(full_name_key(" Ana ", "LIMA"), "ana lima");
        assert_eq!(full_name_key("Fatima", ""), "fatima ");
    }

    #[test]
    fn test_clean_driver_label_qualifiers() {
        assert_eq!(clean_driver_label("Evaldo PM ONLY"), clean_driver_label("evaldo"));
        assert_eq!(clean_driver_label("Camila PM Only"), "camila");
        assert_eq!(clean_driver_label(" Hashim PM Only "), "hashim");
        assert_eq!(clean_driver_label("Karla am only"), "karla");
    }

    #[test]
    fn test_clean_driver_label_hyphen_tail() {
        assert_eq!(
            clean_driver_label("Alexandre Nery - AM"),
            clean_driver_label("alexandre nery")
        );
        assert_eq!(clean_driver_label(" Nancy - PM Only "), "nancy");
        assert_eq!(clean_driver_label("Denis- PM Only"), "denis");
        assert_eq!(clean_driver_label(" Abdul - Wed Only "), "abdul");
        assert_eq!(clean_driver_label("Teresa -Wed"), "teresa");
    }

    #[test]
    fn test_clean_driver_label_only_qualifier_is_empty() {
        assert_eq!(clean_driver_label("PM ONLY"), "");
        assert_eq!(clean_driver_label(" - PM Only"), "");
        assert_eq!(clean_driver_label("-"), "");
    }

    #[test]
    fn test_is_unassigned_label() {
        assert!(is_unassigned_label("NO RIDE"));
        assert!(is_unassigned_label("No Ride"));
        assert!(is_unassigned_label(" no  ride "));
        assert!(is_unassigned_label("Parent"));
        assert!(is_unassigned_label("PARENT"));
        assert!(is_unassigned_label(""));
        assert!(is_unassigned_label("   "));
        assert!(!is_unassigned_label("Parenti"));
        assert!(!is_unassigned_label("NPU"));
    }
}
