// src/version/mod.rs

//! Best-effort version comparison for package metadata
//!
//! Remote metadata carries free-form version strings ("8.5.0", "1.2",
//! "2024.01-3", "9.0p1"). Strings that are valid semver compare with semver
//! rules; anything else falls back to a numeric-segment comparison where
//! each dot/dash separated segment contributes its leading digits and
//! missing segments count as zero.

use semver::Version;
use std::cmp::Ordering;

/// Split a version string into numeric segments
///
/// Each segment contributes its leading digits; segments without any
/// leading digit count as `0`.
fn numeric_segments(version: &str) -> Vec<u64> {
    version
        .trim()
        .trim_start_matches(['v', 'V'])
        .split(['.', '-', '_', '+', '~'])
        .map(|segment| {
            let digits: String = segment.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

fn compare_segments(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Compare two version strings
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if let (Ok(left), Ok(right)) = (Version::parse(a.trim()), Version::parse(b.trim())) {
        return left.cmp(&right);
    }
    compare_segments(&numeric_segments(a), &numeric_segments(b))
}

/// True when `candidate` is strictly newer than `current`
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare_versions(candidate, current) == Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semver_ordering() {
        assert_eq!(compare_versions("1.2.3", "1.10.0"), Ordering::Less);
        assert_eq!(compare_versions("2.0.0-rc1", "2.0.0"), Ordering::Less);
    }

    #[test]
    fn test_numeric_fallback_pads_missing_segments() {
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.2", "1.2.1"), Ordering::Less);
        assert_eq!(compare_versions("8.5", "8.4.9"), Ordering::Greater);
    }

    #[test]
    fn test_numeric_fallback_uses_leading_digits() {
        assert!(is_newer("9.0p1", "8.9p1"));
        assert!(is_newer("2024.02-1", "2024.01-3"));
        assert!(!is_newer("1.0", "1.0"));
    }

    #[test]
    fn test_non_numeric_versions_compare_equal() {
        assert_eq!(compare_versions("latest", "stable"), Ordering::Equal);
        assert!(!is_newer("latest", "stable"));
    }
}
