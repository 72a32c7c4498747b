use semver::Version;

use crate::compat::{caret_requirement, parse_version};

/// Returns every candidate that is caret-compatible with `base` and strictly
/// newer than it, newest first.
///
/// Malformed candidates are skipped. A malformed `base` yields an empty list.
pub fn compatible_versions<'a, I>(base: &str, candidates: I) -> Vec<Version>
where
    I: IntoIterator<Item = &'a str>,
{
    let Some(base) = parse_version(base) else {
        return Vec::new();
    };
    let requirement = caret_requirement(&base);

    let mut matched: Vec<Version> = candidates
        .into_iter()
        .filter_map(parse_version)
        .filter(|version| *version > base && requirement.matches(version))
        .collect();
    matched.sort_by(|a, b| b.cmp(a));
    matched.dedup();
    matched
}

pub fn resolve_latest_compatible<'a, I>(base: &str, candidates: I) -> Option<Version>
where
    I: IntoIterator<Item = &'a str>,
{
    let base = parse_version(base)?;
    let requirement = caret_requirement(&base);

    candidates
        .into_iter()
        .filter_map(parse_version)
        .filter(|version| *version > base && requirement.matches(version))
        .max()
}
