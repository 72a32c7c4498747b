use semver::{Comparator, Op, Version, VersionReq};

/// Parses a version string, tolerating a single leading `v`.
///
/// Returns `None` for anything that is not a full `MAJOR.MINOR.PATCH[-pre]`
/// version; callers treat such entries as absent rather than as errors.
pub fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).ok()
}

/// Builds the `^base` requirement without a string round-trip.
///
/// Prerelease candidates only match when they share `base`'s
/// `MAJOR.MINOR.PATCH` and `base` itself carries a prerelease tag.
pub fn caret_requirement(base: &Version) -> VersionReq {
    VersionReq {
        comparators: vec![Comparator {
            op: Op::Caret,
            major: base.major,
            minor: Some(base.minor),
            patch: Some(base.patch),
            pre: base.pre.clone(),
        }],
    }
}
