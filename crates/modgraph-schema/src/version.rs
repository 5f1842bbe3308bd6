//! Version coercion and match-expression semantics.
//!
//! Mod authors put almost anything into version fields: `1.2.3`, `v1.2`,
//! `1.02.3`, `1.2.3hotfix1`, `2024.01.01`. The engine needs to compare these
//! and test them against match expressions that are either pinned ("this
//! exact version") or fuzzy ("any 1.x", "*", "1.2.3+prefer"). This module
//! centralizes the lenient coercion and the exact/fuzzy distinction so every
//! caller agrees on them.

use regex::Regex;
use semver::{Prerelease, Version, VersionReq};
use std::sync::OnceLock;

fn three_part_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)(.*)$").expect("static regex"))
}

fn coerceable_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^v?[0-9.]+$").expect("static regex"))
}

/// Coerce a real-world version string into a semantic version.
///
/// Strings with three leading numeric segments keep any trailing text as a
/// pre-release identifier (`1.2.3hotfix1` -> `1.2.3-hotfix1`). Purely numeric
/// strings with fewer segments are padded (`v1.2` -> `1.2.0`), with leading
/// zeros stripped (`1.02` -> `1.2.0`). Anything else is not a version.
pub fn coerce_to_semver(input: &str) -> Option<Version> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Some(caps) = three_part_re().captures(input) {
        let major: u64 = caps[1].parse().ok()?;
        let minor: u64 = caps[2].parse().ok()?;
        let patch: u64 = caps[3].parse().ok()?;
        let rest = caps[4].trim();
        if rest.is_empty() {
            return Some(Version::new(major, minor, patch));
        }
        let pre = rest
            .trim_start_matches(['.', '-', '+'])
            .replace(' ', ".")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '.')
            .collect::<String>();
        let mut version = Version::new(major, minor, patch);
        if let Ok(pre) = Prerelease::new(&pre) {
            version.pre = pre;
        }
        return Some(version);
    }

    if coerceable_re().is_match(input) {
        let mut segments = input.trim_start_matches('v').split('.').filter(|s| !s.is_empty());
        let major: u64 = segments.next()?.parse().ok()?;
        let minor: u64 = match segments.next() {
            Some(s) => s.parse().ok()?,
            None => 0,
        };
        return Some(Version::new(major, minor, 0));
    }

    None
}

/// Coerce when the input looks like a bare version, pass it through otherwise.
///
/// Used where a string is compared against another string that may or may not
/// be a version (e.g. a match expression like `>=1.2`).
pub fn safe_coerce(input: &str) -> String {
    if coerceable_re().is_match(input.trim()) || three_part_re().is_match(input.trim()) {
        coerce_to_semver(input).map_or_else(|| input.to_string(), |v| v.to_string())
    } else {
        input.to_string()
    }
}

/// Whether the input is a single pinned version rather than a range: purely
/// numeric (`1.5`, `v2.0.1`) or three segments with a pre-release/build tail
/// (`1.0.0-beta`), but nothing with range syntax in it.
fn is_pinned_version(input: &str) -> bool {
    if coerceable_re().is_match(input) {
        return true;
    }
    three_part_re().captures(input).is_some_and(|caps| {
        caps[4]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'))
    })
}

/// Whether a version-match expression is fuzzy (a range) rather than pinned.
///
/// `*` and `+prefer`-suffixed expressions are always fuzzy. A bare version
/// string -- including partial ones like `1.5`, which must match exactly
/// because they may not be semantic versions at all -- is exact. Anything
/// else that parses as a semver range (`^1.2`, `>=1.0, <2.0`) is fuzzy.
pub fn is_fuzzy_version(input: &str) -> bool {
    if input.is_empty() {
        return false;
    }
    if input == "*" || input.ends_with("+prefer") {
        return true;
    }
    if is_pinned_version(input) {
        return false;
    }
    VersionReq::parse(input).is_ok()
}

fn release_of(version: &Version) -> Version {
    Version::new(version.major, version.minor, version.patch)
}

fn req_matches(req: &VersionReq, version: &Version) -> bool {
    if req.matches(version) {
        return true;
    }
    // mod versions use pre-release tags loosely; let them match ranges their
    // release counterpart would match
    !version.pre.is_empty() && req.matches(&release_of(version))
}

/// Test a version string against a match expression.
///
/// The version is coerced first; an uncoercible version satisfies nothing.
/// A full bare expression (`1.2.3`) is an exact coerced comparison, a
/// partial one (`1.5`) a prefix range (`1.5.x`), and anything else semver
/// range satisfaction. A `+prefer` suffix is stripped before evaluation.
pub fn version_satisfies(version: &str, expression: &str) -> bool {
    let expression = expression.split('+').next().unwrap_or(expression).trim();
    let Some(version) = coerce_to_semver(version) else {
        return false;
    };
    if expression.is_empty() || expression == "*" {
        return true;
    }

    if is_pinned_version(expression) {
        if three_part_re().is_match(expression) {
            return coerce_to_semver(expression).is_some_and(|exact| exact == version);
        }
        // partial pin like "1.5": any 1.5.x qualifies
        return VersionReq::parse(&format!("~{}", expression.trim_start_matches('v')))
            .is_ok_and(|req| req_matches(&req, &version));
    }

    match VersionReq::parse(expression) {
        Ok(req) => req_matches(&req, &version),
        Err(_) => false,
    }
}
