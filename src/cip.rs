//! CIP code canonicalization.
//!
//! NCES and DHS render the same code in several shapes: a 2-digit family
//! (`14`), a 4-digit rollup (`14.09`), a 6-digit program code (`14.0903`),
//! and occasionally a bracketed code for moved/deleted entries (`[14.0901]`).
//! Everything downstream keys on the canonical `FF.SSDD` form.

use std::sync::LazyLock;

use regex::Regex;

static CANONICAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}\.\d{4}$").unwrap());
static ANY_LEVEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}(?:\.\d{2}(?:\d{2})?)?$").unwrap());

/// Map any accepted CIP representation to `FF.SSDD`.
///
/// Never fails: unrecognized shapes come back trimmed but otherwise
/// unchanged, so the validator (not this function) decides what to reject.
///
/// ```text
/// "14"        -> "14.0000"
/// "14.09"     -> "14.0900"
/// "14.0903"   -> "14.0903"
/// "[14.0901]" -> "14.0901"
/// "14.9"      -> "14.9000"
/// "abc"       -> "abc"
/// ```
pub fn canonicalize(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }

    let s = strip_wrapper(s);
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();

    let Some((left, right)) = s.split_once('.') else {
        if is_digits(&s, 2) {
            return format!("{s}.0000");
        }
        return s;
    };

    if !is_digits(left, 2) {
        return s;
    }

    match right.len() {
        2 if all_digits(right) => format!("{left}.{right}00"),
        4 if all_digits(right) => format!("{left}.{right}"),
        1..=4 if all_digits(right) => format!("{left}.{right:0<4}"),
        _ => s,
    }
}

/// 2-digit family prefix of a canonical code (`"14.0900"` -> `"14"`).
pub fn family(canonical: &str) -> &str {
    canonical.split('.').next().unwrap_or("")
}

/// Strict canonical check: exactly `\d{2}\.\d{4}`.
pub fn is_canonical(s: &str) -> bool {
    CANONICAL_RE.is_match(s)
}

/// Loose check accepting 2-, 4- and 6-digit shapes as NCES prints them.
pub fn is_cip_shaped(s: &str) -> bool {
    ANY_LEVEL_RE.is_match(s)
}

/// Drop `[...]` / `(...)` wrappers. Nested or lopsided wrappers go too, so a
/// second pass never finds anything left to strip.
fn strip_wrapper(s: &str) -> &str {
    s.trim_matches(|c: char| matches!(c, '[' | ']' | '(' | ')') || c.is_whitespace())
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && all_digits(s)
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
