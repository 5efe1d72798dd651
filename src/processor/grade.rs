//! Letter-grade ordering for classification values ("A+", "B", "D-").

use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static GRADE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z])([+-])?$").expect("valid grade pattern"));

/// Rank of a grade-shaped value, `None` for anything else.
///
/// `A` ranks 26, `B` 25 and so on; a trailing `+` adds 0.2 and a trailing
/// `-` subtracts 0.2.
pub fn grade_rank(value: &str) -> Option<f64> {
    let value = value.trim().to_uppercase();
    let captures = GRADE_PATTERN.captures(&value)?;

    let letter = captures.get(1)?.as_str().bytes().next()?;
    let base = 26.0 - f64::from(letter - b'A');
    let bump = match captures.get(2).map(|m| m.as_str()) {
        Some("+") => 0.2,
        Some("-") => -0.2,
        _ => 0.0,
    };

    Some(base + bump)
}

/// Case-insensitive comparison used for non-grade labels.
///
/// Compares lowercased code points, not locale collation: accented letters
/// are not folded, so "Étoile" sorts after "Zebra".
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Best grade first; ungraded labels after every grade, alphabetically.
pub fn compare_grades_desc(a: &str, b: &str) -> Ordering {
    match (grade_rank(a), grade_rank(b)) {
        (Some(ar), Some(br)) => br.total_cmp(&ar),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => compare_labels(a, b),
    }
}

/// Orders classification options for dropdowns and legends.
pub fn sort_classification_options<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    let mut sorted: Vec<String> = values.iter().map(|v| v.as_ref().to_string()).collect();
    sorted.sort_by(|a, b| compare_grades_desc(a, b));
    sorted
}
