//! Similarity scoring between an expected answer and a model's answer.
//!
//! Both inputs are normalized first (ASCII letters and digits only, lower-cased)
//! so cosmetic differences such as casing, spacing and punctuation collapse.
//! Two independent judgments are offered:
//!
//! - [`score_answer`]: graded signal in `[0, 1]` for ranking and analysis
//! - [`is_pass`]: stricter boolean used for pass rates

/// Strip every character that is not an ASCII letter or digit and lower-case the rest.
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Levenshtein distance with unit cost for insert, delete and substitute.
///
/// Operates on the strings as given; callers pass normalized input.
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Graded score for an answer.
///
/// | Condition (after normalization) | Score |
/// |---------------------------------|-------|
/// | candidate empty                 | 0.0   |
/// | exact match                     | 1.0   |
/// | either contains the other       | 0.8   |
/// | edit distance 1                 | 0.6   |
/// | edit distance 2                 | 0.4   |
/// | otherwise                       | 0.0   |
pub fn score_answer(expected: &str, got: &str) -> f64 {
    let e = normalize(expected);
    let g = normalize(got);

    if g.is_empty() {
        return 0.0;
    }
    if e == g {
        return 1.0;
    }
    if g.contains(&e) || e.contains(&g) {
        return 0.8;
    }

    match edit_distance(&e, &g) {
        1 => 0.6,
        2 => 0.4,
        _ => 0.0,
    }
}

/// Pass/fail judgment for an answer.
///
/// Passes on exact match or containment in either direction. Otherwise a single
/// typo is tolerated, except for expected answers of two characters or fewer,
/// where "AT" and "IT" must not be conflated.
pub fn is_pass(expected: &str, got: &str) -> bool {
    let e = normalize(expected);
    let g = normalize(got);

    if g.is_empty() {
        return false;
    }
    if e == g {
        return true;
    }
    if g.contains(&e) || e.contains(&g) {
        return true;
    }
    if e.len() <= 2 {
        return false;
    }

    edit_distance(&e, &g) <= 1
}
