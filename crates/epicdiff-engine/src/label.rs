//! Target-iteration label parsing.
//!
//! Snapshot producers carry the target iteration as free text ("Iteration 3",
//! "PI 7 - Iteration 2"). The pipeline compares iterations numerically, so the
//! number is extracted by pattern match; a label without one degrades to
//! unknown rather than failing the run.

use std::sync::OnceLock;

use regex::Regex;

/// Matches the last run of digits in a label.
fn trailing_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\D*$").unwrap())
}

/// Extract the iteration number from a free-text label.
///
/// Takes the last run of digits, so "PI 7 - Iteration 2" parses as 2 and
/// "Iteration 12" as 12. Returns `None` when no usable number is present.
pub fn parse_iteration_label(label: &str) -> Option<u32> {
    let caps = trailing_number_re().captures(label.trim())?;
    caps.get(1)?.as_str().parse().ok()
}

/// `true` when the label names exactly the given iteration.
pub fn label_is_iteration(label: &str, iteration: u32) -> bool {
    parse_iteration_label(label) == Some(iteration)
}
