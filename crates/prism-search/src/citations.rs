//! Report citations in a global search answer, e.g. `[Data: Reports (2, 7, 64, +more)]`.

use std::sync::LazyLock;

use regex::Regex;

static REPORT_CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Reports\s*\(([\d,\s]*)").expect("valid regex"));

/// Distinct report ids cited in `answer`, in order of first appearance.
#[must_use]
pub fn cited_report_ids(answer: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for capture in REPORT_CITATION.captures_iter(answer) {
        for id in capture[1].split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}
