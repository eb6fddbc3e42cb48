//! DOI normalization and title-similarity helpers shared by all adapters.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::SearchRecord;

/// Bare DOI shape after prefix stripping
static DOI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^10\..+/.+").expect("valid regex"));

/// Minimum Jaccard token similarity for a title lookup to count as a match
pub const TITLE_MATCH_THRESHOLD: f64 = 0.7;

/// Normalize a DOI to bare lowercase form `10.xxxx/yyyy`.
///
/// Strips `https://doi.org/`, `http://doi.org/`, `https://dx.doi.org/`,
/// and `doi:` prefixes. Returns `None` when the remainder does not look
/// like a DOI.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let mut doi = raw.trim().to_lowercase();
    for prefix in [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ] {
        if let Some(rest) = doi.strip_prefix(prefix) {
            doi = rest.trim().to_string();
            break;
        }
    }

    if DOI_RE.is_match(&doi) {
        Some(doi)
    } else {
        None
    }
}

/// Lowercase a title and remove everything that is not alphanumeric or
/// whitespace, collapsing runs of whitespace to single spaces.
pub fn normalize_title(title: &str) -> String {
    let lowered: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Jaccard similarity of the normalized token sets of two titles.
///
/// Symmetric, in [0, 1], case- and punctuation-insensitive. Two titles
/// that both normalize to nothing are considered identical.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    use std::collections::HashSet;

    let norm_a = normalize_title(a);
    let norm_b = normalize_title(b);
    let set_a: HashSet<&str> = norm_a.split_whitespace().collect();
    let set_b: HashSet<&str> = norm_b.split_whitespace().collect();

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Pick the record whose title best matches `title`, requiring at least
/// [`TITLE_MATCH_THRESHOLD`] similarity.
pub fn best_title_match(records: Vec<SearchRecord>, title: &str) -> Option<SearchRecord> {
    let mut best: Option<(f64, SearchRecord)> = None;
    for record in records {
        let score = title_similarity(&record.title, title);
        if score < TITLE_MATCH_THRESHOLD {
            continue;
        }
        match &best {
            Some((current, _)) if *current >= score => {}
            _ => best = Some((score, record)),
        }
    }
    best.map(|(_, record)| record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProviderTag, RecordBuilder};

    #[test]
    fn test_normalize_doi_strips_prefixes() {
        assert_eq!(normalize_doi("https://doi.org/10.1/x").as_deref(), Some("10.1/x"));
        assert_eq!(normalize_doi("http://doi.org/10.1/x").as_deref(), Some("10.1/x"));
        assert_eq!(normalize_doi("doi:10.1/x").as_deref(), Some("10.1/x"));
        assert_eq!(normalize_doi("10.1/x").as_deref(), Some("10.1/x"));
    }

    #[test]
    fn test_normalize_doi_lowercases() {
        assert_eq!(
            normalize_doi("10.1016/J.CELL.2023.01.001").as_deref(),
            Some("10.1016/j.cell.2023.01.001")
        );
    }

    #[test]
    fn test_normalize_doi_rejects_garbage() {
        assert_eq!(normalize_doi(""), None);
        assert_eq!(normalize_doi("not a doi"), None);
        assert_eq!(normalize_doi("10.1016"), None);
        assert_eq!(normalize_doi("https://doi.org/"), None);
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(
            normalize_title("Attention Is All You Need!"),
            "attention is all you need"
        );
        assert_eq!(normalize_title("  A--B   c "), "a b c");
    }

    #[test]
    fn test_similarity_identity_and_symmetry() {
        let titles = [
            "Attention Is All You Need",
            "Deep Residual Learning for Image Recognition",
            "",
        ];
        for t in titles {
            assert!((title_similarity(t, t) - 1.0).abs() < f64::EPSILON);
        }
        let a = "Graph neural networks for molecules";
        let b = "Neural networks on graphs";
        assert!((title_similarity(a, b) - title_similarity(b, a)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_similarity_bounds_and_insensitivity() {
        let a = "Attention Is All You Need";
        let b = "ATTENTION is all YOU need.";
        assert!((title_similarity(a, b) - 1.0).abs() < f64::EPSILON);

        let unrelated = title_similarity("quantum chromodynamics", "protein folding dynamics");
        assert!((0.0..=1.0).contains(&unrelated));
        assert!(unrelated < TITLE_MATCH_THRESHOLD);
    }

    #[test]
    fn test_best_title_match_threshold() {
        let make = |title: &str| {
            RecordBuilder::new(title, ProviderTag::Arxiv)
                .authors(vec!["A Author".to_string()])
                .build()
        };
        let records = vec![make("Completely different subject"), make("Attention is all you need")];

        let hit = best_title_match(records.clone(), "Attention Is All You Need");
        assert_eq!(hit.unwrap().title, "Attention is all you need");

        let miss = best_title_match(records, "Unrelated query about fluid dynamics");
        assert!(miss.is_none());
    }
}
