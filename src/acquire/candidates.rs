//! Pure candidate-URL generation: publisher-specific URL transforms and
//! DOI-to-PDF pattern expansion.
//!
//! Both entry points are deterministic, order-preserving, duplicate-free
//! and perform no I/O. [`transform_url`] never returns its input.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::acquire::plan::{AttemptKind, UrlCandidate};

static PMC_NCBI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)ncbi\.nlm\.nih\.gov/pmc/articles/pmc(\d+)").expect("valid regex"));
static PMC_HOST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)pmc\.ncbi\.nlm\.nih\.gov/articles/pmc(\d+)").expect("valid regex"));
static PMC_EUROPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)europepmc\.org/(?:article/pmc/|articles/pmc)(\d+)").expect("valid regex")
});

static ARXIV_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)arxiv\.org/(?:abs|pdf)/(\d{4}\.\d{4,5}|[a-z-]+(?:\.[a-z]{2})?/\d{7})(v\d+)?")
        .expect("valid regex")
});

static RXIV_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(biorxiv|medrxiv)\.org/content/(10\.1101/[0-9.v]+?)(?:v\d+)?(?:\.full)?(?:\.pdf)?(?:[?#]|$)")
        .expect("valid regex")
});

static ELSEVIER_PII_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)sciencedirect\.com/science/article/(?:abs/)?pii/([A-Z0-9]+)")
        .expect("valid regex")
});

static MDPI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)mdpi\.com/(\d{4}-\d{3,4}/\d+/\d+/\d+)(?:/|$|\?)").expect("valid regex"));

static FRONTIERS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)frontiersin\.org/articles/(10\.\d{4,9}/[^/?#]+)").expect("valid regex")
});

static NATURE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)nature\.com/articles/([a-z0-9.-]+?)(?:\.pdf)?(?:[?#]|$)").expect("valid regex"));

static OUP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)academic\.oup\.com/([a-z-]+)/article(?:-abstract)?/").expect("valid regex")
});

static IEEE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)ieeexplore\.ieee\.org/(?:abstract/)?document/(\d+)").expect("valid regex")
});

static OSF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)osf\.io/([a-z0-9]{5})(?:/|$|\?)").expect("valid regex"));

static PREPRINTS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)preprints\.org/manuscript/([0-9.]+)/v(\d+)").expect("valid regex")
});

/// Numeric tail of an IEEE DOI (`10.1109/TPAMI.2019.2913372` -> `2913372`)
static IEEE_DOI_TAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(\d{6,})$").expect("valid regex"));

/// Produce ordered alternative PDF URLs for any input URL.
///
/// Every matching publisher rule contributes its candidates in rule
/// order; the input itself is never emitted and duplicates are dropped.
/// Returns an empty list when no rule matches.
pub fn transform_url(url: &str) -> Vec<UrlCandidate> {
    let mut out = Emitter::excluding(url);

    // PMC, from any of the three URL shapes
    if let Some(id) = first_capture(&[&PMC_NCBI_RE, &PMC_HOST_RE, &PMC_EUROPE_RE], url) {
        for candidate in [
            format!("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC{}/pdf/", id),
            format!("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC{}/pdf/main.pdf", id),
            format!("https://pmc.ncbi.nlm.nih.gov/articles/PMC{}/pdf/", id),
            format!("https://pmc.ncbi.nlm.nih.gov/articles/PMC{}/pdf/main.pdf", id),
            format!("https://europepmc.org/articles/PMC{}?pdf=render", id),
            format!("https://www.ebi.ac.uk/europepmc/webservices/rest/PMC{}/fullTextPDF", id),
        ] {
            out.push(candidate, "pmc");
        }
    }

    if let Some(caps) = ARXIV_RE.captures(url) {
        let id = &caps[1];
        out.push(format!("https://arxiv.org/pdf/{}.pdf", id), "arxiv");
        out.push(format!("https://export.arxiv.org/pdf/{}.pdf", id), "arxiv");
    }

    if let Some(caps) = RXIV_RE.captures(url) {
        let server = caps[1].to_lowercase();
        let doi = caps[2].trim_end_matches('.');
        out.push(
            format!("https://www.{}.org/content/{}.full.pdf", server, doi),
            "biorxiv",
        );
    }

    if let Some(caps) = ELSEVIER_PII_RE.captures(url) {
        out.push(
            format!(
                "https://www.sciencedirect.com/science/article/pii/{}/pdfft?isDTMRedir=true&download=true",
                &caps[1]
            ),
            "elsevier",
        );
    }

    if let Some(caps) = MDPI_RE.captures(url) {
        out.push(format!("https://www.mdpi.com/{}/pdf", &caps[1]), "mdpi");
    }

    if let Some(caps) = FRONTIERS_RE.captures(url) {
        let doi = &caps[1];
        out.push(
            format!("https://www.frontiersin.org/articles/{}/pdf", doi),
            "frontiers",
        );
        out.push(
            format!("https://www.frontiersin.org/articles/{}/full/pdf", doi),
            "frontiers",
        );
    }

    if let Some(caps) = NATURE_RE.captures(url) {
        out.push(format!("https://www.nature.com/articles/{}.pdf", &caps[1]), "nature");
    }

    if OUP_RE.is_match(url) && url.contains("/article/") {
        out.push(url.replace("/article/", "/article-pdf/"), "oup");
    }

    if let Some(caps) = IEEE_RE.captures(url) {
        let id = &caps[1];
        out.push(
            format!("https://ieeexplore.ieee.org/stamp/stamp.jsp?tp=&arnumber={}", id),
            "ieee",
        );
        out.push(
            format!("https://ieeexplore.ieee.org/stampPDF/getPDF.jsp?tp=&arnumber={}", id),
            "ieee",
        );
    }

    if let Some(caps) = OSF_RE.captures(url) {
        out.push(format!("https://osf.io/{}/download", &caps[1]), "osf");
    }

    if let Some(caps) = PREPRINTS_RE.captures(url) {
        out.push(
            format!(
                "https://www.preprints.org/manuscript/{}/v{}/download",
                &caps[1], &caps[2]
            ),
            "preprints",
        );
    }

    out.into_candidates()
}

/// Expand a bare DOI into publisher-specific PDF URL patterns.
///
/// Unrecognized prefixes fall back to the `doi.org` resolver. Output is
/// ordered and duplicate-free.
pub fn doi_to_urls(doi: &str) -> Vec<UrlCandidate> {
    let doi = doi.trim();
    if doi.is_empty() {
        return Vec::new();
    }

    let mut out = DoiEmitter::new();
    let suffix = doi.split_once('/').map(|(_, tail)| tail).unwrap_or_default();

    if doi.starts_with("10.1016/") || doi.starts_with("10.1017/") {
        // Elsevier hides the PII in the DOI tail often enough to try
        let pii: String = suffix
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_uppercase();
        if !pii.is_empty() {
            out.push(
                format!(
                    "https://www.sciencedirect.com/science/article/pii/{}/pdfft?isDTMRedir=true&download=true",
                    pii
                ),
                "elsevier",
            );
        }
    } else if doi.starts_with("10.1007/") {
        out.push(
            format!("https://link.springer.com/content/pdf/{}.pdf", doi),
            "springer",
        );
    } else if doi.starts_with("10.1038/") {
        out.push(
            format!("https://link.springer.com/content/pdf/{}.pdf", doi),
            "springer",
        );
        out.push(format!("https://www.nature.com/articles/{}.pdf", suffix), "nature");
    } else if doi.starts_with("10.1002/") || doi.starts_with("10.1111/") {
        out.push(
            format!("https://onlinelibrary.wiley.com/doi/pdfdirect/{}", doi),
            "wiley",
        );
    } else if doi.starts_with("10.1371/") {
        out.push(
            format!(
                "https://journals.plos.org/plosone/article/file?id={}&type=printable",
                doi
            ),
            "plos",
        );
    } else if doi.starts_with("10.3389/") {
        out.push(format!("https://www.frontiersin.org/articles/{}/pdf", doi), "frontiers");
    } else if doi.starts_with("10.3390/") {
        out.push(format!("https://www.mdpi.com/article/{}/pdf", doi), "mdpi");
    } else if doi.starts_with("10.1093/") {
        out.push(format!("https://academic.oup.com/view-pdf/doi/{}", doi), "oup");
    } else if doi.starts_with("10.1109/") {
        if let Some(caps) = IEEE_DOI_TAIL_RE.captures(suffix) {
            let article_id = &caps[1];
            out.push(
                format!("https://ieeexplore.ieee.org/document/{}", article_id),
                "ieee",
            );
            out.push(
                format!(
                    "https://ieeexplore.ieee.org/stamp/stamp.jsp?tp=&arnumber={}",
                    article_id
                ),
                "ieee",
            );
        }
    } else if doi.starts_with("10.31234/osf.io/") || doi.starts_with("10.31219/osf.io/") {
        if let Some(id) = doi.rsplit('/').next() {
            out.push(format!("https://osf.io/{}/download", id), "osf");
        }
    }

    if out.is_empty() {
        // Resolver fallback for unmapped prefixes
        out.push(format!("https://doi.org/{}", doi), "doi-resolver");
    }

    out.into_candidates()
}

fn first_capture(patterns: &[&Lazy<Regex>], url: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(url).map(|caps| caps[1].to_string()))
}

/// Collects transform candidates, excluding the input URL and duplicates
struct Emitter {
    exclude: String,
    seen: std::collections::HashSet<String>,
    candidates: Vec<UrlCandidate>,
}

impl Emitter {
    fn excluding(url: &str) -> Self {
        Self {
            exclude: url.trim_end_matches('/').to_string(),
            seen: std::collections::HashSet::new(),
            candidates: Vec::new(),
        }
    }

    fn push(&mut self, url: String, publisher: &str) {
        if url.trim_end_matches('/') == self.exclude {
            return;
        }
        if self.seen.insert(url.clone()) {
            self.candidates
                .push(UrlCandidate::new(url, AttemptKind::Transformed(publisher.to_string())));
        }
    }

    fn into_candidates(self) -> Vec<UrlCandidate> {
        self.candidates
    }
}

/// Collects DOI-pattern candidates with deduplication
struct DoiEmitter {
    seen: std::collections::HashSet<String>,
    candidates: Vec<UrlCandidate>,
}

impl DoiEmitter {
    fn new() -> Self {
        Self {
            seen: std::collections::HashSet::new(),
            candidates: Vec::new(),
        }
    }

    fn push(&mut self, url: String, publisher: &str) {
        if self.seen.insert(url.clone()) {
            self.candidates
                .push(UrlCandidate::new(url, AttemptKind::DoiPattern(publisher.to_string())));
        }
    }

    fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    fn into_candidates(self) -> Vec<UrlCandidate> {
        self.candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(candidates: &[UrlCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.url.as_str()).collect()
    }

    #[test]
    fn test_pmc_transform_from_ncbi_url() {
        let candidates = transform_url("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC123456/");
        assert_eq!(
            urls(&candidates),
            vec![
                "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC123456/pdf/",
                "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC123456/pdf/main.pdf",
                "https://pmc.ncbi.nlm.nih.gov/articles/PMC123456/pdf/",
                "https://pmc.ncbi.nlm.nih.gov/articles/PMC123456/pdf/main.pdf",
                "https://europepmc.org/articles/PMC123456?pdf=render",
                "https://www.ebi.ac.uk/europepmc/webservices/rest/PMC123456/fullTextPDF",
            ]
        );
    }

    #[test]
    fn test_pmc_transform_from_europe_pmc_url() {
        let candidates = transform_url("https://europepmc.org/article/PMC/7654321");
        assert!(urls(&candidates)
            .contains(&"https://www.ncbi.nlm.nih.gov/pmc/articles/PMC7654321/pdf/"));
    }

    #[test]
    fn test_arxiv_transform_strips_version() {
        let candidates = transform_url("https://arxiv.org/abs/2401.12345v3");
        assert_eq!(
            urls(&candidates),
            vec![
                "https://arxiv.org/pdf/2401.12345.pdf",
                "https://export.arxiv.org/pdf/2401.12345.pdf",
            ]
        );
    }

    #[test]
    fn test_arxiv_transform_old_format() {
        let candidates = transform_url("https://arxiv.org/abs/math.GT/0104020");
        assert_eq!(
            candidates[0].url,
            "https://arxiv.org/pdf/math.GT/0104020.pdf"
        );
    }

    #[test]
    fn test_biorxiv_transform() {
        let candidates =
            transform_url("https://www.biorxiv.org/content/10.1101/2023.01.15.524100v2");
        assert_eq!(
            urls(&candidates),
            vec!["https://www.biorxiv.org/content/10.1101/2023.01.15.524100.full.pdf"]
        );
    }

    #[test]
    fn test_elsevier_pii_transform() {
        let candidates =
            transform_url("https://www.sciencedirect.com/science/article/pii/S0092867423001234");
        assert_eq!(
            urls(&candidates),
            vec!["https://www.sciencedirect.com/science/article/pii/S0092867423001234/pdfft?isDTMRedir=true&download=true"]
        );
    }

    #[test]
    fn test_ieee_transform() {
        let candidates = transform_url("https://ieeexplore.ieee.org/document/8578338");
        assert_eq!(
            urls(&candidates),
            vec![
                "https://ieeexplore.ieee.org/stamp/stamp.jsp?tp=&arnumber=8578338",
                "https://ieeexplore.ieee.org/stampPDF/getPDF.jsp?tp=&arnumber=8578338",
            ]
        );
    }

    #[test]
    fn test_mdpi_and_osf_transforms() {
        assert_eq!(
            urls(&transform_url("https://www.mdpi.com/1422-0067/24/3/2178")),
            vec!["https://www.mdpi.com/1422-0067/24/3/2178/pdf"]
        );
        assert_eq!(
            urls(&transform_url("https://osf.io/ab12c/")),
            vec!["https://osf.io/ab12c/download"]
        );
    }

    #[test]
    fn test_transform_never_returns_input() {
        let inputs = [
            "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC123456/pdf/",
            "https://arxiv.org/pdf/2401.12345.pdf",
            "https://www.nature.com/articles/s41586-020-1234-5.pdf",
        ];
        for input in inputs {
            let candidates = transform_url(input);
            assert!(
                candidates.iter().all(|c| c.url != input),
                "transform of {} returned itself",
                input
            );
        }
    }

    #[test]
    fn test_transform_no_match_is_empty() {
        assert!(transform_url("https://example.com/whatever").is_empty());
        assert!(transform_url("not a url").is_empty());
    }

    #[test]
    fn test_transform_is_duplicate_free() {
        for input in [
            "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC99/",
            "https://arxiv.org/abs/2301.00001",
        ] {
            let candidates = transform_url(input);
            let mut seen = std::collections::HashSet::new();
            for c in &candidates {
                assert!(seen.insert(&c.url), "duplicate candidate {}", c.url);
            }
        }
    }

    #[test]
    fn test_doi_springer_and_nature() {
        let nature = doi_to_urls("10.1038/s41586-020-1234-5");
        assert_eq!(
            urls(&nature),
            vec![
                "https://link.springer.com/content/pdf/10.1038/s41586-020-1234-5.pdf",
                "https://www.nature.com/articles/s41586-020-1234-5.pdf",
            ]
        );

        let springer = doi_to_urls("10.1007/s00018-023-04700-3");
        assert_eq!(
            urls(&springer),
            vec!["https://link.springer.com/content/pdf/10.1007/s00018-023-04700-3.pdf"]
        );
    }

    #[test]
    fn test_doi_wiley_plos_frontiers_mdpi_oup() {
        assert_eq!(
            urls(&doi_to_urls("10.1111/jcmm.13895")),
            vec!["https://onlinelibrary.wiley.com/doi/pdfdirect/10.1111/jcmm.13895"]
        );
        assert_eq!(
            urls(&doi_to_urls("10.1371/journal.pone.0123456")),
            vec!["https://journals.plos.org/plosone/article/file?id=10.1371/journal.pone.0123456&type=printable"]
        );
        assert_eq!(
            urls(&doi_to_urls("10.3389/fnins.2019.00123")),
            vec!["https://www.frontiersin.org/articles/10.3389/fnins.2019.00123/pdf"]
        );
        assert_eq!(
            urls(&doi_to_urls("10.3390/ijms24032178")),
            vec!["https://www.mdpi.com/article/10.3390/ijms24032178/pdf"]
        );
        assert_eq!(
            urls(&doi_to_urls("10.1093/nar/gkaa1100")),
            vec!["https://academic.oup.com/view-pdf/doi/10.1093/nar/gkaa1100"]
        );
    }

    #[test]
    fn test_doi_ieee_numeric_tail() {
        let candidates = doi_to_urls("10.1109/TPAMI.2019.2913372");
        assert_eq!(
            urls(&candidates),
            vec![
                "https://ieeexplore.ieee.org/document/2913372",
                "https://ieeexplore.ieee.org/stamp/stamp.jsp?tp=&arnumber=2913372",
            ]
        );
    }

    #[test]
    fn test_doi_osf_preprints() {
        assert_eq!(
            urls(&doi_to_urls("10.31234/osf.io/ab12c")),
            vec!["https://osf.io/ab12c/download"]
        );
    }

    #[test]
    fn test_doi_default_resolver() {
        assert_eq!(
            urls(&doi_to_urls("10.9999/unknown.prefix")),
            vec!["https://doi.org/10.9999/unknown.prefix"]
        );
    }

    #[test]
    fn test_doi_empty_input() {
        assert!(doi_to_urls("").is_empty());
        assert!(doi_to_urls("   ").is_empty());
    }

    #[test]
    fn test_doi_candidates_are_unique() {
        for doi in ["10.1038/nature12373", "10.1016/j.cell.2023.01.001", "10.1109/5.771073"] {
            let candidates = doi_to_urls(doi);
            let mut seen = std::collections::HashSet::new();
            for c in &candidates {
                assert!(seen.insert(&c.url));
            }
        }
    }
}
