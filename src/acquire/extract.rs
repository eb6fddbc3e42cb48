//! Extraction of candidate PDF URLs from HTML landing pages.
//!
//! The extractor is modular: a host-specific parser runs first when one
//! exists for the page's publisher, and the generic rule set always
//! runs afterwards. Output is ordered, absolute, deduplicated, and
//! restricted to http/https.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

/// IEEE pages embed the article number as a script variable
static IEEE_ARNUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)var\s+arnumber\s*=\s*["'](\d+)["']"#).expect("valid regex"));

/// ScienceDirect pages embed the PII as a script variable
static ELSEVIER_PII_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)var\s+pii\s*=\s*["']([A-Z0-9]+)["']"#).expect("valid regex"));

/// JS string assignments to pdf-ish names whose value ends in .pdf
static JS_PDF_ASSIGN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)["']?\w*(?:pdfurl|downloadurl|pdf)\w*["']?\s*[:=]\s*["']([^"']+\.pdf)["']"#)
        .expect("valid regex")
});

/// Extract ordered candidate PDF URLs from an HTML document.
///
/// `base_url` anchors relative hrefs and selects the publisher-specific
/// parser, when one exists for its host.
pub fn extract_pdf_urls(html: &str, base_url: &str) -> Vec<String> {
    let base = Url::parse(base_url).ok();
    let host = base
        .as_ref()
        .and_then(|u| u.host_str())
        .unwrap_or_default()
        .to_lowercase();

    let mut collector = Collector::new(base.clone());

    // Publisher-specific pass first; the generic pass always follows
    if host.ends_with("ieeexplore.ieee.org") {
        extract_ieee(html, &mut collector);
    } else if host.ends_with("sciencedirect.com") {
        extract_sciencedirect(html, &mut collector);
    } else if host.ends_with("nature.com") {
        extract_nature(html, base.as_ref(), &mut collector);
    }

    extract_generic(html, &mut collector);

    collector.into_urls()
}

fn extract_ieee(html: &str, out: &mut Collector) {
    for caps in IEEE_ARNUMBER_RE.captures_iter(html) {
        out.push_absolute(format!(
            "https://ieeexplore.ieee.org/stamp/stamp.jsp?tp=&arnumber={}",
            &caps[1]
        ));
    }
}

fn extract_sciencedirect(html: &str, out: &mut Collector) {
    for caps in ELSEVIER_PII_RE.captures_iter(html) {
        out.push_absolute(format!(
            "https://www.sciencedirect.com/science/article/pii/{}/pdfft?isDTMRedir=true&download=true",
            &caps[1]
        ));
    }
}

fn extract_nature(html: &str, base: Option<&Url>, out: &mut Collector) {
    // Nature marks its article PDF anchor with a data attribute
    let document = Html::parse_document(html);
    if let Ok(selector) = Selector::parse(r#"a[data-article-pdf], a[data-track-action="download pdf"]"#)
    {
        for element in document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                out.push_resolved(href, base);
            }
        }
    }
}

fn extract_generic(html: &str, out: &mut Collector) {
    let document = Html::parse_document(html);
    let base = out.base.clone();

    // 1. Anchors whose path contains .pdf
    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(resolved) = resolve(href, base.as_ref()) {
                    if resolved.path().to_lowercase().contains(".pdf") {
                        out.push_url(resolved);
                    }
                }
            }
        }
    }

    // 2. citation_pdf_url meta tag
    if let Ok(selector) = Selector::parse(r#"meta[name="citation_pdf_url"]"#) {
        for element in document.select(&selector) {
            if let Some(content) = element.value().attr("content") {
                out.push_resolved(content, base.as_ref());
            }
        }
    }

    // 3. Publisher script variables, regardless of host
    extract_ieee(html, out);
    extract_sciencedirect(html, out);

    // 4. Generic pdf-ish JS string assignments
    for caps in JS_PDF_ASSIGN_RE.captures_iter(html) {
        out.push_resolved(&caps[1], base.as_ref());
    }
}

fn resolve(href: &str, base: Option<&Url>) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let resolved = match Url::parse(href) {
        Ok(url) => url,
        Err(_) => base?.join(href).ok()?,
    };
    match resolved.scheme() {
        "http" | "https" => Some(resolved),
        _ => None,
    }
}

/// Accumulates candidate URLs, preserving first-seen order
struct Collector {
    base: Option<Url>,
    seen: std::collections::HashSet<String>,
    urls: Vec<String>,
}

impl Collector {
    fn new(base: Option<Url>) -> Self {
        Self {
            base,
            seen: std::collections::HashSet::new(),
            urls: Vec::new(),
        }
    }

    fn push_resolved(&mut self, href: &str, base: Option<&Url>) {
        if let Some(url) = resolve(href, base) {
            self.push_url(url);
        }
    }

    fn push_absolute(&mut self, url: String) {
        if let Ok(parsed) = Url::parse(&url) {
            self.push_url(parsed);
        }
    }

    fn push_url(&mut self, url: Url) {
        let rendered = url.to_string();
        if self.seen.insert(rendered.clone()) {
            self.urls.push(rendered);
        }
    }

    fn into_urls(self) -> Vec<String> {
        self.urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_with_pdf_path() {
        let html = r#"<html><body>
            <a href="/content/paper.pdf">Download PDF</a>
            <a href="/content/supplement.html">Supplement</a>
        </body></html>"#;
        let urls = extract_pdf_urls(html, "https://pub.example/article/1");
        assert_eq!(urls, vec!["https://pub.example/content/paper.pdf"]);
    }

    #[test]
    fn test_citation_pdf_url_meta() {
        let html = r#"<html><head>
            <meta name="citation_pdf_url" content="https://pub.example/paper.pdf">
        </head><body></body></html>"#;
        let urls = extract_pdf_urls(html, "https://pub.example/landing");
        assert_eq!(urls, vec!["https://pub.example/paper.pdf"]);
    }

    #[test]
    fn test_ieee_script_variable() {
        let html = r#"<html><script>var arnumber = "8578338";</script></html>"#;
        let urls = extract_pdf_urls(html, "https://ieeexplore.ieee.org/document/8578338");
        assert_eq!(
            urls,
            vec!["https://ieeexplore.ieee.org/stamp/stamp.jsp?tp=&arnumber=8578338"]
        );
    }

    #[test]
    fn test_elsevier_script_variable() {
        let html = r#"<script>var pii = "S0092867423001234";</script>"#;
        let urls = extract_pdf_urls(html, "https://www.sciencedirect.com/science/article/pii/S0092867423001234");
        assert_eq!(
            urls,
            vec!["https://www.sciencedirect.com/science/article/pii/S0092867423001234/pdfft?isDTMRedir=true&download=true"]
        );
    }

    #[test]
    fn test_generic_js_assignment() {
        let html = r#"<script>
            var config = { pdfUrl: "https://cdn.example/files/article.pdf" };
            var other = "not-a-pdf.html";
        </script>"#;
        let urls = extract_pdf_urls(html, "https://pub.example/x");
        assert_eq!(urls, vec!["https://cdn.example/files/article.pdf"]);
    }

    #[test]
    fn test_relative_url_resolution() {
        let html = r#"<a href="pdfs/main.pdf">PDF</a>"#;
        let urls = extract_pdf_urls(html, "https://pub.example/articles/42/");
        assert_eq!(urls, vec!["https://pub.example/articles/42/pdfs/main.pdf"]);
    }

    #[test]
    fn test_non_http_schemes_discarded() {
        let html = r#"
            <a href="ftp://mirror.example/paper.pdf">FTP</a>
            <a href="javascript:openPdf()">JS</a>
            <a href="https://pub.example/ok.pdf">OK</a>
        "#;
        let urls = extract_pdf_urls(html, "https://pub.example/");
        assert_eq!(urls, vec!["https://pub.example/ok.pdf"]);
    }

    #[test]
    fn test_dedup_preserves_order() {
        let html = r#"
            <a href="/a.pdf">first</a>
            <a href="/b.pdf">second</a>
            <a href="/a.pdf">again</a>
        "#;
        let urls = extract_pdf_urls(html, "https://pub.example/");
        assert_eq!(
            urls,
            vec!["https://pub.example/a.pdf", "https://pub.example/b.pdf"]
        );
    }

    #[test]
    fn test_no_pdf_links() {
        let html = r#"<html><body><a href="/about.html">About</a></body></html>"#;
        assert!(extract_pdf_urls(html, "https://pub.example/").is_empty());
    }

    #[test]
    fn test_specialized_host_runs_before_generic() {
        // Both the script variable and a generic anchor are present;
        // the IEEE-specific candidate must come first on an IEEE host.
        let html = r#"
            <script>var arnumber = "123456";</script>
            <a href="/generic/other.pdf">other</a>
        "#;
        let urls = extract_pdf_urls(html, "https://ieeexplore.ieee.org/document/123456");
        assert_eq!(
            urls[0],
            "https://ieeexplore.ieee.org/stamp/stamp.jsp?tp=&arnumber=123456"
        );
        assert!(urls[1].contains("/generic/other.pdf"));
    }
}
