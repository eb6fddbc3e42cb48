//! Ordered candidate-URL plans for PDF acquisition.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Strategy that produced a candidate URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptKind {
    /// The record's own PDF URL or the caller-supplied URL
    Primary,
    /// Publisher-specific transform of another URL
    Transformed(String),
    /// Expanded from a DOI-prefix pattern
    DoiPattern(String),
    /// Open-access location from Unpaywall
    Unpaywall,
    /// arXiv title-lookup fallback
    ArxivFallback,
    /// bioRxiv/medRxiv DOI-lookup fallback
    BiorxivFallback,
    /// Extracted from an HTML landing page
    HtmlExtracted,
    /// Backoff retry of a previous attempt
    Retry(u32),
    /// Browser User-Agent rotation
    UaRotate,
    /// Referer spoof
    Referer(String),
}

impl std::fmt::Display for AttemptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptKind::Primary => write!(f, "primary"),
            AttemptKind::Transformed(publisher) => write!(f, "transformed:{}", publisher),
            AttemptKind::DoiPattern(publisher) => write!(f, "doi-pattern:{}", publisher),
            AttemptKind::Unpaywall => write!(f, "unpaywall"),
            AttemptKind::ArxivFallback => write!(f, "arxiv-fallback"),
            AttemptKind::BiorxivFallback => write!(f, "biorxiv-fallback"),
            AttemptKind::HtmlExtracted => write!(f, "html-extracted"),
            AttemptKind::Retry(n) => write!(f, "retry:{}", n),
            AttemptKind::UaRotate => write!(f, "ua-rotate"),
            AttemptKind::Referer(origin) => write!(f, "referer:{}", origin),
        }
    }
}

/// A URL paired with the strategy that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlCandidate {
    pub url: String,
    pub kind: AttemptKind,
}

impl UrlCandidate {
    pub fn new(url: impl Into<String>, kind: AttemptKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    /// URL annotated with its strategy, for attempt logs
    pub fn annotated(&self) -> String {
        format!("{} [{}]", self.url, self.kind)
    }
}

/// Ordered, deduplicated, capacity-bounded candidate list.
///
/// Pushing past capacity or re-pushing a known URL is a no-op; the
/// plan preserves first-insertion order otherwise.
#[derive(Debug, Clone)]
pub struct DownloadPlan {
    candidates: Vec<UrlCandidate>,
    seen: HashSet<String>,
    capacity: usize,
}

impl DownloadPlan {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            candidates: Vec::new(),
            seen: HashSet::new(),
            capacity,
        }
    }

    /// Append a candidate. Returns whether it was accepted.
    pub fn push(&mut self, candidate: UrlCandidate) -> bool {
        if self.candidates.len() >= self.capacity {
            return false;
        }
        if candidate.url.trim().is_empty() || !self.seen.insert(candidate.url.clone()) {
            return false;
        }
        self.candidates.push(candidate);
        true
    }

    /// Stably move candidates matching `predicate` to the front.
    ///
    /// Used for source-aware prioritization (arXiv records pull
    /// `arxiv.org/pdf/` candidates ahead of everything else).
    pub fn promote<F>(&mut self, predicate: F)
    where
        F: Fn(&UrlCandidate) -> bool,
    {
        let (mut front, back): (Vec<_>, Vec<_>) =
            self.candidates.drain(..).partition(|c| predicate(c));
        front.extend(back);
        self.candidates = front;
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &UrlCandidate> {
        self.candidates.iter()
    }

    /// URLs in plan order
    pub fn urls(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.url.as_str()).collect()
    }
}

impl IntoIterator for DownloadPlan {
    type Item = UrlCandidate;
    type IntoIter = std::vec::IntoIter<UrlCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_dedupes() {
        let mut plan = DownloadPlan::with_capacity(10);
        assert!(plan.push(UrlCandidate::new("https://a.org/x.pdf", AttemptKind::Primary)));
        assert!(!plan.push(UrlCandidate::new(
            "https://a.org/x.pdf",
            AttemptKind::Transformed("pmc".to_string())
        )));
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_push_respects_capacity() {
        let mut plan = DownloadPlan::with_capacity(2);
        assert!(plan.push(UrlCandidate::new("https://a.org/1", AttemptKind::Primary)));
        assert!(plan.push(UrlCandidate::new("https://a.org/2", AttemptKind::Primary)));
        assert!(!plan.push(UrlCandidate::new("https://a.org/3", AttemptKind::Primary)));
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_push_rejects_empty() {
        let mut plan = DownloadPlan::with_capacity(5);
        assert!(!plan.push(UrlCandidate::new("", AttemptKind::Primary)));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_promote_is_stable() {
        let mut plan = DownloadPlan::with_capacity(10);
        plan.push(UrlCandidate::new("https://pub.example/a", AttemptKind::Primary));
        plan.push(UrlCandidate::new(
            "https://arxiv.org/pdf/1.pdf",
            AttemptKind::Transformed("arxiv".to_string()),
        ));
        plan.push(UrlCandidate::new("https://pub.example/b", AttemptKind::Primary));
        plan.push(UrlCandidate::new(
            "https://arxiv.org/pdf/2.pdf",
            AttemptKind::Transformed("arxiv".to_string()),
        ));

        plan.promote(|c| c.url.contains("arxiv.org/pdf/"));

        assert_eq!(
            plan.urls(),
            vec![
                "https://arxiv.org/pdf/1.pdf",
                "https://arxiv.org/pdf/2.pdf",
                "https://pub.example/a",
                "https://pub.example/b",
            ]
        );
    }

    #[test]
    fn test_annotated_format() {
        let candidate = UrlCandidate::new(
            "https://a.org/x.pdf",
            AttemptKind::DoiPattern("mdpi".to_string()),
        );
        assert_eq!(candidate.annotated(), "https://a.org/x.pdf [doi-pattern:mdpi]");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(AttemptKind::Primary.to_string(), "primary");
        assert_eq!(AttemptKind::Retry(2).to_string(), "retry:2");
        assert_eq!(
            AttemptKind::Referer("https://www.google.com/".to_string()).to_string(),
            "referer:https://www.google.com/"
        );
    }
}
