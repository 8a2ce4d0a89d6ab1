//! Evidence store: deduplicated, citation-indexed evidence for one session.
//!
//! Items are keyed by `source_id`. Web results derive it from a normalized
//! URL, document snippets from a SHA-256 digest of their content. Citation
//! indices start at 1, follow first insertion, and are never reassigned.

use super::documents::DocumentSnippet;
use crate::search::SearchHit;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use url::Url;

/// Where a piece of evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    WebSearch,
    Document,
}

/// One retrieved unit of evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Dedup key.
    pub source_id: String,
    /// Short origin tag: a domain name or a document name.
    pub label: String,
    /// Page title, or the document name for seeded documents.
    pub title: String,
    /// Original URL; `None` for documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Whitespace-collapsed excerpt, bounded by `max_snippet_chars`.
    pub snippet: String,
    /// 1-based citation index; 0 until the item enters a store.
    pub citation_index: usize,
    /// Where the item came from.
    pub origin: Origin,
}

impl EvidenceItem {
    /// Build an item from a search result.
    pub fn from_hit(hit: &SearchHit, max_snippet_chars: usize) -> Self {
        let source_id = normalize_url(&hit.url).unwrap_or_else(|| hit.url.trim().to_string());
        let label = Url::parse(hit.url.trim())
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| hit.title.clone());
        Self {
            source_id,
            label,
            title: hit.title.trim().to_string(),
            url: Some(hit.url.trim().to_string()),
            snippet: clean_snippet(&hit.snippet, max_snippet_chars),
            citation_index: 0,
            origin: Origin::WebSearch,
        }
    }

    /// Build an item from an uploaded document snippet.
    pub fn from_document(doc: &DocumentSnippet, max_chars: usize) -> Self {
        Self {
            source_id: document_source_id(&doc.label, &doc.text),
            label: format!("{}: {}", doc.kind(), doc.label),
            title: doc.label.clone(),
            url: None,
            snippet: clean_snippet(&doc.text, max_chars),
            citation_index: 0,
            origin: Origin::Document,
        }
    }
}

/// A citation-ready view of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedEvidence {
    pub index: usize,
    pub label: String,
    pub snippet: String,
}

/// Append-only, deduplicating evidence collection.
#[derive(Debug, Clone, Default)]
pub struct EvidenceStore {
    items: Vec<EvidenceItem>,
    by_source: HashMap<String, usize>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new item or merge it into the existing one with the same `source_id`.
    ///
    /// Returns `true` when the item was new and received a citation index.
    /// A merge only fills in a previously empty snippet; a populated snippet
    /// is never overwritten.
    pub fn add_or_merge(&mut self, mut item: EvidenceItem) -> bool {
        if let Some(&pos) = self.by_source.get(&item.source_id) {
            let existing = &mut self.items[pos];
            if existing.snippet.is_empty() && !item.snippet.is_empty() {
                existing.snippet = item.snippet;
                existing.label = item.label;
                existing.title = item.title;
            }
            return false;
        }

        item.citation_index = self.items.len() + 1;
        self.by_source.insert(item.source_id.clone(), self.items.len());
        self.items.push(item);
        true
    }

    /// All items in citation order.
    pub fn all(&self) -> &[EvidenceItem] {
        &self.items
    }

    /// Look up an item by citation index.
    pub fn get(&self, index: usize) -> Option<&EvidenceItem> {
        index.checked_sub(1).and_then(|i| self.items.get(i))
    }

    pub fn contains_index(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `(index, label, snippet)` triples in citation order.
    pub fn render(&self) -> Vec<RenderedEvidence> {
        self.items
            .iter()
            .map(|item| RenderedEvidence {
                index: item.citation_index,
                label: item.label.clone(),
                snippet: item.snippet.clone(),
            })
            .collect()
    }

    /// Prompt context block, one `[n] label: snippet` entry per item.
    pub fn render_context(&self) -> String {
        if self.items.is_empty() {
            return "(no evidence gathered)".to_string();
        }
        self.render()
            .into_iter()
            .map(|r| {
                if r.snippet.is_empty() {
                    format!("[{}] {}", r.index, r.label)
                } else {
                    format!("[{}] {}: {}", r.index, r.label, r.snippet)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Normalize a URL to `scheme://host[:port]/path` for deduplication.
///
/// Query string and fragment are dropped, and a trailing slash on the path
/// is removed. Returns `None` for strings that do not parse as URLs.
pub fn normalize_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let path = url.path().trim_end_matches('/');
    let Some(host) = url.host_str() else {
        return Some(format!("{}:{}", url.scheme(), path));
    };
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    Some(format!("{}://{}{}{}", url.scheme(), host, port, path))
}

/// Content hash identifying a document snippet.
pub fn document_source_id(label: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest[..16].iter().map(|b| format!("{b:02x}")).collect();
    format!("doc:{hex}")
}

/// Collapse whitespace and cut to `max_chars` characters.
pub(crate) fn clean_snippet(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &collapsed[..idx]),
        None => collapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hit(url: &str, snippet: &str) -> EvidenceItem {
        EvidenceItem::from_hit(&SearchHit::new(url, "Title", snippet), 500)
    }

    #[test]
    fn test_normalize_url_strips_query_fragment_and_slash() {
        assert_eq!(
            normalize_url("https://Example.com/a/b/?utm_source=x#top").as_deref(),
            Some("https://example.com/a/b")
        );
        assert_eq!(
            normalize_url("https://example.com/").as_deref(),
            Some("https://example.com")
        );
        assert_eq!(
            normalize_url("http://example.com:8080/x").as_deref(),
            Some("http://example.com:8080/x")
        );
        assert_eq!(normalize_url("not a url"), None);
    }

    #[test]
    fn test_tracking_variants_merge() {
        let mut store = EvidenceStore::new();
        assert!(store.add_or_merge(hit("https://news.site/story?utm_source=a", "first")));
        assert!(!store.add_or_merge(hit("https://news.site/story/?ref=b", "second")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.all()[0].citation_index, 1);
        assert_eq!(store.all()[0].snippet, "first");
    }

    #[test]
    fn test_merge_fills_empty_snippet_only() {
        let mut store = EvidenceStore::new();
        store.add_or_merge(hit("https://a.dev/x", ""));
        store.add_or_merge(hit("https://a.dev/x", "filled"));
        assert_eq!(store.all()[0].snippet, "filled");
        store.add_or_merge(hit("https://a.dev/x", ""));
        assert_eq!(store.all()[0].snippet, "filled");
    }

    #[test]
    fn test_indices_follow_first_insertion() {
        let mut store = EvidenceStore::new();
        store.add_or_merge(hit("https://a.dev", "a"));
        store.add_or_merge(hit("https://b.dev", "b"));
        store.add_or_merge(hit("https://a.dev/", "a again"));
        store.add_or_merge(hit("https://c.dev", "c"));
        let indices: Vec<(usize, &str)> = store
            .all()
            .iter()
            .map(|i| (i.citation_index, i.label.as_str()))
            .collect();
        assert_eq!(indices, vec![(1, "a.dev"), (2, "b.dev"), (3, "c.dev")]);
        assert_eq!(store.get(2).map(|i| i.label.as_str()), Some("b.dev"));
        assert!(store.get(0).is_none());
        assert!(!store.contains_index(4));
    }

    #[test]
    fn test_label_strips_www() {
        assert_eq!(hit("https://www.rust-lang.org/learn", "x").label, "rust-lang.org");
    }

    #[test]
    fn test_document_items() {
        let doc = DocumentSnippet::new("notes.txt", "text/plain", "Quarterly   revenue\n rose.");
        let item = EvidenceItem::from_document(&doc, 4000);
        assert_eq!(item.origin, Origin::Document);
        assert_eq!(item.label, "TXT: notes.txt");
        assert_eq!(item.snippet, "Quarterly revenue rose.");
        assert!(item.source_id.starts_with("doc:"));
        assert_eq!(
            item.source_id,
            document_source_id("notes.txt", "Quarterly   revenue\n rose.")
        );
    }

    #[test]
    fn test_clean_snippet_truncates_on_chars() {
        assert_eq!(clean_snippet("ab  cd", 10), "ab cd");
        assert_eq!(clean_snippet("héllo world", 5), "héllo…");
    }

    #[test]
    fn test_render_context() {
        let mut store = EvidenceStore::new();
        assert_eq!(store.render_context(), "(no evidence gathered)");
        store.add_or_merge(hit("https://a.dev", "alpha"));
        store.add_or_merge(hit("https://b.dev", ""));
        assert_eq!(store.render_context(), "[1] a.dev: alpha\n[2] b.dev");
    }
}
