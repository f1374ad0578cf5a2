use std::sync::LazyLock;

use indexmap::IndexMap;
use scraper::{Html, Selector};
use tracing::debug;

use super::nodes::find_by_id;

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub text: String,
    pub href: String,
}

/// Link text → href, in first-seen order. Re-inserting a text replaces its
/// href but keeps its position.
#[derive(Debug, Clone, Default)]
pub struct LinkMap {
    links: IndexMap<String, String>,
}

impl LinkMap {
    pub fn insert(&mut self, text: String, href: String) {
        self.links.insert(text, href);
    }

    /// `(text, href)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.links.iter().map(|(t, h)| (t.as_str(), h.as_str()))
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn into_links(self) -> impl Iterator<Item = Link> {
        self.links
            .into_iter()
            .map(|(text, href)| Link { text, href })
    }
}

/// Every anchor inside `container_id` whose href contains `filter`.
/// An anchor without an href is matched as the literal `"None"`.
pub fn collect_links(html: &str, container_id: &str, filter: &str) -> LinkMap {
    let doc = Html::parse_document(html);
    let mut links = LinkMap::default();

    let Some(container) = find_by_id(&doc, container_id) else {
        debug!(container_id = container_id, "link container missing");
        return links;
    };

    for anchor in container.select(&ANCHOR) {
        let href = anchor.value().attr("href").unwrap_or("None");
        if href.contains(filter) {
            links.insert(anchor.text().collect(), href.to_string());
        }
    }

    links
}

// ── Tests ──
