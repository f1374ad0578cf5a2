//! Rebuilds nested heading structure from a flat run of sibling nodes.
//!
//! The walker keeps one working record holding the latest text seen at each
//! level of a tag hierarchy (e.g. `h2 > h3 > p`) and snapshots it whenever a
//! leaf grouping closes.

use std::collections::HashSet;

use tracing::trace;

use super::nodes::Node;
use super::text::normalize;
use crate::error::CatalogError;
use crate::record::Record;

/// Ordered level names, outermost first. The last entry is the leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    levels: Vec<String>,
}

impl Hierarchy {
    pub fn new<I, S>(levels: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let levels: Vec<String> = levels.into_iter().map(Into::into).collect();
        if levels.is_empty() {
            return Err(CatalogError::InvalidConfiguration(
                "tag hierarchy must name at least one level".into(),
            ));
        }
        let mut seen = HashSet::new();
        for level in &levels {
            if !seen.insert(level.as_str()) {
                return Err(CatalogError::InvalidConfiguration(format!(
                    "tag hierarchy repeats level '{}'",
                    level
                )));
            }
        }
        Ok(Self { levels })
    }

    /// Parse a comma separated list such as `h2,h3,p`.
    pub fn parse(list: &str) -> Result<Self, CatalogError> {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        )
    }

    pub fn position(&self, tag: &str) -> Option<usize> {
        self.levels.iter().position(|l| l == tag)
    }

    pub fn leaf(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }
}

/// What to do with the working record once the node stream ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FinalFlush {
    /// Always snapshot the last grouping, even if its leaf is empty.
    #[default]
    Always,
    /// Only snapshot the last grouping if its leaf level holds text.
    RequireLeaf,
}

/// Structural move between the previous level and the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Back out to a shallower level.
    Ascend { from: usize },
    /// Deeper than anything seen since the last reset. `from` is `None`
    /// before the first level is visited.
    Descend { from: Option<usize> },
    /// The leaf repeats; its text accumulates.
    RepeatLeaf,
    /// A non-leaf level repeats; the previous grouping under it is closed.
    RepeatBranch,
}

impl Transition {
    pub fn classify(previous: Option<usize>, current: usize, leaf: usize) -> Self {
        match previous {
            Some(p) if current < p => Transition::Ascend { from: p },
            Some(p) if current == p && current == leaf => Transition::RepeatLeaf,
            Some(p) if current == p => Transition::RepeatBranch,
            _ => Transition::Descend { from: previous },
        }
    }
}

/// Incremental state machine over a node stream. Feed nodes with `step`,
/// then call `finish` once.
#[derive(Debug)]
pub struct Walker<'h> {
    hierarchy: &'h Hierarchy,
    working: Record,
    previous: Option<usize>,
    final_flush: FinalFlush,
}

impl<'h> Walker<'h> {
    pub fn new(hierarchy: &'h Hierarchy, base: &Record) -> Self {
        let mut working: Record = hierarchy
            .levels()
            .iter()
            .map(|l| (l.as_str(), ""))
            .collect();
        working.extend_from(base);
        Self {
            hierarchy,
            working,
            previous: None,
            final_flush: FinalFlush::Always,
        }
    }

    pub fn with_final_flush(mut self, policy: FinalFlush) -> Self {
        self.final_flush = policy;
        self
    }

    /// Current accumulator, for inspection between steps.
    #[allow(dead_code)]
    pub fn working(&self) -> &Record {
        &self.working
    }

    /// Advance over one node. Returns a snapshot when this node closes a
    /// grouping. Nodes outside the hierarchy leave the state untouched.
    pub fn step(&mut self, node: &Node) -> Option<Record> {
        let tag = node.tag.as_deref()?;
        let current = self.hierarchy.position(tag)?;
        let text = normalize(&node.text);
        let leaf = self.hierarchy.leaf();
        let transition = Transition::classify(self.previous, current, leaf);
        trace!(tag = tag, ?transition, "walker step");

        let emitted = match transition {
            Transition::Ascend { from } => {
                let snapshot = (from == leaf).then(|| self.working.clone());
                self.working.set(tag, text);
                self.clear_levels(current + 1..=leaf);
                snapshot
            }
            Transition::Descend { from } => {
                self.working.set(tag, text);
                let start = from.map_or(0, |p| p + 1);
                self.clear_levels(start..current);
                None
            }
            Transition::RepeatLeaf => {
                self.working.append(tag, &text);
                None
            }
            Transition::RepeatBranch => {
                let snapshot = self.working.clone();
                self.working.set(tag, text);
                Some(snapshot)
            }
        };

        self.previous = Some(current);
        emitted
    }

    /// Final snapshot of whatever grouping is still open.
    pub fn finish(self) -> Option<Record> {
        match self.final_flush {
            FinalFlush::Always => Some(self.working),
            FinalFlush::RequireLeaf => {
                let leaf = &self.hierarchy.levels()[self.hierarchy.leaf()];
                let has_leaf = self.working.get(leaf).is_some_and(|v| !v.is_empty());
                has_leaf.then_some(self.working)
            }
        }
    }

    fn clear_levels(&mut self, range: impl IntoIterator<Item = usize>) {
        let hierarchy = self.hierarchy;
        for idx in range {
            self.working.set(&hierarchy.levels()[idx], "");
        }
    }
}

/// Walk `nodes` and collect one record per closed grouping, plus the final
/// flush dictated by `final_flush`.
pub fn walk(
    nodes: &[Node],
    hierarchy: &Hierarchy,
    base: &Record,
    final_flush: FinalFlush,
) -> Vec<Record> {
    let walker = Walker::new(hierarchy, base).with_final_flush(final_flush);
    let (walker, mut records) =
        nodes
            .iter()
            .fold((walker, Vec::new()), |(mut walker, mut out), node| {
                out.extend(walker.step(node));
                (walker, out)
            });
    records.extend(walker.finish());
    records
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn el(tag: &str, text: &str) -> Node {
        Node::element(tag, text)
    }

    fn walk_levels(
        nodes: &[Node],
        levels: &[&str],
        base: &Record,
    ) -> Result<Vec<Record>, CatalogError> {
        let hierarchy = Hierarchy::new(levels.iter().copied())?;
        Ok(walk(nodes, &hierarchy, base, FinalFlush::Always))
    }

    fn rec(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().copied().collect()
    }

    fn run(levels: &[&str], nodes: &[Node]) -> Vec<Record> {
        walk_levels(nodes, levels, &Record::new()).unwrap()
    }

    #[test]
    fn leaf_paragraphs_accumulate() {
        let nodes = [
            el("h2", "Study Abroad"),
            el("p", "First."),
            el("p", "Second."),
            el("p", "Third."),
        ];
        let hierarchy = Hierarchy::new(["h2", "p"]).unwrap();
        let mut walker = Walker::new(&hierarchy, &Record::new());
        for node in &nodes {
            assert!(walker.step(node).is_none());
        }
        let last = walker.finish().unwrap();
        assert_eq!(last, rec(&[("h2", "Study Abroad"), ("p", "First.Second.Third.")]));
    }

    #[test]
    fn skipped_level_is_blank() {
        let hierarchy = Hierarchy::new(["A", "B", "C"]).unwrap();
        let mut walker = Walker::new(&hierarchy, &Record::new());
        walker.step(&el("A", "x"));
        walker.step(&el("C", "y"));
        assert_eq!(walker.working().get("B"), Some(""));
        assert_eq!(walker.working().get("C"), Some("y"));
    }

    #[test]
    fn skipped_level_clears_stale_value() {
        // B is set, then A resets it, then C skips over it.
        let out = run(
            &["A", "B", "C"],
            &[el("A", "1"), el("B", "2"), el("C", "3"), el("A", "4"), el("C", "5")],
        );
        assert_eq!(
            out,
            vec![
                rec(&[("A", "1"), ("B", "2"), ("C", "3")]),
                rec(&[("A", "4"), ("B", ""), ("C", "5")]),
            ]
        );
    }

    #[test]
    fn ascending_from_leaf_flushes() {
        let hierarchy = Hierarchy::new(["A", "B"]).unwrap();
        let mut walker = Walker::new(&hierarchy, &Record::new());
        assert!(walker.step(&el("A", "1")).is_none());
        assert!(walker.step(&el("B", "2")).is_none());
        let flushed = walker.step(&el("A", "3"));
        assert_eq!(flushed, Some(rec(&[("A", "1"), ("B", "2")])));
        assert_eq!(walker.finish(), Some(rec(&[("A", "3"), ("B", "")])));
    }

    #[test]
    fn ascending_from_branch_does_not_flush() {
        let hierarchy = Hierarchy::new(["A", "B", "C"]).unwrap();
        let mut walker = Walker::new(&hierarchy, &Record::new());
        walker.step(&el("A", "1"));
        walker.step(&el("B", "2"));
        assert!(walker.step(&el("A", "3")).is_none());
        assert_eq!(walker.working().get("B"), Some(""));
    }

    #[test]
    fn repeated_branch_flushes_prior_grouping() {
        let hierarchy = Hierarchy::new(["A", "B"]).unwrap();
        let mut walker = Walker::new(&hierarchy, &Record::new());
        assert!(walker.step(&el("A", "1")).is_none());
        let flushed = walker.step(&el("A", "2"));
        assert_eq!(flushed, Some(rec(&[("A", "1"), ("B", "")])));
        assert_eq!(walker.working().get("A"), Some("2"));
    }

    #[test]
    fn final_flush_is_unconditional() {
        let out = run(&["A", "B"], &[el("A", "only")]);
        assert_eq!(out, vec![rec(&[("A", "only"), ("B", "")])]);

        let out = run(&["A", "B"], &[]);
        assert_eq!(out, vec![rec(&[("A", ""), ("B", "")])]);
    }

    #[test]
    fn final_flush_can_require_leaf() {
        let hierarchy = Hierarchy::new(["A", "B"]).unwrap();
        let nodes = [el("A", "1"), el("B", "2"), el("A", "3")];
        let out = walk(&nodes, &hierarchy, &Record::new(), FinalFlush::RequireLeaf);
        assert_eq!(out, vec![rec(&[("A", "1"), ("B", "2")])]);

        let out = walk(&[], &hierarchy, &Record::new(), FinalFlush::RequireLeaf);
        assert!(out.is_empty());
    }

    #[test]
    fn empty_hierarchy_is_rejected() {
        let err = walk_levels(&[el("p", "x")], &[], &Record::new()).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidConfiguration(_)));
    }

    #[test]
    fn duplicate_level_is_rejected() {
        assert!(Hierarchy::new(["h2", "p", "h2"]).is_err());
        assert!(Hierarchy::parse(" , ").is_err());
        assert_eq!(Hierarchy::parse("h2, h3 ,p").unwrap().levels(), &["h2", "h3", "p"]);
    }

    #[test]
    fn unknown_and_untagged_nodes_are_ignored() {
        let out = run(
            &["h2", "p"],
            &[
                el("h2", "Funding"),
                Node::text("\n"),
                el("ul", "list"),
                el("p", "Grants."),
            ],
        );
        assert_eq!(out, vec![rec(&[("h2", "Funding"), ("p", "Grants.")])]);
    }

    #[test]
    fn base_context_rides_along() {
        let base = rec(&[("program", "History, B.A."), ("department", "History")]);
        let out = walk_levels(&[el("h2", "Honors"), el("p", "Thesis.")], &["h2", "p"], &base)
            .unwrap();
        let keys: Vec<_> = out[0].keys().collect();
        assert_eq!(keys, vec!["h2", "p", "program", "department"]);
        assert_eq!(out[0].get("department"), Some("History"));
    }

    #[test]
    fn text_is_normalized() {
        let out = run(&["p"], &[el("p", "  Caf\u{e9}\u{a0}Talk \n")]);
        assert_eq!(out[0].get("p"), Some("CafTalk"));
    }

    #[test]
    fn heading_document_regression() {
        let nodes = [
            el("h2", "Overview"),
            el("p", "Intro text."),
            el("h3", "Requirements"),
            el("p", "Detail one."),
            el("p", "Detail two."),
            el("h2", "Funding"),
        ];
        let out = run(&["h2", "h3", "p"], &nodes);
        assert_eq!(
            out,
            vec![
                rec(&[("h2", "Overview"), ("h3", ""), ("p", "Intro text.")]),
                rec(&[
                    ("h2", "Overview"),
                    ("h3", "Requirements"),
                    ("p", "Detail one.Detail two."),
                ]),
                rec(&[("h2", "Funding"), ("h3", ""), ("p", "")]),
            ]
        );
    }

    #[test]
    fn transitions_classify() {
        assert_eq!(Transition::classify(None, 0, 2), Transition::Descend { from: None });
        assert_eq!(Transition::classify(Some(0), 2, 2), Transition::Descend { from: Some(0) });
        assert_eq!(Transition::classify(Some(2), 1, 2), Transition::Ascend { from: 2 });
        assert_eq!(Transition::classify(Some(2), 2, 2), Transition::RepeatLeaf);
        assert_eq!(Transition::classify(Some(1), 1, 2), Transition::RepeatBranch);
    }
}
