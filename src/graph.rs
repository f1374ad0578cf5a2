use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
struct PrereqRow {
    course_id: String,
    prereq_id: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct GraphNode {
    id: String,
    label: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct GraphEdge {
    from: String,
    to: String,
}

/// Undirected course graph: one node per course id, one edge per distinct
/// course/prerequisite pair.
#[derive(Debug, Default)]
pub struct PrereqGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl PrereqGraph {
    /// Load from a `prereqs` table. Header rows repeated by appended runs are
    /// skipped.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut pairs = Vec::new();
        for row in reader.deserialize::<PrereqRow>() {
            let row = row.with_context(|| format!("Bad row in {}", path.display()))?;
            if row.course_id == "course_id" && row.prereq_id == "prereq_id" {
                continue;
            }
            pairs.push((row.prereq_id, row.course_id));
        }
        Ok(Self::from_pairs(pairs))
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut ids = BTreeSet::new();
        let mut seen = HashSet::new();
        let mut edges = Vec::new();

        for (source, target) in pairs {
            ids.insert(source.clone());
            ids.insert(target.clone());
            let key = if source <= target {
                (source.clone(), target.clone())
            } else {
                (target.clone(), source.clone())
            };
            if seen.insert(key) {
                edges.push(GraphEdge {
                    from: source,
                    to: target,
                });
            }
        }

        let nodes = ids
            .into_iter()
            .map(|id| GraphNode {
                label: id.clone(),
                id,
            })
            .collect();
        Self { nodes, edges }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Standalone page rendering the graph with vis-network from a CDN.
    pub fn to_html(&self) -> Result<String> {
        let nodes = script_json(&self.nodes)?;
        let edges = script_json(&self.edges)?;
        Ok(HTML_TEMPLATE
            .replace("__NODES__", &nodes)
            .replace("__EDGES__", &edges))
    }

    pub fn write_html(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, self.to_html()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(
            path = %path.display(),
            nodes = self.node_count(),
            edges = self.edge_count(),
            "wrote prerequisite graph"
        );
        Ok(())
    }
}

/// JSON safe to inline in a `<script>` block: no `<` survives, so scraped
/// text cannot close the element early.
fn script_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace('<', "\\u003c"))
}

const HTML_TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Course prerequisites</title>
<script src="https://cdnjs.cloudflare.com/ajax/libs/vis-network/9.1.2/dist/vis-network.min.js"></script>
<style>
  #graph { width: 80%; height: 750px; border: 1px solid lightgray; }
  #config { float: left; width: 400px; }
</style>
</head>
<body>
<div id="graph"></div>
<div id="config"></div>
<script>
  const nodes = new vis.DataSet(__NODES__);
  const edges = new vis.DataSet(__EDGES__);
  new vis.Network(
    document.getElementById("graph"),
    { nodes: nodes, edges: edges },
    { configure: { enabled: true, container: document.getElementById("config") } }
  );
</script>
</body>
</html>
"#;

// ── Tests ──
