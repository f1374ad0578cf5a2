pub mod courses;
pub mod links;
pub mod nodes;
pub mod text;
pub mod walker;

use scraper::Html;
use tracing::debug;

use crate::record::Record;
use walker::{FinalFlush, Hierarchy};

/// Page HTML → container nodes → walked records. A page without the
/// container yields no records.
pub fn extract_hierarchy(
    html: &str,
    container_id: &str,
    hierarchy: &Hierarchy,
    base: &Record,
    final_flush: FinalFlush,
) -> Vec<Record> {
    let doc = Html::parse_document(html);
    match nodes::container_nodes(&doc, container_id) {
        Some(nodes) => walker::walk(&nodes, hierarchy, base, final_flush),
        None => {
            debug!(container_id = container_id, "container missing, no records");
            Vec::new()
        }
    }
}

/// Whether any element on the page carries `id`.
pub fn has_element(html: &str, id: &str) -> bool {
    let doc = Html::parse_document(html);
    nodes::find_by_id(&doc, id).is_some()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Record {
        [
            ("program", "Computer Science Major, B.S."),
            ("department", "Computer Science"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn program_opportunities_fixture() {
        let html = std::fs::read_to_string("tests/fixtures/program.html").unwrap();
        let hierarchy = Hierarchy::new(["h2", "h3", "p"]).unwrap();
        let records = extract_hierarchy(
            &html,
            "opportunitiestextcontainer",
            &hierarchy,
            &base(),
            FinalFlush::Always,
        );

        let rows: Vec<(&str, &str, &str)> = records
            .iter()
            .map(|r| {
                (
                    r.get("h2").unwrap_or_default(),
                    r.get("h3").unwrap_or_default(),
                    r.get("p").unwrap_or_default(),
                )
            })
            .collect();
        assert_eq!(
            rows,
            vec![
                (
                    "Departmental Involvement",
                    "",
                    "Students may join the\n  Computer Science Club."
                ),
                (
                    "Experiential Education",
                    "Internships",
                    "Many majors internduring the summer.Credit is available through COMP293."
                ),
                (
                    "Experiential Education",
                    "Undergraduate Research",
                    "Faculty welcome undergraduate researchers  see the department site."
                ),
                ("Honors in Computer Science", "", ""),
            ]
        );
        assert!(records
            .iter()
            .all(|r| r.get("department") == Some("Computer Science")));
        let keys: Vec<_> = records[0].keys().collect();
        assert_eq!(keys, vec!["h2", "h3", "p", "program", "department"]);
    }

    #[test]
    fn missing_container_yields_nothing() {
        let html = std::fs::read_to_string("tests/fixtures/program_without_tab.html").unwrap();
        let hierarchy = Hierarchy::new(["h2", "h3", "p"]).unwrap();
        let records = extract_hierarchy(
            &html,
            "opportunitiestextcontainer",
            &hierarchy,
            &base(),
            FinalFlush::Always,
        );
        assert!(records.is_empty());
    }

    #[test]
    fn tab_detection() {
        let with_tab = std::fs::read_to_string("tests/fixtures/program.html").unwrap();
        let without = std::fs::read_to_string("tests/fixtures/program_without_tab.html").unwrap();
        assert!(has_element(&with_tab, "opportunitiestexttab"));
        assert!(!has_element(&without, "opportunitiestexttab"));
    }
}
