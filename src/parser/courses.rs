use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::text::compact_code;
use crate::error::CatalogError;
use crate::record::Record;

static CODE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.detail-code").unwrap());
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.detail-title").unwrap());
static HOURS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.detail-hours").unwrap());
static EXTRA: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p.courseblockextra").unwrap());
static REQUISITES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.detail-requisites").unwrap());
static SPAN: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span").unwrap());
static HAS_HREF: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[href]").unwrap());

static DEPT_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\D*").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Course {
    pub course_id: String,
    pub course_name: String,
    pub credit_hours: String,
    pub course_description: String,
    pub prereqs: Vec<String>,
    pub coreqs: Vec<String>,
}

/// Rows destined for the `general`, `prereqs` and `coreqs` tables.
#[derive(Debug, Default)]
pub struct CourseTables {
    pub general: Vec<Record>,
    pub prereqs: Vec<Record>,
    pub coreqs: Vec<Record>,
}

impl CourseTables {
    fn push(&mut self, course: Course, base: &Record) {
        let mut row = base.clone();
        row.set("course_id", course.course_id.as_str());
        row.set("course_name", course.course_name);
        row.set("credit_hours", course.credit_hours);
        row.set("course_description", course.course_description);
        self.general.push(row);

        for prereq in course.prereqs {
            self.prereqs.push(
                [("course_id", course.course_id.as_str()), ("prereq_id", prereq.as_str())]
                    .into_iter()
                    .collect(),
            );
        }
        for coreq in course.coreqs {
            self.coreqs.push(
                [("course_id", course.course_id.as_str()), ("coreq_id", coreq.as_str())]
                    .into_iter()
                    .collect(),
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequisiteMode {
    Unset,
    Prerequisite,
    Corequisite,
}

/// Parse every `div.<block_class>` on a department course page. Blocks are
/// parsed in parallel; rows keep page order.
pub fn extract_courses(
    html: &str,
    block_class: &str,
    base: &Record,
) -> Result<CourseTables, CatalogError> {
    let selector = Selector::parse(&format!("div.{}", block_class)).map_err(|e| {
        CatalogError::InvalidConfiguration(format!("course block class '{}': {}", block_class, e))
    })?;

    // Html is not Send, so hand rayon owned fragments.
    let blocks: Vec<String> = {
        let doc = Html::parse_document(html);
        doc.select(&selector).map(|b| b.html()).collect()
    };

    let courses: Vec<Option<Course>> = blocks.par_iter().map(|b| parse_block(b)).collect();

    let mut tables = CourseTables::default();
    for course in courses.into_iter().flatten() {
        tables.push(course, base);
    }
    Ok(tables)
}

/// One course block. `None` when the block has no course code.
pub fn parse_block(fragment: &str) -> Option<Course> {
    let doc = Html::parse_fragment(fragment);
    let root = doc.root_element();

    let Some(code) = first_text(root, &CODE) else {
        warn!("course block without a course code, skipping");
        return None;
    };
    let course_id = compact_code(strip_period(code.trim()));

    let course_name = first_text(root, &TITLE)
        .map(|t| strip_period(t.trim()).to_string())
        .unwrap_or_default();
    let credit_hours = first_text(root, &HOURS)
        .and_then(|t| t.split_whitespace().next().map(str::to_string))
        .unwrap_or_default();
    let course_description = first_text(root, &EXTRA)
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

    let (prereqs, coreqs) = root
        .select(&REQUISITES)
        .next()
        .map(parse_requisites)
        .unwrap_or_default();

    Some(Course {
        course_id,
        course_name,
        credit_hours,
        course_description,
        prereqs,
        coreqs,
    })
}

/// Walk the siblings after the requisite label. Keywords switch the mode;
/// linked course codes land in whichever list is active. A bare number such
/// as the `116` in `COMP 110 or 116` borrows the prefix of the last full code.
fn parse_requisites(requisites: ElementRef<'_>) -> (Vec<String>, Vec<String>) {
    let mut prereqs = Vec::new();
    let mut coreqs = Vec::new();

    let Some(label) = requisites.select(&SPAN).next() else {
        return (prereqs, coreqs);
    };

    let mut mode = RequisiteMode::Unset;
    let mut dept = String::new();

    for sibling in label.next_siblings() {
        let (text, linked) = match ElementRef::wrap(sibling) {
            Some(el) => (
                el.text().collect::<String>(),
                el.value().attr("href").is_some() || el.select(&HAS_HREF).next().is_some(),
            ),
            None => match sibling.value().as_text() {
                Some(t) => (String::from(&**t), false),
                None => continue,
            },
        };

        if linked {
            let code = compact_code(&text);
            let id = if is_numeric(&code) {
                format!("{}{}", dept, code)
            } else {
                dept = dept_prefix(&code).to_string();
                code
            };
            match mode {
                RequisiteMode::Prerequisite => prereqs.push(id),
                RequisiteMode::Corequisite => coreqs.push(id),
                RequisiteMode::Unset => {}
            }
        } else if text.contains("Prerequisite") || text.contains("prerequisite") {
            mode = RequisiteMode::Prerequisite;
        } else if text.contains("Corequisite") || text.contains("corequisite") {
            mode = RequisiteMode::Corequisite;
        }
    }

    (prereqs, coreqs)
}

fn first_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    root.select(selector).next().map(|el| el.text().collect())
}

fn strip_period(s: &str) -> &str {
    s.strip_suffix('.').unwrap_or(s)
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn dept_prefix(code: &str) -> &str {
    DEPT_PREFIX_RE.find(code).map_or("", |m| m.as_str())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> CourseTables {
        let html = std::fs::read_to_string("tests/fixtures/courses.html").unwrap();
        let base: Record = [("department", "Computer Science (COMP)")].into_iter().collect();
        extract_courses(&html, "courseblock", &base).unwrap()
    }

    #[test]
    fn general_rows_in_page_order() {
        let tables = fixture();
        let ids: Vec<_> = tables
            .general
            .iter()
            .map(|r| r.get("course_id").unwrap_or_default())
            .collect();
        assert_eq!(ids, vec!["COMP110", "COMP210", "COMP211", "COMP227"]);

        let first = &tables.general[0];
        let keys: Vec<_> = first.keys().collect();
        assert_eq!(
            keys,
            vec!["department", "course_id", "course_name", "credit_hours", "course_description"]
        );
        assert_eq!(first.get("course_name"), Some("Introduction to Programming and Data Science"));
        assert_eq!(first.get("credit_hours"), Some("3"));
        assert_eq!(first.get("department"), Some("Computer Science (COMP)"));
    }

    #[test]
    fn missing_description_is_blank() {
        let tables = fixture();
        assert_eq!(tables.general[3].get("course_description"), Some(""));
        assert_eq!(tables.general[3].get("credit_hours"), Some("1-21"));
    }

    #[test]
    fn prerequisites_expand_numeric_links() {
        let tables = fixture();
        let pairs: Vec<(&str, &str)> = tables
            .prereqs
            .iter()
            .map(|r| (r.get("course_id").unwrap_or_default(), r.get("prereq_id").unwrap_or_default()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("COMP210", "COMP110"),
                ("COMP210", "COMP116"),
                ("COMP211", "COMP210"),
                ("COMP211", "MATH231"),
            ]
        );
    }

    #[test]
    fn corequisites_follow_keyword() {
        let tables = fixture();
        let pairs: Vec<(&str, &str)> = tables
            .coreqs
            .iter()
            .map(|r| (r.get("course_id").unwrap_or_default(), r.get("coreq_id").unwrap_or_default()))
            .collect();
        assert_eq!(pairs, vec![("COMP211", "COMP283")]);
    }

    #[test]
    fn links_before_any_keyword_are_ignored() {
        let block = r#"<div class="courseblock">
            <span class="text detail-code">ABC 1.</span>
            <span class="text detail-requisites"><span>Requisites:</span>
                See <a href="/x">ABC 2</a>.</span></div>"#;
        let course = parse_block(block).unwrap();
        assert_eq!(course.course_id, "ABC1");
        assert!(course.prereqs.is_empty());
        assert!(course.coreqs.is_empty());
    }

    #[test]
    fn block_without_code_is_skipped() {
        assert!(parse_block(r#"<div class="courseblock"><p>orphan</p></div>"#).is_none());
    }
}
