//! Crawl pipelines: department index → per-department pages → CSV tables.
//!
//! Departments are handled one at a time and each department's rows are
//! appended before the next begins, so an interrupted run leaves complete
//! departments on disk.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::error::FetchError;
use crate::fetch::Fetcher;
use crate::parser::courses::{extract_courses, CourseTables};
use crate::parser::links::{collect_links, Link, LinkMap};
use crate::parser::walker::{FinalFlush, Hierarchy};
use crate::parser::{extract_hierarchy, has_element};
use crate::record::Record;
use crate::sink::{CsvSink, RunWriter};

/// A page listing links, and where on it to look.
pub struct LinkSource {
    pub path: &'static str,
    pub container: &'static str,
    pub filter: &'static str,
}

pub const UNDERGRAD_DEPARTMENTS: LinkSource = LinkSource {
    path: "/undergraduate/departments/#bydivisiontext",
    container: "bydivisiontextcontainer",
    filter: "undergraduate",
};

pub const COURSE_DEPARTMENTS: LinkSource = LinkSource {
    path: "/courses/#text",
    container: "atozindex",
    filter: "courses",
};

const PROGRAMS_FRAGMENT: &str = "#programstext";
const PROGRAMS_CONTAINER: &str = "programstextcontainer";
const PROGRAMS_FILTER: &str = "undergraduate";

/// Where a program page keeps its opportunities and how they are laid out.
/// The tab only links to a fragment of the program page itself, so its
/// content is read from the page already fetched.
pub struct OpportunitySource {
    pub tab_id: &'static str,
    pub container: &'static str,
    pub levels: [&'static str; 3],
}

pub const OPPORTUNITIES: OpportunitySource = OpportunitySource {
    tab_id: "opportunitiestexttab",
    container: "opportunitiestextcontainer",
    levels: ["h2", "h3", "p"],
};

const COURSE_BLOCK_CLASS: &str = "courseblock";

pub const OPPORTUNITY_TABLE: &str = "opportunity_info";
pub const GENERAL_TABLE: &str = "general";
pub const PREREQS_TABLE: &str = "prereqs";
pub const COREQS_TABLE: &str = "coreqs";

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Max departments to process (default: all).
    pub limit: Option<usize>,
    /// Remove existing output tables before the first write.
    pub truncate: bool,
    pub final_flush: FinalFlush,
}

/// Counts reported after a pipeline finishes.
#[derive(Debug, Default)]
pub struct Summary {
    pub departments: usize,
    pub failures: usize,
    pub rows: IndexMap<&'static str, usize>,
}

impl Summary {
    fn add_rows(&mut self, table: &'static str, n: usize) {
        *self.rows.entry(table).or_default() += n;
    }

    pub fn print(&self) {
        let tables = self
            .rows
            .iter()
            .map(|(t, n)| format!("{} {}", n, t))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "Saved {} rows across {} departments ({} fetch errors skipped).",
            if tables.is_empty() { "0".to_string() } else { tables },
            self.departments,
            self.failures,
        );
    }
}

/// Fetch a link listing page and collect its filtered links.
pub async fn fetch_links(fetcher: &Fetcher, source: &LinkSource) -> Result<LinkMap> {
    let page = fetcher
        .fetch(source.path)
        .await
        .with_context(|| format!("Failed to fetch link index {}", source.path))?;
    let links = collect_links(&page, source.container, source.filter);
    info!(path = source.path, links = links.len(), "collected links");
    Ok(links)
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

fn take_limit(links: LinkMap, limit: Option<usize>) -> Vec<Link> {
    links.into_links().take(limit.unwrap_or(usize::MAX)).collect()
}

// ── Opportunities ──

pub async fn run_opportunities(
    fetcher: &Fetcher,
    sink: &CsvSink,
    opts: &RunOptions,
) -> Result<Summary> {
    let hierarchy = Hierarchy::new(OPPORTUNITIES.levels)?;
    let departments = take_limit(fetch_links(fetcher, &UNDERGRAD_DEPARTMENTS).await?, opts.limit);

    if opts.truncate {
        sink.truncate(OPPORTUNITY_TABLE)?;
    }
    let mut run = RunWriter::new(sink);
    let mut summary = Summary::default();
    let pb = progress_bar(departments.len());

    for dept in &departments {
        pb.set_message(dept.text.clone());
        let records = match department_opportunities(
            fetcher,
            dept,
            &hierarchy,
            opts.final_flush,
            &mut summary,
        )
        .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!(department = %dept.text, error = %e, "skipping department");
                summary.failures += 1;
                Vec::new()
            }
        };

        let n = run.write(OPPORTUNITY_TABLE, &records)?;
        summary.add_rows(OPPORTUNITY_TABLE, n);
        summary.departments += 1;
        pb.println(format!("Completed Department of {}", dept.text));
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(summary)
}

async fn department_opportunities(
    fetcher: &Fetcher,
    dept: &Link,
    hierarchy: &Hierarchy,
    final_flush: FinalFlush,
    summary: &mut Summary,
) -> Result<Vec<Record>, FetchError> {
    let page = fetcher
        .fetch(&format!("{}{}", dept.href, PROGRAMS_FRAGMENT))
        .await?;
    let programs: Vec<Link> = collect_links(&page, PROGRAMS_CONTAINER, PROGRAMS_FILTER)
        .into_links()
        .collect();
    let paths: Vec<String> = programs.iter().map(|l| l.href.clone()).collect();
    let pages = fetcher.fetch_all(&paths).await;

    let mut records = Vec::new();
    for (program, page) in programs.iter().zip(pages) {
        let page = match page {
            Ok(page) => page,
            Err(e) => {
                warn!(program = %program.text, error = %e, "skipping program");
                summary.failures += 1;
                continue;
            }
        };
        if !has_element(&page, OPPORTUNITIES.tab_id) {
            continue;
        }

        let base = program_base(&program.text, &dept.text);
        records.extend(extract_hierarchy(
            &page,
            OPPORTUNITIES.container,
            hierarchy,
            &base,
            final_flush,
        ));
    }
    Ok(records)
}

fn program_base(program: &str, department: &str) -> Record {
    [("program", program), ("department", department)]
        .into_iter()
        .collect()
}

// ── Courses ──

pub async fn run_courses(fetcher: &Fetcher, sink: &CsvSink, opts: &RunOptions) -> Result<Summary> {
    let departments = take_limit(fetch_links(fetcher, &COURSE_DEPARTMENTS).await?, opts.limit);

    if opts.truncate {
        for table in [GENERAL_TABLE, PREREQS_TABLE, COREQS_TABLE] {
            sink.truncate(table)?;
        }
    }
    let mut run = RunWriter::new(sink);
    let mut summary = Summary::default();
    let pb = progress_bar(departments.len());

    for dept in &departments {
        pb.set_message(dept.text.clone());
        let tables = match fetcher.fetch(&dept.href).await {
            Ok(page) => {
                let base: Record = [("department", dept.text.as_str())].into_iter().collect();
                extract_courses(&page, COURSE_BLOCK_CLASS, &base)?
            }
            Err(e) => {
                warn!(department = %dept.text, error = %e, "skipping department");
                summary.failures += 1;
                CourseTables::default()
            }
        };

        for (table, rows) in [
            (GENERAL_TABLE, &tables.general),
            (PREREQS_TABLE, &tables.prereqs),
            (COREQS_TABLE, &tables.coreqs),
        ] {
            let n = run.write(table, rows)?;
            summary.add_rows(table, n);
        }
        summary.departments += 1;
        pb.println(format!("Completed Department of {}", dept.text));
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(summary)
}

// ── Tests ──
