mod catalog;
mod config;
mod error;
mod fetch;
mod graph;
mod parser;
mod record;
mod sink;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::catalog::{RunOptions, COURSE_DEPARTMENTS, UNDERGRAD_DEPARTMENTS};
use crate::config::{Overrides, Settings};
use crate::fetch::Fetcher;
use crate::parser::walker::{FinalFlush, Hierarchy};
use crate::record::Record;
use crate::sink::CsvSink;

#[derive(Parser)]
#[command(
    name = "catalog_scraper",
    about = "Course catalog scraper: departments, programs, opportunities and courses to CSV"
)]
struct Cli {
    /// Catalog root URL
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Directory for CSV and graph output
    #[arg(long, global = true)]
    out_dir: Option<String>,
    /// Max concurrent page fetches
    #[arg(long, global = true)]
    concurrency: Option<usize>,
    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct CrawlArgs {
    /// Max departments to process (default: all)
    #[arg(short = 'n', long)]
    limit: Option<usize>,
    /// Delete existing output tables before writing
    #[arg(long)]
    truncate: bool,
    /// Skip the final record of a section when it has no leaf text
    #[arg(long)]
    require_leaf: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List department links from the catalog index
    Departments {
        /// Use the course index instead of the undergraduate department index
        #[arg(long)]
        courses: bool,
    },
    /// Departments → programs → opportunities, into opportunity_info.csv
    Opportunities(CrawlArgs),
    /// Department course pages into general.csv, prereqs.csv and coreqs.csv
    Courses(CrawlArgs),
    /// Opportunities and courses in one run
    Run(CrawlArgs),
    /// Walk one saved HTML file and print the records as CSV
    Extract {
        /// HTML file to read
        #[arg(short, long)]
        file: PathBuf,
        /// id of the container whose children are walked
        #[arg(short, long)]
        container: String,
        /// Tag hierarchy, outermost first
        #[arg(short, long, default_value = "h2,h3,p")]
        levels: String,
        /// Extra key=value columns added to every record
        #[arg(short, long = "base")]
        base: Vec<String>,
        /// Skip the final record when it has no leaf text
        #[arg(long)]
        require_leaf: bool,
    },
    /// Render prereqs.csv as an interactive HTML graph
    Graph {
        /// Prerequisite table (default: <out_dir>/prereqs.csv)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output page (default: <out_dir>/prereqs.html)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl CrawlArgs {
    fn options(&self, settings: &Settings) -> RunOptions {
        RunOptions {
            limit: self.limit,
            truncate: self.truncate,
            final_flush: final_flush(self.require_leaf || settings.require_leaf),
        }
    }
}

fn final_flush(require_leaf: bool) -> FinalFlush {
    if require_leaf {
        FinalFlush::RequireLeaf
    } else {
        FinalFlush::Always
    }
}

fn parse_base(pairs: &[String]) -> anyhow::Result<Record> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .with_context(|| format!("Expected key=value, got '{}'", pair))
        })
        .collect()
}

/// Records of one saved page, or `None` when the page lacks the container.
fn extract_page(
    html: &str,
    container: &str,
    hierarchy: &Hierarchy,
    base: &Record,
    flush: FinalFlush,
) -> Option<Vec<Record>> {
    if !parser::has_element(html, container) {
        return None;
    }
    Some(parser::extract_hierarchy(html, container, hierarchy, base, flush))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(Overrides {
        base_url: cli.base_url,
        out_dir: cli.out_dir,
        concurrency: cli.concurrency,
        timeout_secs: cli.timeout_secs,
    })?;
    let sink = CsvSink::new(&settings.out_dir);

    let result = match cli.command {
        Commands::Departments { courses } => {
            let fetcher = Fetcher::new(&settings)?;
            let source = if courses {
                &COURSE_DEPARTMENTS
            } else {
                &UNDERGRAD_DEPARTMENTS
            };
            let links = catalog::fetch_links(&fetcher, source).await?;
            for (text, href) in links.iter() {
                println!("{:<48} {}", text, href);
            }
            println!("\n{} departments", links.len());
            Ok(())
        }
        Commands::Opportunities(args) => {
            let fetcher = Fetcher::new(&settings)?;
            println!("Scraping opportunities into {}...", sink.dir().display());
            let summary =
                catalog::run_opportunities(&fetcher, &sink, &args.options(&settings)).await?;
            summary.print();
            Ok(())
        }
        Commands::Courses(args) => {
            let fetcher = Fetcher::new(&settings)?;
            println!("Scraping courses into {}...", sink.dir().display());
            let summary = catalog::run_courses(&fetcher, &sink, &args.options(&settings)).await?;
            summary.print();
            Ok(())
        }
        Commands::Run(args) => {
            let fetcher = Fetcher::new(&settings)?;
            let opts = args.options(&settings);

            // Phase 1: Opportunities
            let t_opps = Instant::now();
            println!("Pipeline: opportunities into {}...", sink.dir().display());
            let summary = catalog::run_opportunities(&fetcher, &sink, &opts).await?;
            summary.print();
            println!("Opportunities in {:.1}s", t_opps.elapsed().as_secs_f64());

            // Phase 2: Courses
            let t_courses = Instant::now();
            println!("Pipeline: courses into {}...", sink.dir().display());
            let summary = catalog::run_courses(&fetcher, &sink, &opts).await?;
            summary.print();
            println!("Courses in {:.1}s", t_courses.elapsed().as_secs_f64());
            Ok(())
        }
        Commands::Extract {
            file,
            container,
            levels,
            base,
            require_leaf,
        } => {
            let hierarchy = Hierarchy::parse(&levels)?;
            let base = parse_base(&base)?;
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let flush = final_flush(require_leaf || settings.require_leaf);
            match extract_page(&html, &container, &hierarchy, &base, flush) {
                None => eprintln!("No container '{}' in {}.", container, file.display()),
                Some(records) if records.is_empty() => {
                    eprintln!("Container '{}' in {} held no records.", container, file.display())
                }
                Some(records) => sink::write_rows(std::io::stdout().lock(), &records, true)?,
            }
            Ok(())
        }
        Commands::Graph { input, output } => {
            let input = input.unwrap_or_else(|| sink.path(catalog::PREREQS_TABLE));
            let output = output.unwrap_or_else(|| settings.out_dir.join("prereqs.html"));
            let graph = graph::PrereqGraph::from_csv(&input)?;
            graph.write_html(&output)?;
            println!(
                "Graph: {} courses, {} links -> {}",
                graph.node_count(),
                graph.edge_count(),
                output.display()
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// `42.0s`, `3m 05s` or `1h 02m 05s`.
fn format_duration(d: std::time::Duration) -> String {
    let total = d.as_secs();
    let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);
    match (hours, minutes) {
        (0, 0) => format!("{:.1}s", d.as_secs_f64()),
        (0, _) => format!("{}m {:02}s", minutes, seconds),
        _ => format!("{}h {:02}m {:02}s", hours, minutes, seconds),
    }
}
