//! Mustermark binary
//!
//! Highlights every word of a PDF that contains a match of a regular expression.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use mustermark_cli::worker::{run_job, PROGRESS_INTERVAL};
use mustermark_cli::{Config, Overrides};
use mustermark_core::{pattern, MarkJob, MarkSummary, Marker};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mustermark")]
#[command(
    version,
    about = "Highlight words matching a regular expression in a PDF"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Highlight matches and write the marked document
    Mark {
        /// PDF to read
        input: PathBuf,

        /// Where to write the marked PDF (must differ from the input)
        output: PathBuf,

        #[command(flatten)]
        options: PatternOptions,

        /// Highlight colour as #RRGGBB
        #[arg(long)]
        color: Option<String>,

        /// Highlight opacity between 0 and 1
        #[arg(long)]
        opacity: Option<f32>,
    },
    /// List the matches on every page without modifying anything
    Scan {
        /// PDF to read
        input: PathBuf,

        #[command(flatten)]
        options: PatternOptions,
    },
}

#[derive(Args, Debug)]
struct PatternOptions {
    /// Regular expression to search for (defaults to the tagged-identifier pattern)
    #[arg(short, long)]
    pattern: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ScanPage {
    page: usize,
    matches: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Mark {
            input,
            output,
            options,
            color,
            opacity,
        } => {
            let config = Config::load(options.config.as_deref())?.apply(Overrides {
                pattern: options.pattern,
                color,
                opacity,
            });
            let job = MarkJob::new(input, output)
                .with_pattern(config.pattern())
                .with_style(config.style()?);

            let summary = run_job(job, PROGRESS_INTERVAL).await?;
            print_summary(&summary, options.json)?;
        }
        Command::Scan { input, options } => {
            let config = Config::load(options.config.as_deref())?.apply(Overrides {
                pattern: options.pattern,
                ..Default::default()
            });
            let pages = scan(&input, config.pattern())?;
            if options.json {
                println!("{}", serde_json::to_string_pretty(&pages)?);
            } else {
                for page in pages.iter().filter(|p| !p.matches.is_empty()) {
                    println!("page {}: {}", page.page + 1, page.matches.join(", "));
                }
            }
        }
    }

    Ok(())
}

fn scan(input: &Path, source: &str) -> anyhow::Result<Vec<ScanPage>> {
    let pattern = pattern::compile(source)?;
    let marker = Marker::open(input).with_context(|| format!("Failed to scan {}", input.display()))?;
    (0..marker.document().page_count())
        .map(|page| -> anyhow::Result<ScanPage> {
            Ok(ScanPage {
                page,
                matches: marker.match_words(page, Some(&pattern))?,
            })
        })
        .collect()
}

fn print_summary(summary: &MarkSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    for page in summary.pages.iter().filter(|p| p.highlights > 0) {
        println!(
            "page {}: {} matches, {} highlights",
            page.page + 1,
            page.matches.len(),
            page.highlights
        );
    }
    println!(
        "{} matches, {} highlights",
        summary.total_matches(),
        summary.total_highlights()
    );
    Ok(())
}
