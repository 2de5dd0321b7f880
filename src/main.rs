mod config;
mod indicators;
mod loader;
mod market;
mod models;
mod output;
mod pipeline;
mod scoring;
mod universe;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AppConfig, Scheme};
use crate::models::{ResultSet, Selection};
use crate::pipeline::{ScanReport, Scanner};

#[derive(Parser)]
#[command(name = "picks-scanner", about = "Daily technical screen for US equities", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the universe and write the picks as JSON (default)
    Scan {
        /// Output file (default: output.json_path)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Scoring scheme (default: scan.scheme)
        #[arg(short, long, value_enum)]
        scheme: Option<Scheme>,
    },

    /// Composite scan spliced into the bullish/bearish sections of a page
    Publish {
        /// Page to update in place (default: output.html_path)
        #[arg(long)]
        html: Option<PathBuf>,

        /// Also write the bullish/bearish lists as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Print the resolved ticker universe
    Tickers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "picks_scanner=info,warn",
        1 => "picks_scanner=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    let command = cli.command.unwrap_or(Command::Scan {
        out: None,
        scheme: None,
    });

    match command {
        Command::Scan { out, scheme } => {
            let _t = utils::Timer::start("Scan");
            let scheme = scheme.unwrap_or(config.scan.scheme);
            let path = out.unwrap_or_else(|| config.output.json_path.clone());
            let timezone = config.output.timezone;

            let report = Scanner::new(config)?.run(scheme).await?;
            print_summary(&report);

            let result = ResultSet::new(output::timestamp(timezone), report.selection);
            output::json::write_result_set(&path, &result)?;
        }

        Command::Publish { html, json } => {
            let _t = utils::Timer::start("Publish");
            let html = html.unwrap_or_else(|| config.output.html_path.clone());
            let output_cfg = config.output.clone();

            let report = Scanner::new(config.for_publish())?.run(Scheme::Composite).await?;
            print_summary(&report);

            output::html::publish(&html, &report.selection, &output_cfg)?;
            if let Some(path) = json {
                let result = ResultSet::new(output::timestamp(output_cfg.timezone), report.selection);
                output::json::write_result_set(&path, &result)?;
            }
        }

        Command::Tickers => {
            let tickers = Scanner::new(config)?.universe().await?;
            println!("{} tickers:", tickers.len());
            for t in &tickers {
                println!("  {}", t);
            }
        }
    }

    Ok(())
}

fn print_summary(report: &ScanReport) {
    println!("─────────────────────────────────");
    println!("  Scan summary ({:?})", report.scheme);
    println!("─────────────────────────────────");
    println!("  Universe  : {}", utils::fmt_count(report.scanned));
    println!("  Fetched   : {}", utils::fmt_count(report.fetched));
    println!("  Failed    : {}", utils::fmt_count(report.failed));
    println!("  Too short : {}", utils::fmt_count(report.insufficient));
    println!("  Undefined : {}", utils::fmt_count(report.undefined));
    println!("  Scored    : {}", utils::fmt_count(report.evaluated));
    println!("  Admitted  : {}", utils::fmt_count(report.admitted));
    println!("─────────────────────────────────");

    if report.selection.is_empty() {
        println!("  No picks today.");
        return;
    }

    match &report.selection {
        Selection::Ranked(picks) => {
            for p in picks {
                println!("  {:<6} {:>3}  ${:<9.2} {}", p.ticker, p.score, p.price, p.reason);
            }
        }
        Selection::Split { bullish, bearish } => {
            for (label, picks) in [("BULL", bullish), ("BEAR", bearish)] {
                for p in picks {
                    let rating = p.rating.map(|r| r.label()).unwrap_or("-");
                    println!("  {} {:<6} {:<11} ${:<9.2} {}", label, p.ticker, rating, p.price, p.reason);
                }
            }
        }
    }
}
