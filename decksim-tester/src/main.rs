mod progress;
mod protocol;
mod reports;
mod runner;
mod stats;
mod tester;
mod util;
mod worker;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use decksim_engine::{BuiltinEngine, DeckConfig, load_decks_from_dir};
use tester::{DeckTester, TesterConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecMode {
    /// One worker process per trial (isolated, survives engine crashes)
    Process,
    /// All trials in-process on the worker pool (fast, no isolation)
    Thread,
}

#[derive(Debug, Parser)]
#[command(name = "decksim-tester", version)]
#[command(about = "Batch deck testing - run a deck against a gauntlet of opponents in parallel")]
struct Args {
    /// Path to the subject deck JSON file
    #[arg(long)]
    deck: Option<PathBuf>,

    /// Directory of opponent deck JSON files
    #[arg(long, default_value = "decks")]
    deck_dir: PathBuf,

    /// Games to play against each opponent
    #[arg(short = 'n', long, default_value_t = 100)]
    games: u32,

    /// Opponent seats at multi-party (commander) tables
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..=4))]
    pod_opponents: u32,

    /// Base timeout in seconds for a two-party trial; doubles per extra seat
    #[arg(long, default_value_t = 150)]
    timeout_secs: u64,

    /// Trial execution strategy
    #[arg(long, value_enum, default_value_t = ExecMode::Process)]
    exec: ExecMode,

    /// Disable the live dashboard
    #[arg(long)]
    no_live: bool,

    /// Run seed; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Worker pool size (default: one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["console", "json", "csv"])]
    report: String,

    /// Optional path to write the report instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    // Worker-mode options, set only by the orchestrator when spawning
    // trial processes.
    /// Run as a single-trial worker process
    #[arg(long, hide = true)]
    worker: bool,

    /// Subject deck file for worker mode
    #[arg(long, hide = true)]
    subject_file: Option<PathBuf>,

    /// Opponent deck file for worker mode (repeatable)
    #[arg(long, hide = true)]
    opponent_file: Vec<PathBuf>,

    /// Trial seed for worker mode
    #[arg(long, hide = true, default_value_t = 0)]
    worker_seed: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.worker {
        let subject = args
            .subject_file
            .as_deref()
            .context("--worker requires --subject-file")?;
        return worker::run_worker(subject, &args.opponent_file, args.worker_seed);
    }

    let live = live_dashboard_enabled(&args);
    if !live {
        announce_banner();
    }

    let deck_path = args.deck.as_deref().context("--deck is required")?;
    let subject = DeckConfig::load(deck_path)
        .with_context(|| format!("failed to load deck {}", deck_path.display()))?;
    let opponents = load_gauntlet(&args, &subject)?;

    let seed = args.seed.unwrap_or_else(rand::random);
    if !live {
        println!(
            "🎲 Testing {} against {} opponents, {} games each (seed {seed})",
            subject.name.bold(),
            opponents.len(),
            args.games
        );
    }

    let tester = Arc::new(DeckTester::new(
        Arc::new(BuiltinEngine::default()),
        build_config(&args, seed, live),
    ));

    {
        let tester = Arc::clone(&tester);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("interrupt received; finishing recorded trials");
                tester.cancel();
            }
        });
    }

    let summary = {
        let tester = Arc::clone(&tester);
        let games = args.games;
        tokio::task::spawn_blocking(move || tester.test_deck(&subject, &opponents, games))
            .await
            .context("test run panicked")??
    };

    if summary.totals.played < summary.totals.expected {
        println!(
            "{}",
            format!(
                "⚠️  Run stopped after {} of {} trials; results are partial",
                summary.totals.played, summary.totals.expected
            )
            .yellow()
        );
    }

    write_report(&args, &summary)?;
    Ok(())
}

fn announce_banner() {
    println!("{}", "🃏 DeckSim Batch Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

/// The dashboard owns the terminal, so it stays off whenever the console
/// report itself goes to stdout alongside it being disabled explicitly.
fn live_dashboard_enabled(args: &Args) -> bool {
    !args.no_live && args.report == "console"
}

fn build_config(args: &Args, seed: u64, live: bool) -> TesterConfig {
    TesterConfig {
        base_timeout: Duration::from_secs(args.timeout_secs),
        isolate: args.exec == ExecMode::Process,
        pod_opponents: args.pod_opponents,
        live,
        threads: args.threads,
        seed,
        worker_exe: None,
    }
}

/// Load the opponent gauntlet, leaving the subject itself out when its deck
/// file happens to live in the same directory.
fn load_gauntlet(args: &Args, subject: &DeckConfig) -> Result<Vec<DeckConfig>> {
    let decks = load_decks_from_dir(&args.deck_dir)
        .with_context(|| format!("failed to read deck directory {}", args.deck_dir.display()))?;
    Ok(decks
        .into_iter()
        .filter(|d| d.name != subject.name)
        .collect())
}

fn write_report(args: &Args, summary: &stats::TestRunSummary) -> Result<()> {
    // CSV without an explicit --output goes to a file named after the deck;
    // a spreadsheet dumped to the terminal helps nobody.
    if args.report == "csv" && args.output.is_none() {
        let path = default_csv_path(&summary.deck_name);
        reports::save_results_csv(&path, summary)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("📄 Results written to {}", path.display());
        return Ok(());
    }

    let mut target = OutputTarget::new(args.output.clone())?;
    match args.report.as_str() {
        "json" => {
            serde_json::to_writer_pretty(&mut target, summary)
                .context("failed to serialize summary")?;
            writeln!(&mut target)?;
        }
        "csv" => reports::write_results_csv(&mut target, summary)?,
        _ => reports::print_summary(&mut target, summary)?,
    }
    target.flush_inner()?;
    Ok(())
}

fn default_csv_path(deck_name: &str) -> PathBuf {
    PathBuf::from(format!("{}-results.csv", util::sanitize_filename(deck_name)))
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
