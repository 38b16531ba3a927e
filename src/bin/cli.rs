use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use beatseq::analysis::{detect_with_timeout, load_timing, run_analyzer};
use beatseq::config::write_json;
use beatseq::describe::{describe_recommendations, describe_summary, describe_tree};
use beatseq::import::{parse_layout_file, ParsedLayout};
use beatseq::layout::NameMatcher;
use beatseq::plan::HousePlan;
use beatseq::{
    load_config, GenerationOptions, GeneratorConfig, SequenceGenerator, SynthError, TimingOptions,
    TimingSource,
};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "beatseq", about = "Beat-synchronised light-show sequence generator", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Generator config JSON (built-in defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved fixture/group tree
    Inspect {
        #[arg(long)]
        layout: PathBuf,
    },
    /// Propose fixture groupings
    Recommend {
        #[arg(long)]
        layout: PathBuf,
    },
    /// Map style-group labels onto layout group names
    MapGroups {
        #[arg(long)]
        layout: PathBuf,
        /// Comma-separated labels, e.g. "Focal_Tree,Garage/Porch"
        #[arg(long, value_delimiter = ',', required = true)]
        labels: Vec<String>,
    },
    /// Generate a sequence
    Generate(GenerateArgs),
}

#[derive(Args)]
struct GenerateArgs {
    #[arg(long)]
    layout: PathBuf,
    /// Timing analysis JSON
    #[arg(long, conflicts_with = "analyzer")]
    timing: Option<PathBuf>,
    /// External beat analyzer command; the audio path is appended
    #[arg(long, requires = "audio")]
    analyzer: Option<String>,
    #[arg(long)]
    audio: Option<PathBuf>,
    /// Song duration in seconds (overrides the analysis)
    #[arg(long)]
    duration: Option<f64>,
    #[arg(long)]
    preset: Option<String>,
    /// Comma-separated #RRGGBB colors
    #[arg(long, value_delimiter = ',')]
    palette: Vec<String>,
    /// Manual tempo in BPM; replaces detected beats
    #[arg(long)]
    tempo: Option<f64>,
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    offset_ms: i64,
    /// House-style plan JSON
    #[arg(long, conflicts_with = "starter_plan")]
    plan: Option<PathBuf>,
    /// Use the built-in starter plan
    #[arg(long)]
    starter_plan: bool,
    /// Comma-separated fixture or group names to feature
    #[arg(long, value_delimiter = ',')]
    prefer: Vec<String>,
    /// Write the sequence JSON here
    #[arg(long)]
    out: Option<PathBuf>,
}

// ── Helpers ──────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "beatseq=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<(), SynthError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!("\nSkipped ({})", warnings.len());
    for w in warnings {
        println!("  - {w}");
    }
}

fn load_layout(path: &Path) -> Result<ParsedLayout, SynthError> {
    parse_layout_file(path)
}

async fn timing_source(args: &GenerateArgs, config: &GeneratorConfig) -> TimingSource {
    if let Some(path) = &args.timing {
        return TimingSource::from_result(load_timing(path), args.duration);
    }
    if let (Some(command), Some(audio)) = (&args.analyzer, &args.audio) {
        let timeout = Duration::from_secs(config.timing.detection_timeout_secs);
        return detect_with_timeout(run_analyzer(command, audio), timeout, args.duration).await;
    }
    warn!("no timing source given");
    TimingSource::Unavailable {
        reason: "no --timing or --analyzer given".into(),
        probed_duration: args.duration,
    }
}

fn generation_options(args: &GenerateArgs) -> GenerationOptions {
    GenerationOptions {
        preset_id: args.preset.clone(),
        palette: (!args.palette.is_empty()).then(|| args.palette.clone()),
        timing: TimingOptions {
            manual_tempo_bpm: args.tempo,
            start_offset_ms: args.offset_ms,
            duration_seconds: args.duration,
        },
        preferred: args.prefer.clone(),
        intents: None,
    }
}

// ── Commands ─────────────────────────────────────────────────────

async fn run(cli: &Cli) -> Result<(), SynthError> {
    let config = load_config(cli.config.as_deref())?;
    let generator = SequenceGenerator::new(&config);

    match &cli.command {
        Commands::Inspect { layout } => {
            let resolved = generator.resolve(&load_layout(layout)?);
            if cli.json {
                print_json(&serde_json::json!({
                    "tree": resolved.tree,
                    "warnings": resolved.warnings,
                }))?;
            } else {
                println!("{}", describe_tree(&resolved.tree));
                print_warnings(&resolved.warnings);
            }
        }
        Commands::Recommend { layout } => {
            let recs = generator.recommend(&load_layout(layout)?);
            if cli.json {
                print_json(&recs)?;
            } else {
                println!("{}", describe_recommendations(&recs));
            }
        }
        Commands::MapGroups { layout, labels } => {
            let resolved = generator.resolve(&load_layout(layout)?);
            let mapping = NameMatcher::default().map_style_groups(labels, &resolved.tree.group_names());
            if cli.json {
                print_json(&mapping)?;
            } else {
                for label in labels {
                    match mapping.get(label) {
                        Some(group) => println!("{label} -> {group}"),
                        None => println!("{label} -> (no match)"),
                    }
                }
            }
        }
        Commands::Generate(args) => {
            let layout = load_layout(&args.layout)?;
            let plan = match (&args.plan, args.starter_plan) {
                (Some(path), _) => Some(HousePlan::load(path)?),
                (None, true) => Some(HousePlan::starter()),
                (None, false) => None,
            };
            let timing = timing_source(args, &config).await;
            let output = generator.generate(&layout, &timing, &generation_options(args), plan.as_ref())?;

            if let Some(out) = &args.out {
                write_json(out, &output.sequence)?;
                eprintln!("Wrote {}", out.display());
            }
            if cli.json {
                if args.out.is_some() {
                    print_json(&output.summary)?;
                } else {
                    print_json(&output)?;
                }
            } else {
                println!("{}", describe_summary(&output.summary, &output.sequence));
                print_warnings(&output.warnings);
            }
        }
    }
    Ok(())
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        if cli.json {
            let body = serde_json::to_string_pretty(&e).unwrap_or_default();
            println!("{body}");
        }
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
