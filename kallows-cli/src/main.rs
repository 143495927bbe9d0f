//! Kallows CLI - KiCad panelization and Mouser part lookup from the command line.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use kallows::lookup::{read_parts_file, OutputFormat as LookupFormat};
use kallows::panel::preset::parse_override;
use kallows::units::parse_length;
use kallows::{LookupRunner, MouserClient, PanelBuilder, PanelJob, PanelSummary, DEFAULT_SPACING_MM};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kallows")]
#[command(about = "KiCad panelization and Mouser part lookup", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug details to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up every part number of a CSV table
    Lookup {
        /// CSV file with a header row
        #[arg(value_name = "CSV")]
        input: PathBuf,

        /// Column holding the part numbers
        #[arg(long, default_value = "MPN")]
        column: String,

        /// Mouser API key
        #[arg(long, env = "MOUSER_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Search endpoint
        #[arg(long, env = "MOUSER_API_URL")]
        endpoint: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: LookupOutput,

        /// Exit with error code if any part could not be fetched
        #[arg(long)]
        fail_on_error: bool,
    },

    /// Build a panel from KiCad boards
    Panelize {
        /// Board file, repeat for each board in placement order
        #[arg(short, long = "board", value_name = "KICAD_PCB", required = true)]
        boards: Vec<PathBuf>,

        /// Panel file to write
        #[arg(short, long, value_name = "KICAD_PCB")]
        output: PathBuf,

        #[command(flatten)]
        preset: PresetArgs,

        /// Output format of the run summary
        #[arg(short, long, value_enum, default_value = "human")]
        format: SummaryOutput,
    },

    /// Print the merged preset as JSON
    Preset {
        #[command(flatten)]
        preset: PresetArgs,
    },
}

#[derive(clap::Args)]
struct PresetArgs {
    /// Gap between boards, e.g. 3mm
    #[arg(long, value_parser = parse_spacing, default_value_t = DEFAULT_SPACING_MM)]
    spacing: f64,

    /// JSON preset file, applied in order
    #[arg(short, long = "preset", value_name = "JSON")]
    presets: Vec<PathBuf>,

    /// Override one option, e.g. -s cuts.type=vcuts
    #[arg(short = 's', long = "set", value_name = "SECTION.KEY=VALUE")]
    overrides: Vec<String>,
}

#[derive(Clone, ValueEnum)]
enum LookupOutput {
    /// Indented JSON
    Pretty,
    /// One line per part
    Compact,
}

#[derive(Clone, ValueEnum)]
enum SummaryOutput {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

fn parse_spacing(s: &str) -> Result<f64, String> {
    let value = parse_length(s).map_err(|e| e.to_string())?;
    if !value.is_finite() || value < 0.0 {
        return Err("spacing must be a finite, non-negative length".to_string());
    }
    Ok(value)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match cli.command {
        Commands::Lookup {
            input,
            column,
            api_key,
            endpoint,
            format,
            fail_on_error,
        } => handle_lookup(&input, &column, api_key, endpoint, format, fail_on_error),
        Commands::Panelize {
            boards,
            output,
            preset,
            format,
        } => handle_panelize(boards, output, &preset, format),
        Commands::Preset { preset } => handle_preset(&preset),
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_job(boards: Vec<PathBuf>, output: PathBuf, args: &PresetArgs) -> anyhow::Result<PanelJob> {
    let mut job = PanelJob::new(boards, output);
    job.spacing_mm = args.spacing;
    job.presets = args.presets.clone();
    for spec in &args.overrides {
        job.overrides.push(parse_override(spec)?);
    }
    tracing::debug!(
        "Job: {} boards, {} preset files, {} overrides",
        job.boards.len(),
        job.presets.len(),
        job.overrides.len()
    );
    Ok(job)
}

fn handle_lookup(
    input: &Path,
    column: &str,
    api_key: Option<String>,
    endpoint: Option<String>,
    format: LookupOutput,
    fail_on_error: bool,
) -> i32 {
    let result = (|| -> anyhow::Result<kallows::lookup::LookupSummary> {
        let client = MouserClient::new(api_key.unwrap_or_default(), endpoint.as_deref())?;
        let table = read_parts_file(input, column)
            .with_context(|| format!("reading part table {}", input.display()))?;
        let format = match format {
            LookupOutput::Pretty => LookupFormat::Pretty,
            LookupOutput::Compact => LookupFormat::Compact,
        };
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("starting async runtime")?;
        let runner = LookupRunner::new(client, format);
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        let summary = runtime.block_on(runner.run(&table.parts, table.skipped, &mut out))?;
        Ok(summary)
    })();

    match result {
        Ok(summary) => {
            if fail_on_error && summary.failed > 0 {
                return 1;
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn handle_panelize(boards: Vec<PathBuf>, output: PathBuf, args: &PresetArgs, format: SummaryOutput) -> i32 {
    let result = build_job(boards, output, args)
        .and_then(|job| PanelBuilder::build(&job).context("panelization failed"));

    match result {
        Ok(summary) => {
            match format {
                SummaryOutput::Human => output_human(&summary),
                SummaryOutput::Json => match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return 1;
                    }
                },
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn output_human(summary: &PanelSummary) {
    println!("\nPanel: {}", summary.output.display());
    println!("{}", "─".repeat(60));
    for (i, rect) in summary.substrates.iter().enumerate() {
        println!(
            "  Board {}: ({:.2}, {:.2}) - ({:.2}, {:.2})",
            i + 1,
            rect.min.x,
            rect.min.y,
            rect.max.x,
            rect.max.y
        );
    }
    if let Some(bbox) = summary.outline_bbox {
        println!("  Size:     {:.2} x {:.2} mm", bbox.width(), bbox.height());
    }
    println!("  Nets:     {}", summary.nets);
    println!("  Tabs:     {}", summary.tabs);
    println!("  Cuts:     {} ({} features)", summary.cuts, summary.cut_features);
    println!("  Tooling:  {} holes, {} fiducials", summary.tooling_holes, summary.fiducials);
    if summary.copper_zones > 0 {
        println!("  Copper:   {} zones", summary.copper_zones);
    }
    for text in &summary.texts {
        println!("  Text:     {}", text);
    }
}

fn handle_preset(args: &PresetArgs) -> i32 {
    let result = build_job(Vec::new(), PathBuf::new(), args)
        .and_then(|job| job.preset().context("merging presets"));

    match result {
        Ok(preset) => match serde_json::to_string_pretty(&preset.to_value()) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}
