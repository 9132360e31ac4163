//! perfmon-replay - offline GPU counter report calculation
//!
//! Loads a metrics catalog and a dump of raw counter reports, runs a
//! streaming or query calculation and prints the calculated metrics.

mod catalog_file;
mod output;
mod replay;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use common::{load_config, OutputFormat, ReplayConfig, ReplayMode};
use perfmon_calc::{Catalog, Device, Equation, Evaluator, Generation};
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::replay::ReplayOptions;

#[derive(Parser)]
#[command(name = "perfmon-replay")]
#[command(about = "Replay recorded GPU counter reports through a metrics catalog")]
#[command(long_about = "Replay recorded GPU counter reports through a metrics catalog

Commands:
  run       Calculate metrics from a raw report dump
  list      List metric sets, metrics and informations of a catalog
  check     Parse an equation and optionally evaluate it against a report
  pack      Convert a YAML/JSON catalog to the binary format
  unpack    Convert a binary catalog to YAML/JSON

Examples:
  perfmon-replay run -c gpu.yaml -r dump.bin -s RenderBasic
  perfmon-replay run -c gpu.yaml -r dump.bin -s RenderBasic --metrics '^Gpu' --format json
  perfmon-replay check 'dw@0 dw@4 UADD' --generation tgl
  perfmon-replay pack gpu.yaml gpu.pmc")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(long = "config", global = true, env = "PERFMON_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate metrics from a raw report dump
    Run(RunArgs),

    /// List metric sets, metrics and informations of a catalog
    List {
        /// Catalog file
        #[arg(short, long)]
        catalog: Option<PathBuf>,
    },

    /// Parse an equation and print its elements
    Check {
        /// Equation source, e.g. "dw@0 dw@4 UADD"
        equation: String,

        /// Catalog whose device resolves `$name` globals
        #[arg(short, long)]
        catalog: Option<PathBuf>,

        /// Generation to use without a catalog
        #[arg(short, long, default_value = "tgl")]
        generation: String,

        /// Evaluate against the first report of this file
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Convert a YAML/JSON catalog to the binary format
    Pack { input: PathBuf, output: PathBuf },

    /// Convert a binary catalog to YAML/JSON
    Unpack { input: PathBuf, output: PathBuf },
}

#[derive(Args)]
struct RunArgs {
    /// Catalog file
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Raw report dump
    #[arg(short, long)]
    reports: Option<PathBuf>,

    /// Metric set symbol name
    #[arg(short = 's', long)]
    metric_set: Option<String>,

    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Raw reports per calculation call
    #[arg(short, long)]
    batch: Option<usize>,

    /// Only show columns whose name matches this regex
    #[arg(long)]
    metrics: Option<String>,

    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Also compute max values
    #[arg(long)]
    max_values: bool,

    /// Require a `ContextId` information in the metric set (stream mode)
    #[arg(long)]
    report_filtering: bool,

    /// Keep metrics whose availability equation fails on the device
    #[arg(long)]
    all_metrics: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Stream,
    Query,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let mut config = load_config(cli.config.as_deref())?;
    if cli.verbose {
        config.log.level = "debug".to_string();
    }
    if cli.no_color {
        config.log.ansi = false;
    }
    common::logging::init(&config.log)?;

    match cli.command {
        Commands::Run(args) => run(args, config),
        Commands::List { catalog } => list(&required_catalog(catalog, &config)?),
        Commands::Check {
            equation,
            catalog,
            generation,
            report,
        } => check(&equation, catalog.or(config.catalog), &generation, report.as_deref()),
        Commands::Pack { input, output } | Commands::Unpack { input, output } => {
            convert(&input, &output)
        },
    }
}

fn required_catalog(flag: Option<PathBuf>, config: &ReplayConfig) -> Result<PathBuf> {
    flag.or_else(|| config.catalog.clone())
        .context("No catalog given (use --catalog or set `catalog` in the config file)")
}

// ============================================================================
// run
// ============================================================================

fn run(args: RunArgs, mut config: ReplayConfig) -> Result<()> {
    config.catalog = args.catalog.or(config.catalog);
    config.reports = args.reports.or(config.reports);
    config.metric_set = args.metric_set.or(config.metric_set);
    if let Some(mode) = args.mode {
        config.mode = match mode {
            ModeArg::Stream => ReplayMode::Stream,
            ModeArg::Query => ReplayMode::Query,
        };
    }
    if let Some(format) = args.format {
        config.output = match format {
            FormatArg::Table => OutputFormat::Table,
            FormatArg::Json => OutputFormat::Json,
        };
    }
    config.max_values |= args.max_values;
    config.report_filtering |= args.report_filtering;
    if args.all_metrics {
        config.filter_available = false;
    }

    let catalog_path = required_catalog(None, &config)?;
    let reports_path = config
        .reports
        .clone()
        .context("No report dump given (use --reports or set `reports` in the config file)")?;
    let set_name = config
        .metric_set
        .clone()
        .context("No metric set given (use --metric-set or set `metric_set` in the config file)")?;
    let filter = args
        .metrics
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("Invalid --metrics regex")?;

    let mut catalog = catalog_file::load(&catalog_path)?;
    if config.filter_available {
        catalog.filter_available();
    }
    let set = catalog.set(&set_name)?;
    let raw = std::fs::read(&reports_path)
        .with_context(|| format!("Failed to read {}", reports_path.display()))?;

    let options = ReplayOptions {
        mode: config.mode,
        report_filtering: config.report_filtering,
        max_values: config.max_values,
        batch: args.batch,
    };
    let result = replay::replay(catalog.device().clone(), set, &raw, options)?;
    tracing::info!(
        set = %set_name,
        raw_reports = result.raw_reports,
        calculated = result.rows.len(),
        "Replay complete"
    );

    let selected = output::select_columns(&result.columns, filter.as_ref());
    match config.output {
        OutputFormat::Table => print!("{}", output::render_table(&result, &selected)),
        OutputFormat::Json => println!("{}", output::render_json(&result, &selected)?),
    }
    Ok(())
}

// ============================================================================
// list
// ============================================================================

fn list(path: &Path) -> Result<()> {
    let catalog = catalog_file::load(path)?;
    let device = catalog.device();
    let evaluator = Evaluator::for_device(device);

    println!(
        "{} {} ({})",
        "Device:".bright_cyan(),
        device.name.bright_yellow(),
        device.generation
    );
    for name in device.global_names() {
        if let Some(value) = device.global(name) {
            println!("  {} = {}", name, value);
        }
    }

    for set in catalog.sets() {
        println!();
        println!(
            "{} {} [{}] raw {} B, query {} B",
            "Metric set:".bright_cyan(),
            set.symbol_name.bold(),
            set.api_mask,
            set.raw_report_size,
            set.query_report_size
        );
        for metric in set.metrics() {
            print_entry(
                metric.is_available(&evaluator),
                &metric.symbol_name,
                &format!("{:?} {}", metric.result_type, metric.units),
            );
        }
        for information in set.informations() {
            print_entry(
                information.is_available(&evaluator),
                &information.symbol_name,
                &format!("{:?}", information.info_type),
            );
        }
    }
    Ok(())
}

fn print_entry(available: bool, name: &str, detail: &str) {
    let mark = if available { "OK".green() } else { "--".red() };
    println!("  {} {:<32} {}", mark, name, detail.dimmed());
}

// ============================================================================
// check
// ============================================================================

fn check(
    source: &str,
    catalog: Option<PathBuf>,
    generation: &str,
    report: Option<&Path>,
) -> Result<()> {
    let device = match catalog {
        Some(path) => catalog_file::load(&path)?.device().as_ref().clone(),
        None => {
            let generation: Generation = generation.parse()?;
            Device::new("offline", generation)
        },
    };

    let equation = Equation::parse(source, &device)
        .with_context(|| format!("Failed to parse '{}'", source))?;
    println!("{} {}", "Equation:".bright_cyan(), equation);
    for (i, element) in equation.elements().iter().enumerate() {
        println!("  {:>3} {:?}", i, element);
    }
    let unresolved = equation.unresolved_references();
    if !unresolved.is_empty() {
        println!("{} {}", "Metric references:".yellow(), unresolved.join(", "));
    }

    if let Some(path) = report {
        let raw =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        if raw.is_empty() {
            bail!("Report file {} is empty", path.display());
        }
        let value = Evaluator::for_device(&device).read(&equation, &raw);
        println!("{} {}", "Value:".green(), value);
    }
    Ok(())
}

// ============================================================================
// pack / unpack
// ============================================================================

fn convert(input: &Path, output: &Path) -> Result<()> {
    let catalog: Catalog = catalog_file::load(input)?;
    catalog_file::save(&catalog, output)?;
    println!(
        "{} {} -> {}",
        "Converted".green(),
        input.display(),
        output.display()
    );
    Ok(())
}
