//! rvsync CLI
//!
//! Command-line tool for regenerating translated `.rvtext` files against their
//! original-language counterparts.

use clap::{Args, Parser, Subcommand};
use rvsync_core::config::CONFIG_FILE_NAME;
use rvsync_core::extract::{parse_file, parse_file_lenient};
use rvsync_core::pipeline::{run as run_domains, RunMode, RunReport};
use rvsync_core::{Domain, FileSide, MapRegistry, PatternSet, PayloadRole, ProjectConfig};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "rvsync")]
#[command(about = "Keep translated .rvtext files in sync with their source files", long_about = None)]
#[command(version)]
struct Cli {
    /// Console log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Also write a debug log to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ProjectArgs {
    /// Project directory holding the .rvtext files
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// Configuration file (defaults to <project>/rvsync.json when present);
    /// its project_dir replaces --project
    #[arg(short, long, conflicts_with = "project")]
    config: Option<PathBuf>,

    /// Domains to process (DATABASE, DIALOGUES, SCRIPT_TEXT); all bound domains by default
    #[arg(short, long)]
    domain: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write <target>.new and <target>.unused for each domain
    Update {
        #[command(flatten)]
        project: ProjectArgs,

        /// Process domains in parallel
        #[arg(long)]
        parallel: bool,

        /// Write a JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show translated, untranslated and obsolete counts without writing
    Status {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// List domains and their file bindings
    Domains {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// List .rvtext files in the project directory
    Scan {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Parse and display a single .rvtext file
    Parse {
        /// Path to the file
        #[arg(short, long)]
        file: PathBuf,

        /// Payload to read: original (source file) or translation (target file)
        #[arg(short, long, default_value = "original")]
        role: PayloadRole,

        /// Skip unparsable records instead of failing
        #[arg(long)]
        lenient: bool,

        /// Maximum number of records to display
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Create a default configuration file
    Init {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> rvsync_core::Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Update { project, .. }
        | Commands::Status { project }
        | Commands::Domains { project }
        | Commands::Scan { project } => Some(load_config(project)?),
        Commands::Parse { .. } | Commands::Init { .. } => None,
    };

    let log_file = cli
        .log_file
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.log_file.clone()));
    let _guard = init_tracing(&cli.log_level, log_file.as_deref());

    match (cli.command, config) {
        (
            Commands::Update {
                project,
                parallel,
                report,
            },
            Some(mut config),
        ) => {
            config.parallel |= parallel;
            cmd_update(&config, &project.domain, report.as_deref())
        }
        (Commands::Status { project }, Some(config)) => cmd_status(&config, &project.domain),
        (Commands::Domains { project }, Some(config)) => {
            cmd_domains(&config, &project.domain).map(|_| ExitCode::SUCCESS)
        }
        (Commands::Scan { .. }, Some(config)) => cmd_scan(&config).map(|_| ExitCode::SUCCESS),
        (
            Commands::Parse {
                file,
                role,
                lenient,
                limit,
            },
            _,
        ) => cmd_parse(&file, role, lenient, limit).map(|_| ExitCode::SUCCESS),
        (Commands::Init { project, force }, _) => {
            cmd_init(&project, force).map(|_| ExitCode::SUCCESS)
        }
        (_, None) => Ok(ExitCode::FAILURE),
    }
}

fn init_tracing(level: &str, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().unwrap_or_else(|| OsStr::new("rvsync.log"));
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer)
                .with_filter(EnvFilter::new("debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}

fn load_config(args: &ProjectArgs) -> rvsync_core::Result<ProjectConfig> {
    match &args.config {
        Some(path) => ProjectConfig::load(path),
        None => ProjectConfig::discover(&args.project),
    }
}

fn select_domains(registry: &MapRegistry, names: &[String]) -> rvsync_core::Result<Vec<Domain>> {
    if names.is_empty() {
        return Ok(registry.domains());
    }
    names.iter().map(|n| n.parse::<Domain>()).collect()
}

fn cmd_update(
    config: &ProjectConfig,
    names: &[String],
    report_path: Option<&Path>,
) -> rvsync_core::Result<ExitCode> {
    let registry = MapRegistry::new(config)?;
    let domains = select_domains(&registry, names)?;

    let report = run_domains(&registry, &domains, RunMode::Update, config.parallel);
    info!(
        "Update finished: {} domain(s) written, {} failed",
        report.domains.len(),
        report.failures.len()
    );

    for domain in &report.domains {
        println!(
            "{}: {} entries ({} translated, {} untranslated), {} unused",
            domain.domain, domain.source_entries, domain.translated, domain.untranslated, domain.orphans
        );
        if let Some(written) = &domain.written {
            println!("  -> {}", written.merged.display());
            if let Some(unused) = &written.unused {
                println!("  -> {}", unused.display());
            }
            if let Some(stale) = &written.stale_unused {
                println!("  !! {} is left over from an earlier run", stale.display());
            }
        }
    }
    print_failures(&report);

    if let Some(path) = report_path {
        report.save(path)?;
        println!("Report written to {}", path.display());
    }

    Ok(exit_code(&report))
}

fn cmd_status(config: &ProjectConfig, names: &[String]) -> rvsync_core::Result<ExitCode> {
    let registry = MapRegistry::new(config)?;
    let domains = select_domains(&registry, names)?;

    let report = run_domains(&registry, &domains, RunMode::Status, config.parallel);

    println!("Domain\tSource\tTarget\tTranslated\tUntranslated\tUnused");
    println!("{}", "-".repeat(64));
    for d in &report.domains {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            d.domain, d.source_entries, d.target_entries, d.translated, d.untranslated, d.orphans
        );
    }
    print_failures(&report);

    Ok(exit_code(&report))
}

fn cmd_domains(config: &ProjectConfig, names: &[String]) -> rvsync_core::Result<()> {
    let registry = MapRegistry::new(config)?;
    let domains = select_domains(&registry, names)?;

    println!("Project: {}", registry.project_dir().display());
    println!();
    for domain in domains {
        let (source, target) = registry.resolve(domain)?;
        println!("{}", domain);
        println!("  source: {}{}", source.display(), missing_marker(&source));
        println!("  target: {}{}", target.display(), missing_marker(&target));
    }

    Ok(())
}

fn cmd_scan(config: &ProjectConfig) -> rvsync_core::Result<()> {
    let registry = MapRegistry::new(config)?;
    let result = registry.scan_project()?;

    println!("Scanned {}", result.root.display());
    println!("Found {} .rvtext file(s):", result.files.len());
    for file in &result.files {
        let binding = match file.binding {
            Some((domain, FileSide::Source)) => format!(" [{} source]", domain),
            Some((domain, FileSide::Target)) => format!(" [{} target]", domain),
            None => " [unbound]".to_string(),
        };
        println!("  {}{}", file.path.display(), binding);
    }

    if !result.missing.is_empty() {
        println!();
        println!("Missing bound files:");
        for (domain, side, path) in &result.missing {
            println!("  {} {:?}: {}", domain, side, path.display());
        }
    }

    Ok(())
}

fn cmd_parse(file: &Path, role: PayloadRole, lenient: bool, limit: usize) -> rvsync_core::Result<()> {
    let side = match role {
        PayloadRole::Original => FileSide::Source,
        PayloadRole::Translation => FileSide::Target,
    };
    let patterns = PatternSet::rvtext(side)?;
    let corpus = if lenient {
        parse_file_lenient(file, &patterns, role)?
    } else {
        parse_file(file, &patterns, role)?
    };

    println!("File: {}", file.display());
    println!("Records: {}", corpus.len());
    println!();

    for record in corpus.in_order().iter().take(limit) {
        println!("{}\t{}", record.key, preview(&record.field));
    }

    if corpus.len() > limit {
        println!("... ({} more records)", corpus.len() - limit);
    }

    Ok(())
}

fn cmd_init(project: &Path, force: bool) -> rvsync_core::Result<()> {
    let path = project.join(CONFIG_FILE_NAME);
    if path.exists() && !force {
        println!("{} already exists (use --force to overwrite)", path.display());
        return Ok(());
    }

    let config = ProjectConfig::for_project(".");
    config.save(&path)?;
    println!("Created configuration file: {}", path.display());
    println!();
    println!("Edit the file to change file bindings, then run:");
    println!("  rvsync update --project {}", project.display());

    Ok(())
}

fn print_failures(report: &RunReport) {
    if !report.failures.is_empty() {
        println!("\nErrors ({}):", report.failures.len());
        for failure in &report.failures {
            println!("  {}: {}", failure.domain, failure.error);
        }
    }
}

fn exit_code(report: &RunReport) -> ExitCode {
    if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn missing_marker(path: &Path) -> &'static str {
    if path.is_file() {
        ""
    } else {
        " (missing)"
    }
}

/// First line of a payload, shortened for display
fn preview(field: &str) -> String {
    let first = field.lines().next().unwrap_or("");
    let mut out: String = first.chars().take(60).collect();
    if first.chars().count() > 60 || field.lines().nth(1).is_some() {
        out.push_str("...");
    }
    out
}
