//! sectionrank CLI
//!
//! Ranks the section headings of a PDF batch for a persona and a task, and
//! offers a model-free view of the heading detector for tuning.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use sectionrank_lib::{
    config::InputConfig,
    error::Error,
    headings::{heading_levels, CandidateSource, DocumentHeadings},
    layout::{PdfLayoutExtractor, RulingTableDetector},
    local_embeddings::EmbeddingSimilarity,
    pipeline::{analyze_document, RunContext},
    settings::{self, Settings},
    utils::safe_truncate,
    Result,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const DEFAULT_INPUT: &str = "./input/challenge1b_input.json";
const DEFAULT_LOG_FILTER: &str = "sectionrank=info";

// ============================================================================
// Main CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "sectionrank-cli")]
#[command(version, about = "Persona-driven PDF section ranking", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Detailed logging
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Settings file (default: <config dir>/sectionrank/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank the sections of every input document
    Rank {
        /// Input configuration (documents, persona, job_to_be_done)
        #[arg(long, short, default_value = DEFAULT_INPUT)]
        input: PathBuf,

        /// Directory the document filenames are resolved against
        #[arg(long)]
        pdf_dir: Option<PathBuf>,

        /// Local all-MiniLM-L6-v2 directory
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Write the JSON here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Abort on the first unreadable document
        #[arg(long)]
        fail_fast: bool,
    },
    /// Show detected headings without loading the model
    Headings {
        /// PDF files to analyze
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
    /// Settings management
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective settings
    Show,
    /// Print the settings file location
    Path,
    /// Write the effective settings to the settings file
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run_cli(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout is reserved for results.
fn init_logging(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("sectionrank=debug")
    } else if quiet {
        EnvFilter::new("sectionrank=warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_cli(cli: Cli) -> Result<()> {
    // Handle completions first (no settings needed)
    if let Commands::Completions { shell } = &cli.command {
        generate(*shell, &mut Cli::command(), "sectionrank-cli", &mut std::io::stdout());
        return Ok(());
    }

    let settings_path = cli.settings.clone().unwrap_or_else(settings::default_path);
    let settings = Settings::load(&settings_path);
    tracing::debug!("Settings from {}", settings_path.display());

    match cli.command {
        Commands::Rank { input, pdf_dir, model_dir, output, fail_fast } => {
            let settings = Settings {
                pdf_dir: pdf_dir.unwrap_or(settings.pdf_dir),
                model_dir: model_dir.unwrap_or(settings.model_dir),
                ..settings
            };
            handle_rank(&input, &settings, output.as_deref(), fail_fast)
        }
        Commands::Headings { files, json } => handle_headings(&files, json),
        Commands::Config { cmd } => handle_config(cmd, &settings_path, &settings),
        Commands::Completions { .. } => Ok(()),
    }
}

// ============================================================================
// Command Handlers
// ============================================================================

fn handle_rank(input_path: &Path, settings: &Settings, output: Option<&Path>, fail_fast: bool) -> Result<()> {
    let start = Instant::now();

    let input = InputConfig::load(input_path)?;
    tracing::info!(
        "[Rank] {} documents for \"{}\" ({})",
        input.documents.len(),
        input.persona.role,
        safe_truncate(&input.job_to_be_done.task, 60)
    );

    let source = settings.model_source();
    tracing::info!("[Rank] Loading embedding model: {:?}", source);
    let similarity = EmbeddingSimilarity::load(&source)?;

    let ctx = RunContext::with_pdf(Box::new(similarity));
    let result = ctx.run_batch(&input, &settings.pdf_dir, fail_fast)?;
    let json = result.to_json_pretty()?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            fs::write(path, json + "\n").map_err(|e| Error::io(path, e))?;
            tracing::info!("[Rank] Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json).map_err(|e| Error::io("<stdout>", e))?;
        }
    }

    tracing::info!(
        "[Rank] {} sections in {:.2?}",
        result.extracted_sections.len(),
        start.elapsed()
    );
    Ok(())
}

fn handle_headings(files: &[PathBuf], json: bool) -> Result<()> {
    let mut reports = Vec::new();

    for path in files {
        let headings = analyze_document(&PdfLayoutExtractor, &RulingTableDetector, path)?;
        if json {
            reports.push(headings_json(path, &headings));
        } else {
            print_headings(path, &headings);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    Ok(())
}

fn headings_json(path: &Path, headings: &DocumentHeadings) -> serde_json::Value {
    let levels = heading_levels(&headings.merged);
    let merged: Vec<serde_json::Value> = headings
        .merged
        .iter()
        .map(|h| {
            serde_json::json!({
                "level": level_for(&levels, h.font_size),
                "page": h.page,
                "line_no": h.line_no,
                "font_size": h.font_size,
                "text": h.text,
            })
        })
        .collect();

    serde_json::json!({
        "document": path.display().to_string(),
        "thresholds": headings.thresholds,
        "headings": merged,
        "candidates": headings.candidates,
    })
}

fn print_headings(path: &Path, headings: &DocumentHeadings) {
    let t = &headings.thresholds;
    let show = |v: Option<i64>| v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());

    println!("{}", path.display());
    println!(
        "  threshold {}  body {}  gap {}",
        t.font_size_threshold,
        show(t.body_size),
        show(t.line_gap)
    );

    let levels = heading_levels(&headings.merged);
    for h in &headings.merged {
        println!(
            "  {:<3} p{:<3} {:>3}pt  {}",
            level_for(&levels, h.font_size),
            h.page,
            h.font_size,
            safe_truncate(&h.text, 80)
        );
    }

    let header = headings.candidates.iter().filter(|c| c.source == CandidateSource::Header).count();
    let styled = headings.candidates.len() - header;
    println!("  candidates: {} header, {} styled", header, styled);
}

fn level_for(levels: &[(i64, String)], font_size: i64) -> &str {
    levels
        .iter()
        .find(|(size, _)| *size == font_size)
        .map(|(_, level)| level.as_str())
        .unwrap_or("-")
}

fn handle_config(cmd: ConfigCommands, path: &Path, settings: &Settings) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(settings)?);
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                return Err(Error::Config {
                    path: path.to_path_buf(),
                    message: "file already exists (use --force to replace)".to_string(),
                });
            }
            settings.save(path)?;
            eprintln!("Wrote {}", path.display());
        }
    }
    Ok(())
}
