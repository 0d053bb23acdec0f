// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pruefwerk: proposal compliance checker
//
// Entry point. Initialises logging, loads configuration, analyses one PDF,
// prints a summary to stderr and the JSON report to stdout.

mod config_dir;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use pruefwerk_compliance::{AnalysisOutcome, Analyzer};
use pruefwerk_core::config::{DetectionStrategy, FontFamilyMode, FontSizeMode};
use pruefwerk_core::human_errors::{humanize_diagnostic, humanize_error};
use pruefwerk_core::{AnalyzerConfig, Policy, PruefwerkError, Verdict};
use tracing::{debug, info};

/// Environment variable holding the text-generation API key.
const API_KEY_VAR: &str = "GEMINI_API_KEY";

#[derive(Debug, Parser)]
#[command(name = "pruefwerk")]
#[command(about = "Check a PDF proposal against font, margin, and section-length rules", long_about = None)]
struct Args {
    /// PDF file to analyse
    path: PathBuf,

    /// JSON configuration file (default: $XDG_CONFIG_HOME/pruefwerk/config.json if present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Section detection strategy: keyword, semantic, or refined
    #[arg(short, long)]
    strategy: Option<DetectionStrategy>,

    /// Font size check: all_within_tolerance or mode_must_match
    #[arg(long)]
    font_size_mode: Option<FontSizeMode>,

    /// Font family check: loose or strict
    #[arg(long)]
    font_family_mode: Option<FontFamilyMode>,

    /// Skip OCR for pages without a text layer
    #[arg(long)]
    no_ocr: bool,

    /// Also save the JSON to FILE
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the full analysis (diagnostics, layout statistics, keyword hits)
    /// instead of only the report
    #[arg(long)]
    details: bool,

    /// Pretty-print JSON
    #[arg(long)]
    pretty: bool,

    /// Do not print the summary to stderr
    #[arg(short, long)]
    quiet: bool,

    /// Exit with status 2 when the document is not fully compliant
    #[arg(long)]
    fail_on_noncompliant: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, PruefwerkError> {
    let config = load_config(&args)?;
    info!(strategy = ?config.detection, ocr = config.ocr.enabled, "Pruefwerk starting");

    let analyzer = Analyzer::new(config)?;
    let outcome = analyzer.analyze(&args.path).await;

    if !args.quiet {
        print_summary(&args.path, &outcome, &analyzer.config().policy);
    }

    let json = render(&outcome, &args)?;
    println!("{}", json);

    if let Some(target) = &args.output {
        std::fs::write(target, format!("{}\n", json))?;
        debug!(path = %target.display(), "report written");
    }

    if args.fail_on_noncompliant && !outcome.report.is_compliant() {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

/// Configuration precedence: `--config`, discovered file, defaults; then
/// command-line flags and the API key from the environment on top.
fn load_config(args: &Args) -> Result<AnalyzerConfig, PruefwerkError> {
    let mut config = match args.config.clone().or_else(config_dir::discover_config) {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            AnalyzerConfig::load(&path)?
        }
        None => AnalyzerConfig::default(),
    };

    if let Some(strategy) = args.strategy {
        config.detection = strategy;
    }
    if let Some(mode) = args.font_size_mode {
        config.policy.font_size_mode = mode;
    }
    if let Some(mode) = args.font_family_mode {
        config.policy.font_family_mode = mode;
    }
    if args.no_ocr {
        config.ocr.enabled = false;
    }
    if let Ok(key) = std::env::var(API_KEY_VAR) {
        if !key.trim().is_empty() {
            config.detector.api_key = Some(key);
        }
    }

    config.validate()?;
    Ok(config)
}

fn render(outcome: &AnalysisOutcome, args: &Args) -> Result<String, PruefwerkError> {
    if args.details {
        let json = if args.pretty {
            serde_json::to_string_pretty(outcome)?
        } else {
            serde_json::to_string(outcome)?
        };
        return Ok(json);
    }
    if args.pretty {
        outcome.report.to_json_pretty()
    } else {
        outcome.report.to_json()
    }
}

// -- Summary ----------------------------------------------------------------

/// Human-readable verdicts on stderr; stdout stays pure JSON.
fn print_summary(path: &Path, outcome: &AnalysisOutcome, policy: &Policy) {
    let report = &outcome.report;
    let status = if report.is_compliant() { "compliant" } else { "not compliant" };
    eprintln!("{}: {}", path.display(), status);

    let format = &report.format;
    for (label, verdict) in [
        ("file type", format.file_type),
        ("font size", format.font_size),
        ("font family", format.font_family),
        ("margins", format.margin),
    ] {
        eprintln!("  {:<24} {}", label, verdict);
    }

    for rule in &policy.sections {
        let verdict = report.section_verdict(&rule.name).unwrap_or(Verdict::Fail);
        let pages = report.section_pages(&rule.name).unwrap_or(0);
        let unit = if pages == 1 { "page" } else { "pages" };
        eprintln!(
            "  {:<24} {} ({} {}, limit {})",
            rule.name, verdict, pages, unit, rule.max_pages
        );
    }

    for diagnostic in &outcome.diagnostics {
        let human = humanize_diagnostic(diagnostic);
        eprintln!("  note: {}", human.message);
        eprintln!("        {}", human.suggestion);
    }
    if let Some(error) = &report.error {
        eprintln!("  analysis incomplete: {}", error);
    }
}

fn report_error(err: &PruefwerkError) {
    let human = humanize_error(err);
    eprintln!("error: {}", human.message);
    eprintln!("    {}", human.suggestion);
}
