//! CLI for the anchor-harness library
//!
//! Serves the build-and-test HTTP API, runs a single request locally, or
//! parses a captured `anchor test` log.

mod server;

use anchor_harness::{
    parse_test_log, HarnessConfig, HarnessError, RunOptions, TestCase, TestReport, TestRequest,
};
use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use serde::Serialize;
use std::{
    io::Read,
    path::{Path, PathBuf},
};
use tracing::Level;

/// Anchor program build-and-test harness
#[derive(Parser, Debug)]
#[command(name = "anchor-harness")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all logging except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Workspace and toolchain settings shared by `serve` and `run`
#[derive(Parser, Debug, Clone)]
struct HarnessSettings {
    /// TOML config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Anchor workspace root
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Anchor executable
    #[arg(long)]
    anchor: Option<String>,

    /// Cluster section in Anchor.toml that receives the program id
    #[arg(long)]
    cluster: Option<String>,
}

impl HarnessSettings {
    fn load(self) -> Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::from_file(path)?,
            None => HarnessConfig::default(),
        };

        if let Some(workspace) = self.workspace {
            config.workspace_root = workspace;
        }
        if let Some(anchor) = self.anchor {
            config.anchor_bin = anchor;
        }
        if let Some(cluster) = self.cluster {
            config.cluster = cluster;
        }

        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Listen address
        #[arg(long)]
        bind: Option<String>,

        #[command(flatten)]
        settings: HarnessSettings,
    },

    /// Build and test one request body from a JSON file
    Run {
        /// Request JSON (`projectName`, `programFiles`, `testFiles`, `configFiles`)
        request: PathBuf,

        /// Keep the program id already present in the submitted files
        #[arg(long)]
        no_inject: bool,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        settings: HarnessSettings,
    },

    /// Parse a captured `anchor test` log ("-" reads stdin)
    Parse {
        #[arg(default_value = "-")]
        log: PathBuf,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "status")]
enum Output<'a> {
    #[serde(rename = "success")]
    Success {
        #[serde(skip_serializing_if = "Option::is_none")]
        program_id: Option<&'a str>,
        #[serde(rename = "testResults")]
        test_results: &'a TestReport,
    },

    #[serde(rename = "error")]
    Error {
        error_type: &'static str,
        message: String,
        #[serde(rename = "testResults", skip_serializing_if = "Option::is_none")]
        test_results: Option<&'a TestReport>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Serve { bind, settings } => run_serve(bind, settings),
        Commands::Run {
            request,
            no_inject,
            json,
            settings,
        } => run_request(&request, no_inject, json, settings),
        Commands::Parse { log, json } => run_parse(&log, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

fn run_serve(bind: Option<String>, settings: HarnessSettings) -> Result<()> {
    let mut config = settings.load()?;
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }
    config.validate()?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    runtime.block_on(server::serve(config))
}

fn run_request(path: &Path, no_inject: bool, json: bool, settings: HarnessSettings) -> Result<()> {
    let config = settings.load()?;
    config.validate()?;

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request: {}", path.display()))?;
    let request: TestRequest = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse request: {}", path.display()))?;

    let options = RunOptions {
        inject_program_id: !no_inject,
    };

    match anchor_harness::run(&config, &request, options) {
        Ok(outcome) => {
            if json {
                let output = Output::Success {
                    program_id: outcome.program_id.as_deref(),
                    test_results: &outcome.report,
                };
                println!("{}", serde_json::to_string(&output)?);
            } else {
                println!("✅ {} built and tested", outcome.project);
                if let Some(program_id) = &outcome.program_id {
                    println!("🔑 Program id: {}", program_id);
                }
                println!("⏱️  Took {:.2}s", outcome.duration.as_secs_f64());
                print_report(&outcome.report);
            }
            Ok(())
        }
        Err(error) => {
            if json {
                let output = Output::Error {
                    error_type: error_type(&error),
                    message: error.to_string(),
                    test_results: match &error {
                        HarnessError::TestFailed { report, .. } => Some(&**report),
                        _ => None,
                    },
                };
                println!("{}", serde_json::to_string(&output)?);
            } else {
                match &error {
                    HarnessError::BuildFailed { output, .. } => println!("{}", output),
                    HarnessError::TestFailed { report, .. } => print_report(report),
                    _ => {}
                }
            }
            Err(error.into())
        }
    }
}

fn run_parse(path: &Path, json: bool) -> Result<()> {
    let log = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read log from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read log: {}", path.display()))?
    };

    let report = parse_test_log(&log);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &TestReport) {
    print!("{}", render_report(report));
}

fn render_report(report: &TestReport) -> String {
    let summary = &report.summary;
    let mut out = format!(
        "📋 {} passing, {} failing ({} total) {}\n",
        summary.passed, summary.failed, summary.total, summary.duration
    );

    for test in &report.tests {
        let marker = if test.passed { "✅" } else { "❌" };
        out.push_str(&format!("   {} {}\n", marker, qualified_name(test)));
    }

    for (index, test) in report.failures().enumerate() {
        out.push_str(&format!("\n   {}) {}\n", index + 1, qualified_name(test)));
        for line in test.error.lines() {
            out.push_str(&format!("      {}\n", line.trim_start()));
        }
    }

    out
}

fn qualified_name(test: &TestCase) -> String {
    if test.suite.is_empty() {
        test.name.clone()
    } else {
        format!("{} › {}", test.suite, test.name)
    }
}

fn error_type(error: &HarnessError) -> &'static str {
    match error {
        HarnessError::InvalidRequest(_) => "invalid_request",
        HarnessError::Io { .. } => "io_error",
        HarnessError::Manifest(_) => "manifest_error",
        HarnessError::Launch { .. } => "toolchain_unavailable",
        HarnessError::BuildFailed { .. } => "build_failed",
        HarnessError::TestFailed { .. } => "tests_failed",
    }
}
