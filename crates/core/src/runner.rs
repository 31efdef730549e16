//! End-to-end pipeline: materialize, inject program id, build, test, parse

use crate::{
    config::HarnessConfig,
    error::{HarnessError, Result},
    keypair::ProgramKeypair,
    manifest,
    report::{self, TestReport},
    request::TestRequest,
    toolchain::Anchor,
    utils, workspace,
};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Per-run switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Generate a keypair and write its id into `Anchor.toml` and `declare_id!`
    pub inject_program_id: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            inject_program_id: true,
        }
    }
}

/// Result of a run whose tests all passed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub project: String,
    /// Injected program id, `None` when injection was disabled
    pub program_id: Option<String>,
    /// Number of program, config and test files written
    pub files_written: usize,
    /// Hash of the materialized program directory
    pub source_hash: String,
    pub report: TestReport,
    #[serde(skip)]
    pub duration: Duration,
}

/// Builds and tests the request's program inside the configured workspace
///
/// Callers sharing one workspace must serialize calls; every run rewrites
/// `Anchor.toml` and the program's files in place.
pub fn run(config: &HarnessConfig, request: &TestRequest, options: RunOptions) -> Result<RunOutcome> {
    let start = Instant::now();
    let project = request.project_name.as_str();

    request.validate()?;

    tracing::info!(
        "Starting run for {} in {}",
        project,
        config.workspace_root.display()
    );

    let files = workspace::materialize(config, request)?;
    tracing::debug!("Materialized {} files for {}", files.written.len(), project);

    let program_id = if options.inject_program_id {
        let keypair = ProgramKeypair::generate();
        keypair.write(&config.keypair_path(project))?;

        let program_id = keypair.program_id();
        manifest::inject_program_id(config, project, &program_id)?;
        tracing::info!("Program id for {}: {}", project, program_id);
        Some(program_id)
    } else {
        None
    };

    let source_hash = utils::hash_source_tree(&files.program_dir);
    tracing::debug!("Source hash for {}: {}", project, source_hash);

    let anchor = Anchor::new(config);

    let build = anchor.build(project)?;
    if !build.success() {
        tracing::warn!("anchor build failed for {}: {}", project, build.status_text());
        return Err(HarnessError::BuildFailed {
            status: build.status_text(),
            output: build.output,
        });
    }
    tracing::info!("Build succeeded for {}", project);

    let test = anchor.test(project)?;
    let report = report::parse_test_log(&test.output);
    tracing::info!(
        "Tests for {}: {} passing, {} failing",
        project,
        report.summary.passed,
        report.summary.failed
    );

    if !test.success() {
        return Err(HarnessError::TestFailed {
            status: test.status_text(),
            report: Box::new(report),
        });
    }

    let duration = start.elapsed();
    tracing::info!("Run completed in {:.2}s", duration.as_secs_f64());

    Ok(RunOutcome {
        project: project.to_string(),
        program_id,
        files_written: files.written.len(),
        source_hash,
        report,
        duration,
    })
}
