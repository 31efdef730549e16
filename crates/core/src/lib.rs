//! Build-and-test harness for Anchor programs
//!
//! Materializes submitted program and test files into a scaffolded Anchor
//! workspace, injects a freshly generated program id, runs `anchor build` and
//! `anchor test`, and parses mocha's console output into a [`TestReport`].
pub mod config;
pub mod error;
pub mod keypair;
pub mod manifest;
pub mod report;
pub mod request;
mod runner;
pub mod toolchain;
mod utils;
pub mod workspace;

pub use config::{HarnessConfig, HarnessConfigBuilder};
pub use error::{HarnessError, Result};
pub use keypair::ProgramKeypair;
pub use report::{parse_test_log, RunSummary, TestCase, TestReport};
pub use request::{SourceFile, TestRequest};
pub use runner::{run, RunOptions, RunOutcome};
pub use utils::hash_source_tree;
