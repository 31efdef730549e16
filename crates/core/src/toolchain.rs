//! Invocation of the anchor CLI

use crate::{
    config::HarnessConfig,
    error::{HarnessError, Result},
};
use std::{
    path::Path,
    process::{Command, ExitStatus},
};

/// Captured result of one anchor invocation
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    /// All of stdout followed by all of stderr; the streams are captured
    /// separately, so their relative timing is not preserved
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit status as shown in error responses, e.g. `exit status: 1`
    pub fn status_text(&self) -> String {
        self.status.to_string()
    }
}

/// Runs anchor subcommands inside the workspace
#[derive(Debug, Clone, Copy)]
pub struct Anchor<'a> {
    bin: &'a str,
    prefix_args: &'a [String],
    workspace: &'a Path,
}

impl<'a> Anchor<'a> {
    pub fn new(config: &'a HarnessConfig) -> Self {
        Self {
            bin: &config.anchor_bin,
            prefix_args: &config.anchor_args,
            workspace: &config.workspace_root,
        }
    }

    /// `anchor build -p <program>`
    pub fn build(&self, program: &str) -> Result<CommandOutput> {
        self.run(&["build", "-p", program])
    }

    /// `anchor test -p <program>`
    pub fn test(&self, program: &str) -> Result<CommandOutput> {
        self.run(&["test", "-p", program])
    }

    fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut cmd = Command::new(self.bin);
        cmd.current_dir(self.workspace)
            .args(self.prefix_args)
            .args(args);

        tracing::debug!("Running anchor command: {:?}", cmd);

        let output = cmd.output().map_err(|source| HarnessError::Launch {
            program: self.bin.to_string(),
            source,
        })?;

        // Stream order, not write order
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        tracing::debug!(
            "anchor {} finished with {} ({} bytes of output)",
            args.first().copied().unwrap_or_default(),
            output.status,
            combined.len()
        );

        Ok(CommandOutput {
            status: output.status,
            output: combined,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn shell_config(dir: &Path, script: &str) -> HarnessConfig {
        let script_path = dir.join("anchor.sh");
        std::fs::write(&script_path, script).unwrap();

        HarnessConfig::builder()
            .workspace_root(dir.to_path_buf())
            .anchor_bin("sh")
            .anchor_args(vec![script_path.display().to_string()])
            .build()
            .unwrap()
    }

    #[test]
    fn test_arguments_and_working_directory() {
        let temp_dir = TempDir::new().unwrap();
        let config = shell_config(temp_dir.path(), "echo \"$@\"\npwd\n");

        let output = Anchor::new(&config).build("counter").unwrap();

        assert!(output.success());
        let mut lines = output.output.lines();
        assert_eq!(lines.next(), Some("build -p counter"));
        let cwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
        assert_eq!(cwd, std::fs::canonicalize(temp_dir.path()).unwrap());
    }

    #[test]
    fn test_stderr_follows_stdout() {
        let temp_dir = TempDir::new().unwrap();
        let config = shell_config(temp_dir.path(), "echo out\necho err >&2\nexit 3\n");

        let output = Anchor::new(&config).test("counter").unwrap();

        assert!(!output.success());
        assert_eq!(output.output, "out\nerr\n");
        assert!(output.status_text().contains('3'));
    }

    #[test]
    fn test_output_is_grouped_by_stream() {
        let temp_dir = TempDir::new().unwrap();
        let config = shell_config(
            temp_dir.path(),
            "echo first >&2\necho second\necho third >&2\n",
        );

        let output = Anchor::new(&config).build("counter").unwrap();

        assert!(output.success());
        assert_eq!(output.output, "second\nfirst\nthird\n");
    }

    #[test]
    fn test_missing_binary() {
        let temp_dir = TempDir::new().unwrap();
        let config = HarnessConfig::builder()
            .workspace_root(temp_dir.path().to_path_buf())
            .anchor_bin("definitely-not-an-anchor-binary")
            .build()
            .unwrap();

        let err = Anchor::new(&config).build("counter").unwrap_err();
        assert!(matches!(err, HarnessError::Launch { .. }));
    }
}
