//! Configuration for the Anchor workspace and toolchain

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

/// Main configuration for materializing and testing Anchor programs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Scaffolded Anchor workspace (contains `Anchor.toml`, `programs/`, `tests/`)
    pub workspace_root: PathBuf,

    /// Program used to invoke anchor
    pub anchor_bin: String,

    /// Arguments placed before the anchor subcommand, e.g. `["run", "anchor"]`
    /// when anchor is launched through a wrapper
    pub anchor_args: Vec<String>,

    /// Cluster whose `[programs.<cluster>]` table receives the program id
    pub cluster: String,

    /// Address the HTTP server listens on
    pub bind_addr: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("anchor-workspace"),
            anchor_bin: "anchor".to_string(),
            anchor_args: vec![],
            cluster: "localnet".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Loads configuration from a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the entire configuration
    pub fn validate(&self) -> Result<()> {
        if self.anchor_bin.trim().is_empty() {
            return Err(eyre::eyre!("anchor_bin must not be empty"));
        }

        if self.cluster.is_empty()
            || !self
                .cluster
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(eyre::eyre!("Invalid cluster name: '{}'", self.cluster));
        }

        self.bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid bind address: {}", self.bind_addr))?;

        Ok(())
    }

    /// `programs/<project>` inside the workspace
    pub fn program_dir(&self, project: &str) -> PathBuf {
        self.workspace_root.join("programs").join(project)
    }

    /// Entry point whose `declare_id!` receives the program id
    pub fn entry_point(&self, project: &str) -> PathBuf {
        self.program_dir(project).join("src").join("lib.rs")
    }

    pub fn tests_dir(&self) -> PathBuf {
        self.workspace_root.join("tests")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.workspace_root.join("Anchor.toml")
    }

    /// `target/deploy/<project>-keypair.json`, where anchor looks for the program keypair
    pub fn keypair_path(&self, project: &str) -> PathBuf {
        self.workspace_root
            .join("target")
            .join("deploy")
            .join(format!("{}-keypair.json", project))
    }

    /// Create a new builder for HarnessConfig
    pub fn builder() -> HarnessConfigBuilder {
        HarnessConfigBuilder::default()
    }
}

/// Builder for creating HarnessConfig with a fluent API
#[derive(Default)]
pub struct HarnessConfigBuilder {
    config: HarnessConfig,
}

impl HarnessConfigBuilder {
    pub fn workspace_root(mut self, path: PathBuf) -> Self {
        self.config.workspace_root = path;
        self
    }

    pub fn anchor_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.anchor_bin = bin.into();
        self
    }

    pub fn anchor_args(mut self, args: Vec<String>) -> Self {
        self.config.anchor_args = args;
        self
    }

    pub fn cluster(mut self, cluster: impl Into<String>) -> Self {
        self.config.cluster = cluster.into();
        self
    }

    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<HarnessConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.anchor_bin, "anchor");
        assert_eq!(config.cluster, "localnet");
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert!(config.workspace_root.ends_with("anchor-workspace"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_basic() {
        let config = HarnessConfig::builder()
            .workspace_root(PathBuf::from("/ws"))
            .anchor_bin("/usr/local/bin/anchor")
            .cluster("devnet")
            .bind_addr("127.0.0.1:8080")
            .build()
            .unwrap();

        assert_eq!(config.workspace_root, PathBuf::from("/ws"));
        assert_eq!(config.anchor_bin, "/usr/local/bin/anchor");
        assert_eq!(config.cluster, "devnet");
        assert_eq!(config.program_dir("counter"), PathBuf::from("/ws/programs/counter"));
        assert_eq!(
            config.entry_point("counter"),
            PathBuf::from("/ws/programs/counter/src/lib.rs")
        );
        assert_eq!(
            config.keypair_path("counter"),
            PathBuf::from("/ws/target/deploy/counter-keypair.json")
        );
        assert_eq!(config.manifest_path(), PathBuf::from("/ws/Anchor.toml"));
        assert_eq!(config.tests_dir(), PathBuf::from("/ws/tests"));
    }

    #[test]
    fn test_builder_rejects_invalid_values() {
        assert!(HarnessConfig::builder().bind_addr("not an address").build().is_err());
        assert!(HarnessConfig::builder().cluster("local net").build().is_err());
        assert!(HarnessConfig::builder().anchor_bin("  ").build().is_err());
    }

    #[test]
    fn test_from_file_partial() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("harness.toml");
        std::fs::write(
            &path,
            r#"
workspace_root = "/srv/anchor-workspace"
anchor_args = ["run", "anchor"]
anchor_bin = "avm"
"#,
        )
        .unwrap();

        let config = HarnessConfig::from_file(&path).unwrap();
        assert_eq!(config.workspace_root, PathBuf::from("/srv/anchor-workspace"));
        assert_eq!(config.anchor_bin, "avm");
        assert_eq!(config.anchor_args, vec!["run", "anchor"]);
        assert_eq!(config.cluster, "localnet");
    }

    #[test]
    fn test_from_file_missing() {
        let temp_dir = TempDir::new().unwrap();
        assert!(HarnessConfig::from_file(&temp_dir.path().join("missing.toml")).is_err());
    }
}
