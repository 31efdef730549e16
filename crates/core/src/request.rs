//! Request body accepted by the build-and-test endpoints

use crate::{
    error::{HarnessError, Result},
    workspace,
};
use serde::{Deserialize, Serialize};

/// A `[path, contents]` pair, serialized as a two-element JSON array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile(pub String, pub String);

impl SourceFile {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self(path.into(), contents.into())
    }

    /// Path relative to the directory the file is written into
    pub fn path(&self) -> &str {
        &self.0
    }

    pub fn contents(&self) -> &str {
        &self.1
    }
}

/// Files making up one Anchor program and its TypeScript tests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequest {
    /// Program name, used for `programs/<name>` and `anchor build -p <name>`
    pub project_name: String,

    /// Written under `programs/<name>/`
    #[serde(default)]
    pub program_files: Vec<SourceFile>,

    /// Written under `tests/`
    #[serde(default)]
    pub test_files: Vec<SourceFile>,

    /// Program-level config such as `Cargo.toml` or `Xargo.toml`, written under `programs/<name>/`
    #[serde(default)]
    pub config_files: Vec<SourceFile>,
}

impl TestRequest {
    /// Rejects names and paths that would escape the workspace
    pub fn validate(&self) -> Result<()> {
        validate_project_name(&self.project_name)?;

        for file in self
            .program_files
            .iter()
            .chain(&self.test_files)
            .chain(&self.config_files)
        {
            workspace::checked_relative_path(file.path())?;
        }

        Ok(())
    }
}

/// Project names end up in paths, in `Anchor.toml` keys and on the anchor command line
pub fn validate_project_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(HarnessError::InvalidRequest(
            "projectName is required".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(HarnessError::InvalidRequest(format!(
            "Invalid projectName '{}': only ASCII letters, digits, '_' and '-' are allowed",
            name
        )));
    }

    Ok(())
}
