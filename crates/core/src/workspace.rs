//! Writing submitted files into the Anchor workspace

use crate::{
    config::HarnessConfig,
    error::{HarnessError, Result},
    request::{SourceFile, TestRequest},
};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Locations touched while materializing a request
#[derive(Debug, Clone)]
pub struct MaterializedFiles {
    /// `programs/<project>` directory
    pub program_dir: PathBuf,
    /// Every file written, in request order
    pub written: Vec<PathBuf>,
}

/// Writes the request's program, config and test files into the workspace
///
/// Layout:
/// ```ignore
/// <workspace>/
///   programs/<project>/   program and config files
///   tests/                test files
/// ```
pub fn materialize(config: &HarnessConfig, request: &TestRequest) -> Result<MaterializedFiles> {
    let program_dir = config.program_dir(&request.project_name);
    let tests_dir = config.tests_dir();

    create_dir(&program_dir)?;
    create_dir(&tests_dir)?;

    let mut written = Vec::new();
    for file in request.program_files.iter().chain(&request.config_files) {
        written.push(write_source(&program_dir, file)?);
    }
    info!(
        "Program files written to {} ({} files)",
        program_dir.display(),
        written.len()
    );

    let program_count = written.len();
    for file in &request.test_files {
        written.push(write_source(&tests_dir, file)?);
    }
    info!(
        "Test files written to {} ({} files)",
        tests_dir.display(),
        written.len() - program_count
    );

    Ok(MaterializedFiles {
        program_dir,
        written,
    })
}

/// Writes one file below `base`, creating intermediate directories
pub fn write_source(base: &Path, file: &SourceFile) -> Result<PathBuf> {
    let path = base.join(checked_relative_path(file.path())?);

    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }

    std::fs::write(&path, file.contents()).map_err(HarnessError::io("Failed to write", &path))?;
    debug!("Wrote {}", path.display());

    Ok(path)
}

/// Accepts only relative paths that stay below the directory they are joined to
pub fn checked_relative_path(path: &str) -> Result<PathBuf> {
    let invalid = |reason: &str| {
        HarnessError::InvalidRequest(format!("Invalid file path '{}': {}", path, reason))
    };

    if path.trim().is_empty() {
        return Err(invalid("path is empty"));
    }

    let mut relative = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("'..' is not allowed")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("path must be relative"))
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(invalid("path does not name a file"));
    }

    Ok(relative)
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(HarnessError::io("Failed to create directory", path))
}
