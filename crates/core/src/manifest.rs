//! Program id injection into `Anchor.toml` and `declare_id!`
//!
//! Both files are patched textually so user formatting and comments survive.
//! The patched manifest is re-parsed with `toml` before it is written back.

use crate::{
    config::HarnessConfig,
    error::{HarnessError, Result},
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

lazy_static! {
    static ref DECLARE_ID_RE: Regex = Regex::new(r#"declare_id!\s*\(\s*"[^"]*"\s*\)"#)
        .expect("Failed to compile DECLARE_ID_RE regex");
}

/// Writes `program_id` into the workspace manifest and the program's entry point
pub fn inject_program_id(config: &HarnessConfig, project: &str, program_id: &str) -> Result<()> {
    let manifest_path = config.manifest_path();
    let manifest = std::fs::read_to_string(&manifest_path)
        .map_err(HarnessError::io("Failed to read", &manifest_path))?;

    let patched = upsert_program_entry(&manifest, &config.cluster, project, program_id)?;
    std::fs::write(&manifest_path, patched)
        .map_err(HarnessError::io("Failed to write", &manifest_path))?;
    info!(
        "Set {} = \"{}\" in [programs.{}]",
        project, program_id, config.cluster
    );

    let entry_point = config.entry_point(project);
    let source = std::fs::read_to_string(&entry_point)
        .map_err(HarnessError::io("Failed to read", &entry_point))?;

    match replace_declare_id(&source, program_id) {
        Some(updated) => {
            std::fs::write(&entry_point, updated)
                .map_err(HarnessError::io("Failed to write", &entry_point))?;
            info!("Updated declare_id! in {}", entry_point.display());
        }
        None => warn!(
            "No declare_id! found in {}, program id left unchanged",
            entry_point.display()
        ),
    }

    Ok(())
}

/// Sets `<program> = "<program_id>"` in `[programs.<cluster>]`
///
/// An existing entry is rewritten in place. Otherwise the entry goes after the
/// last key of the section, and a missing section is appended to the file.
pub fn upsert_program_entry(
    manifest: &str,
    cluster: &str,
    program: &str,
    program_id: &str,
) -> Result<String> {
    let header = format!("[programs.{}]", cluster);
    let entry = format!("{} = \"{}\"", program, program_id);

    let mut lines: Vec<String> = manifest.lines().map(str::to_string).collect();

    match lines.iter().position(|line| line.trim() == header) {
        Some(start) => {
            let end = lines[start + 1..]
                .iter()
                .position(|line| line.trim_start().starts_with('['))
                .map_or(lines.len(), |offset| start + 1 + offset);

            let existing = (start + 1..end).find(|&i| entry_key(&lines[i]) == Some(program));
            match existing {
                Some(i) => lines[i] = entry,
                None => {
                    let last_key = (start + 1..end)
                        .rev()
                        .find(|&i| entry_key(&lines[i]).is_some())
                        .unwrap_or(start);
                    lines.insert(last_key + 1, entry);
                }
            }
        }
        None => {
            if lines.last().is_some_and(|line| !line.trim().is_empty()) {
                lines.push(String::new());
            }
            lines.push(header);
            lines.push(entry);
        }
    }

    let mut patched = lines.join("\n");
    patched.push('\n');

    verify_entry(&patched, cluster, program, program_id)?;
    Ok(patched)
}

/// Rewrites every `declare_id!("...")`, or returns `None` when there is none
pub fn replace_declare_id(source: &str, program_id: &str) -> Option<String> {
    if !DECLARE_ID_RE.is_match(source) {
        return None;
    }

    let replacement = format!("declare_id!(\"{}\")", program_id);
    Some(
        DECLARE_ID_RE
            .replace_all(source, regex::NoExpand(&replacement))
            .into_owned(),
    )
}

/// Key of a `key = value` line, with surrounding quotes removed
fn entry_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }
    let (key, _) = trimmed.split_once('=')?;
    Some(key.trim().trim_matches('"'))
}

fn verify_entry(manifest: &str, cluster: &str, program: &str, program_id: &str) -> Result<()> {
    let parsed: toml::Table =
        toml::from_str(manifest).map_err(|e| HarnessError::Manifest(e.to_string()))?;

    let value = parsed
        .get("programs")
        .and_then(|programs| programs.get(cluster))
        .and_then(|section| section.get(program))
        .and_then(|value| value.as_str());

    if value != Some(program_id) {
        return Err(HarnessError::Manifest(format!(
            "entry for '{}' missing from [programs.{}] after update",
            program, cluster
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ANCHOR_TOML: &str = r#"[toolchain]

[features]
seeds = false
skip-lint = false

[programs.localnet]
counter = "Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS"

[registry]
url = "https://api.apr.dev"

[provider]
cluster = "Localnet"
wallet = "~/.config/solana/id.json"
"#;

    const NEW_ID: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

    #[test]
    fn test_existing_entry_is_rewritten() {
        let patched = upsert_program_entry(ANCHOR_TOML, "localnet", "counter", NEW_ID).unwrap();

        assert!(patched.contains(&format!("counter = \"{}\"", NEW_ID)));
        assert!(!patched.contains("Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS"));
        assert!(patched.contains("[registry]"));
    }

    #[test]
    fn test_new_entry_follows_existing_keys() {
        let patched = upsert_program_entry(ANCHOR_TOML, "localnet", "vault", NEW_ID).unwrap();

        let lines: Vec<&str> = patched.lines().collect();
        let counter = lines.iter().position(|l| l.starts_with("counter =")).unwrap();
        assert_eq!(lines[counter + 1], format!("vault = \"{}\"", NEW_ID));
        assert_eq!(lines[counter + 2], "");
        assert_eq!(lines[counter + 3], "[registry]");
    }

    #[test]
    fn test_missing_section_is_appended() {
        let manifest = "[provider]\ncluster = \"Localnet\"\n";
        let patched = upsert_program_entry(manifest, "localnet", "vault", NEW_ID).unwrap();

        assert_eq!(
            patched,
            format!(
                "[provider]\ncluster = \"Localnet\"\n\n[programs.localnet]\nvault = \"{}\"\n",
                NEW_ID
            )
        );
    }

    #[test]
    fn test_other_clusters_untouched() {
        let manifest = "[programs.devnet]\nvault = \"old\"\n\n[programs.localnet]\n";
        let patched = upsert_program_entry(manifest, "localnet", "vault", NEW_ID).unwrap();

        assert!(patched.contains("[programs.devnet]\nvault = \"old\""));
        assert!(patched.contains(&format!("[programs.localnet]\nvault = \"{}\"", NEW_ID)));
    }

    #[test]
    fn test_invalid_manifest_is_rejected() {
        let err = upsert_program_entry("[programs.localnet\n", "localnet", "vault", NEW_ID)
            .unwrap_err();
        assert!(matches!(err, HarnessError::Manifest(_)));
    }

    #[test]
    fn test_replace_declare_id() {
        let source = r#"use anchor_lang::prelude::*;

declare_id!( "Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS" );

#[program]
pub mod counter {}
"#;
        let updated = replace_declare_id(source, NEW_ID).unwrap();

        assert!(updated.contains(&format!("declare_id!(\"{}\");", NEW_ID)));
        assert!(updated.contains("pub mod counter {}"));
    }

    #[test]
    fn test_replace_declare_id_absent() {
        assert!(replace_declare_id("pub fn main() {}", NEW_ID).is_none());
    }

    #[test]
    fn test_inject_program_id() {
        let temp_dir = TempDir::new().unwrap();
        let config = HarnessConfig::builder()
            .workspace_root(temp_dir.path().to_path_buf())
            .build()
            .unwrap();

        fs::write(config.manifest_path(), ANCHOR_TOML).unwrap();
        let entry_point = config.entry_point("counter");
        fs::create_dir_all(entry_point.parent().unwrap()).unwrap();
        fs::write(&entry_point, "declare_id!(\"old\");\n").unwrap();

        inject_program_id(&config, "counter", NEW_ID).unwrap();

        assert!(fs::read_to_string(config.manifest_path())
            .unwrap()
            .contains(&format!("counter = \"{}\"", NEW_ID)));
        assert_eq!(
            fs::read_to_string(&entry_point).unwrap(),
            format!("declare_id!(\"{}\");\n", NEW_ID)
        );
    }

    #[test]
    fn test_inject_requires_entry_point() {
        let temp_dir = TempDir::new().unwrap();
        let config = HarnessConfig::builder()
            .workspace_root(temp_dir.path().to_path_buf())
            .build()
            .unwrap();
        fs::write(config.manifest_path(), ANCHOR_TOML).unwrap();

        let err = inject_program_id(&config, "counter", NEW_ID).unwrap_err();
        assert!(matches!(err, HarnessError::Io { .. }));
    }
}
