//! `calltrace diff-state`: compare two state dumps with an external script
//!
//! The comparison itself lives in `jsondiff.py`; this module only finds the
//! script, runs it on the two dump files and passes its exit code through.
//! It never decodes traces.

use crate::config::ToolConfig;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Name of the comparison script
pub const DIFF_SCRIPT: &str = "jsondiff.py";

/// Environment variable naming a directory of helper scripts
pub const SCRIPTS_ENV: &str = "CALLTRACE_SCRIPTS";

/// Candidate locations for `name`, most specific first
pub fn script_candidates(name: &str, config: &ToolConfig) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = std::env::var_os(SCRIPTS_ENV).filter(|d| !d.is_empty()) {
        candidates.push(PathBuf::from(dir).join(name));
    }
    if let Some(dir) = &config.scripts_dir {
        candidates.push(dir.join(name));
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(exe_dir.join("..").join("lib").join("calltrace").join("scripts").join(name));
        candidates.push(exe_dir.join("scripts").join(name));
    }
    candidates
}

/// Locate a helper script, preferring an explicit path
pub fn find_script(name: &str, explicit: Option<&Path>, config: &ToolConfig) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        bail!("script not found: {}", path.display());
    }

    let candidates = script_candidates(name, config);
    for candidate in &candidates {
        tracing::debug!(candidate = %candidate.display(), "looking for script");
        if candidate.is_file() {
            return Ok(candidate.clone());
        }
    }
    bail!(
        "could not find {} (searched: {})",
        name,
        candidates
            .iter()
            .map(|c| c.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
}

/// Run the comparison script on two state dumps and return its exit code
///
/// The script inherits stdout and stderr, so its report goes straight to
/// the user.
pub fn diff_state(
    state1: &Path,
    state2: &Path,
    script: Option<&Path>,
    config: &ToolConfig,
) -> Result<i32> {
    let script = find_script(DIFF_SCRIPT, script, config)?;
    tracing::debug!(script = %script.display(), python = %config.python, "running state diff");

    let status = Command::new(&config.python)
        .arg(&script)
        .arg(state1)
        .arg(state2)
        .status()
        .with_context(|| format!("failed to run {} {}", config.python, script.display()))?;

    // Killed by a signal: report failure
    Ok(status.code().unwrap_or(1))
}
