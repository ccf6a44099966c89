//! `spectromesh config`: edit the configuration file, then check it.

use anyhow::{anyhow, bail, Result};
use std::process::Command;

use crate::config::{get_config_path, VisualizerConfig};

/// Editors tried, in order, when `$EDITOR` is unset.
const FALLBACK_EDITORS: [&str; 2] = ["nano", "vi"];

/// Opens the config file in an editor and validates the result.
///
/// A missing file is created with defaults first. An invalid edit is
/// reported as a warning so the user can fix it before the next run.
///
/// # Errors
/// - If no editor can be found or it fails to run
/// - If the editor exits unsuccessfully
pub fn handle_config() -> Result<()> {
    let config_path = get_config_path()?;
    if !config_path.exists() {
        VisualizerConfig::default().save()?;
    }

    let editor = pick_editor(std::env::var("EDITOR").ok(), is_on_path)
        .ok_or_else(|| anyhow!("No editor found. Set the $EDITOR environment variable."))?;
    tracing::info!("Editing {} with {}", config_path.display(), editor);

    let status = Command::new(&editor)
        .arg(&config_path)
        .status()
        .map_err(|e| anyhow!("Failed to run editor '{editor}': {e}"))?;
    if !status.success() {
        bail!("Editor exited with status {}", status.code().unwrap_or(-1));
    }

    match VisualizerConfig::load().and_then(|config| config.validate()) {
        Ok(()) => tracing::info!("Configuration is valid"),
        Err(e) => {
            tracing::warn!("Edited config is invalid: {e}");
            eprintln!("Warning: {e}");
        }
    }
    Ok(())
}

/// `$EDITOR` when set and non-empty, otherwise the first available fallback.
fn pick_editor(env_editor: Option<String>, available: impl Fn(&str) -> bool) -> Option<String> {
    env_editor
        .filter(|editor| !editor.trim().is_empty())
        .or_else(|| {
            FALLBACK_EDITORS
                .into_iter()
                .find(|editor| available(editor))
                .map(str::to_string)
        })
}

fn is_on_path(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .output()
        .is_ok_and(|output| output.status.success())
}
