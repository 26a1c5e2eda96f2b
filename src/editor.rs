//! Editor resolution and launching.

use anyhow::Result;
use std::env;
use std::path::Path;
use std::process::Command;

/// Check whether a command can be found in PATH and is executable.
fn command_found_in_path(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Generate editor candidates in priority order.
/// Resolution order (same as git): config → $VISUAL → $EDITOR → vi
fn editor_candidates(configured: Option<&str>) -> Vec<String> {
    [
        configured
            .filter(|s| !s.trim().is_empty())
            .map(String::from),
        env::var("VISUAL").ok().filter(|s| !s.trim().is_empty()),
        env::var("EDITOR").ok().filter(|s| !s.trim().is_empty()),
        Some("vi".to_string()),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Resolve the editor command and split it into program + arguments.
///
/// Each candidate is checked for PATH availability; a missing one falls
/// through to the next. Quoted arguments (e.g. `code --wait`) are handled
/// by `shell_words::split`.
fn resolve_and_split(configured: Option<&str>) -> Result<(String, Vec<String>)> {
    let candidates = editor_candidates(configured);
    let mut first_parsed: Option<(String, Vec<String>)> = None;

    for raw in &candidates {
        let parts = shell_words::split(raw)?;
        let Some(cmd) = parts.first() else { continue };
        let parsed = (cmd.clone(), parts[1..].to_vec());

        if first_parsed.is_none() {
            first_parsed = Some(parsed.clone());
        }
        if command_found_in_path(cmd) {
            return Ok(parsed);
        }
        tracing::warn!("editor candidate {cmd:?} not found in PATH, falling back");
    }

    // Nothing found in PATH; return the first candidate so execution
    // produces a NotFound error with its name in it.
    Ok(first_parsed.unwrap_or_else(|| ("vi".to_string(), vec![])))
}

fn run(cmd: &str, mut command: Command) -> Result<()> {
    let status = command.status().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!(
                "Editor '{}' not found (also checked $VISUAL and $EDITOR). \
                 Set 'editor' in ~/.config/qrev/config.toml to an installed editor.",
                cmd
            )
        } else {
            anyhow::anyhow!("Failed to launch editor '{}': {}", cmd, e)
        }
    })?;
    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }
    Ok(())
}

/// Open the editor on the writable head copy next to the read-only base.
/// With no configured editor this defaults to `vimdiff`.
pub fn open_diff(configured: Option<&str>, head: &Path, base: &Path) -> Result<()> {
    let configured = configured.or(Some("vimdiff"));
    let (cmd, args) = resolve_and_split(configured)?;
    tracing::debug!("launching {cmd} on {} / {}", head.display(), base.display());
    let mut command = Command::new(&cmd);
    command.args(&args).arg(head).arg(base);
    run(&cmd, command)
}

/// Open the editor at a specific file and line, `$EDITOR +<line> <file>`.
pub fn open_file_at_line(configured: Option<&str>, file: &Path, line: usize) -> Result<()> {
    let (cmd, args) = resolve_and_split(configured)?;
    tracing::debug!("launching {cmd} on {}:{line}", file.display());
    let mut command = Command::new(&cmd);
    command.args(&args).arg(format!("+{line}")).arg(file);
    run(&cmd, command)
}
