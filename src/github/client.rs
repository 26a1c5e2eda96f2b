use anyhow::{Context, Result};
use std::process::Command;

/// Execute a `gh` CLI command and return stdout.
/// Uses spawn_blocking to avoid blocking the tokio runtime.
pub async fn gh_command(args: &[&str]) -> Result<String> {
    run_command("gh", args).await
}

/// Execute a `git` command and return stdout.
pub async fn git_command(args: &[&str]) -> Result<String> {
    run_command("git", args).await
}

async fn run_command(program: &'static str, args: &[&str]) -> Result<String> {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();

    tokio::task::spawn_blocking(move || {
        tracing::debug!("executing {program} {args:?}");
        let output = Command::new(program)
            .args(&args)
            .output()
            .with_context(|| format!("Failed to execute {program} - is it installed?"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{program} command failed: {}", stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    })
    .await
    .context("spawn_blocking task panicked")?
}

/// Execute `gh api` with JSON output.
pub async fn gh_api(endpoint: &str) -> Result<serde_json::Value> {
    let output = gh_command(&["api", endpoint]).await?;
    serde_json::from_str(&output).context("Failed to parse gh api response as JSON")
}

/// Field type for `gh api` POST requests.
pub enum FieldValue<'a> {
    /// String field (-f)
    String(&'a str),
    /// Raw/typed field (-F) - for integers, booleans, null
    Raw(&'a str),
}

/// Execute `gh api --method POST` with fields.
pub async fn gh_api_post(endpoint: &str, fields: &[(&str, FieldValue<'_>)]) -> Result<serde_json::Value> {
    let mut args = vec![
        "api".to_string(),
        "--method".to_string(),
        "POST".to_string(),
        endpoint.to_string(),
    ];
    for (key, value) in fields {
        match value {
            FieldValue::String(v) => {
                args.push("-f".to_string());
                args.push(format!("{}={}", key, v));
            }
            FieldValue::Raw(v) => {
                args.push("-F".to_string());
                args.push(format!("{}={}", key, v));
            }
        }
    }
    let args_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    let output = gh_command(&args_refs).await?;
    serde_json::from_str(&output).context("Failed to parse gh api response as JSON")
}

/// `owner/repo` derived from the URL of the named git remote.
pub async fn detect_repo(remote: &str) -> Result<String> {
    let url = git_command(&["config", "--get", &format!("remote.{remote}.url")])
        .await
        .with_context(|| format!("Failed to read the url of remote {remote:?}"))?;
    parse_remote_url(&url)
}

/// Extract `owner/repo` from a remote URL, in scp-like
/// (`git@github.com:owner/repo.git`) or scheme
/// (`https://github.com/owner/repo.git`) form.
fn parse_remote_url(url: &str) -> Result<String> {
    let url = url.trim().trim_end_matches('/');
    let path = if let Some((_, rest)) = url.split_once("://") {
        rest.split_once('/').map(|(_, path)| path)
    } else {
        url.split_once(':').map(|(_, path)| path)
    };
    let path = path.with_context(|| format!("unrecognized remote url {url:?}"))?;
    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);

    let mut segments = path.rsplitn(2, '/');
    let repo = segments.next().unwrap_or_default();
    let owner = segments
        .next()
        .and_then(|s| s.rsplit('/').next())
        .unwrap_or_default();
    if owner.is_empty() || repo.is_empty() {
        anyhow::bail!("remote url {url:?} has no owner/repo path");
    }
    Ok(format!("{owner}/{repo}"))
}


/// Contents of `path` at revision `rev`, via `git show`.
pub async fn git_show(rev: &str, path: &str) -> Result<String> {
    git_command(&["show", &format!("{rev}:{path}")]).await
}

/// Paths changed between two revisions.
pub async fn git_changed_files(base: &str, head: &str) -> Result<Vec<String>> {
    let out = git_command(&["diff", "--name-only", base, head]).await?;
    Ok(out.lines().map(str::to_owned).collect())
}
