use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// How a selected review is walked through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    /// Interactive hunk walk in the terminal.
    Quick,
    /// Open the user's editor on head vs base, post the edits back.
    Diff,
    /// Check the head revision out and edit the files in place.
    Checkout,
}

impl std::str::FromStr for ReviewMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "quick" => Ok(ReviewMode::Quick),
            "diff" => Ok(ReviewMode::Diff),
            "checkout" => Ok(ReviewMode::Checkout),
            other => anyhow::bail!("unknown review mode: {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Editor command; resolved as config → $VISUAL → $EDITOR → vi.
    pub editor: Option<String>,
    /// Git remote the pull requests belong to.
    pub remote: String,
    pub mode: ReviewMode,
    /// Annotate the head file with existing discussion in diff mode.
    pub annotate: bool,
    /// Ask for confirmation before sending anything to the provider.
    pub preview: bool,
    pub context_before: usize,
    pub context_after: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            editor: None,
            remote: "origin".to_owned(),
            mode: ReviewMode::Quick,
            annotate: false,
            preview: false,
            context_before: 3,
            context_after: 3,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("qrev")
            .join("config.toml")
    }
}
