//! Thin wrappers around the interactive prompts the controller needs:
//! list selection, confirmation, free-text input, and single-key reads for
//! the hunk loop.

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use dialoguer::{Confirm, Input, MultiSelect, Select};

pub fn select(prompt: &str, items: &[String]) -> Result<usize> {
    Select::new()
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact()
        .context("selection aborted")
}

pub fn multi_select(prompt: &str, items: &[String]) -> Result<Vec<usize>> {
    MultiSelect::new()
        .with_prompt(prompt)
        .items(items)
        .interact()
        .context("selection aborted")
}

pub fn confirm(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()
        .context("confirmation aborted")
}

pub fn input(prompt: &str) -> Result<String> {
    Input::<String>::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
        .context("input aborted")
}

/// A single key press at the hunk prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Interrupt,
}

struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Block until the user presses a key. Ctrl-C maps to [`Key::Interrupt`].
pub fn read_key() -> Result<Key> {
    let _raw = RawMode::enable()?;
    loop {
        match event::read().context("read terminal event")? {
            Event::Key(k) if k.kind != KeyEventKind::Release => match k.code {
                KeyCode::Char('c') if k.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(Key::Interrupt);
                }
                KeyCode::Char(c) => return Ok(Key::Char(c)),
                KeyCode::Esc => return Ok(Key::Char('q')),
                _ => {}
            },
            _ => {}
        }
    }
}

/// Current terminal width, with a sane fallback for pipes.
pub fn terminal_width() -> usize {
    terminal::size().map(|(w, _)| w as usize).unwrap_or(80)
}
