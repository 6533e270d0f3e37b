use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use keybind_table::{EventKind, Firing, InputEvent, Trigger};
use serde::Serialize;

pub fn load_events(path: &Path) -> Result<Vec<InputEvent>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading input events from {}", path.display()))?;
    parse_events(&text).with_context(|| format!("parsing input events from {}", path.display()))
}

pub fn parse_events(text: &str) -> Result<Vec<InputEvent>> {
    Ok(serde_json::from_str(text)?)
}

/// One handler invocation during replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiredAction {
    /// Index of the input event that fired it.
    pub event: usize,
    pub trigger: Trigger,
    pub kind: EventKind,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl FiredAction {
    pub fn from_firing<C>(event: usize, firing: &Firing<C>) -> Self {
        FiredAction {
            event,
            trigger: firing.event.trigger,
            kind: firing.event.kind,
            action: firing.label.clone(),
            owner: firing.event.owner.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EventLog {
    pub events_processed: usize,
    pub quit_requested: bool,
    pub restarts: usize,
    pub fired: Vec<FiredAction>,
    /// Lines passed to the script `log()` function.
    pub messages: Vec<String>,
}
