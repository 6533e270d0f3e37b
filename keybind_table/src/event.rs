use serde::{Deserialize, Serialize};

use crate::trigger::Trigger;

/// The kind of transition a trigger went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Press,
    Repeat,
    Release,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Press => "press",
            EventKind::Repeat => "repeat",
            EventKind::Release => "release",
        }
    }
}

/// A raw transition as delivered by the input source, e.g. one entry of a
/// recorded input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    pub trigger: Trigger,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
}

impl InputEvent {
    pub fn new(trigger: Trigger, kind: EventKind) -> Self {
        InputEvent {
            trigger,
            kind,
            x: None,
            y: None,
        }
    }

    /// Pointer coordinates, present only when both axes were recorded.
    pub fn position(&self) -> Option<(i32, i32)> {
        Some((self.x?, self.y?))
    }
}

/// Payload handed to an action's handler when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEvent {
    pub trigger: Trigger,
    pub kind: EventKind,
    pub position: Option<(i32, i32)>,
    /// Instance that registered the action, if any.
    pub owner: Option<String>,
}
