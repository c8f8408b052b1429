use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of one modal session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalState {
    /// Just opened, fields populated.
    Idle,
    /// The user has changed something.
    Editing,
    /// Persisting because the user clicked outside the modal.
    SavingAuto,
    /// Persisting because the user pressed Save.
    SavingManual,
    Deleting,
    ClosingWithoutSaving,
    Closed,
}

/// The event that made the modal exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseTrigger {
    Button,
    Escape,
    OutsideClick,
    Programmatic,
}

impl CloseTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseTrigger::Button => "button",
            CloseTrigger::Escape => "escape",
            CloseTrigger::OutsideClick => "outside_click",
            CloseTrigger::Programmatic => "programmatic",
        }
    }
}

impl fmt::Display for CloseTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloseTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "button" => Ok(CloseTrigger::Button),
            "escape" => Ok(CloseTrigger::Escape),
            "outside_click" => Ok(CloseTrigger::OutsideClick),
            "programmatic" => Ok(CloseTrigger::Programmatic),
            other => Err(format!("unknown close trigger: {}", other)),
        }
    }
}

/// Close payload handed to the owning page when a session reaches `Closed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseResult {
    pub discarded: bool,
    pub trigger: CloseTrigger,
    pub bookmarkable_id: i64,
    /// Whether the owning content item should re-render its bookmark state.
    pub refresh_requested: bool,
}

impl CloseResult {
    /// A discard, an Escape press or the close button leave the post display
    /// stale, so those ask for a refresh. Saves update the host directly.
    pub fn new(discarded: bool, trigger: CloseTrigger, bookmarkable_id: i64) -> Self {
        let refresh_requested =
            discarded || matches!(trigger, CloseTrigger::Escape | CloseTrigger::Button);
        Self {
            discarded,
            trigger,
            bookmarkable_id,
            refresh_requested,
        }
    }
}

/// What a controller action ended up doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The session is closed; carries its close payload.
    Closed(CloseResult),
    /// The action failed and the modal remains open with a flash message.
    StayedOpen { flash: Option<String> },
    /// Suppressed by the re-entrancy guard, or the session was already closed.
    Ignored,
}

impl ActionOutcome {
    pub fn close_result(&self) -> Option<&CloseResult> {
        match self {
            ActionOutcome::Closed(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ActionOutcome::Closed(_))
    }
}

/// Per-open state of the modal. Discarded when the modal closes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModalSession {
    pub state: ModalState,
    pub saving: bool,
    pub deleting: bool,
    pub saving_manually: bool,
    pub close_without_saving: bool,
    pub flash: Option<String>,
    pub reminder_date: Option<NaiveDate>,
    pub reminder_time: Option<NaiveTime>,
    pub prefilled_datetime: Option<DateTime<Utc>>,
    pub show_options: bool,
    pub close_result: Option<CloseResult>,
}

impl ModalSession {
    pub fn new(show_options: bool) -> Self {
        Self {
            state: ModalState::Idle,
            saving: false,
            deleting: false,
            saving_manually: false,
            close_without_saving: false,
            flash: None,
            reminder_date: None,
            reminder_time: None,
            prefilled_datetime: None,
            show_options,
            close_result: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == ModalState::Closed
    }

    /// True while a save or delete call is outstanding.
    pub fn is_busy(&self) -> bool {
        self.saving || self.deleting
    }
}
