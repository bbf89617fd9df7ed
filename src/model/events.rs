//! Change notifications queued by the model

use std::collections::BTreeMap;

/// Caller-supplied metadata merged into notifications
pub type EventData = BTreeMap<String, String>;

/// A value write, or a repeat instance being added or removed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataUpdate {
    /// Names of the changed nodes; `None` for repeat bookkeeping updates
    pub nodes: Option<Vec<String>>,
    pub repeat_path: Option<String>,
    pub repeat_index: Option<usize>,
    /// Set on the update for a node that was just removed
    pub removed: bool,
    /// Outcome of continuous validation, when it ran
    pub validity: Option<bool>,
    pub extra: EventData,
}

/// Fired once per `remove` call, after its data updates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemovedEvent {
    pub repeat_path: Option<String>,
    pub repeat_index: Option<usize>,
    pub extra: EventData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    DataUpdate(DataUpdate),
    Removed(RemovedEvent),
}

impl ModelEvent {
    pub fn as_data_update(&self) -> Option<&DataUpdate> {
        match self {
            ModelEvent::DataUpdate(update) => Some(update),
            ModelEvent::Removed(_) => None,
        }
    }
}
