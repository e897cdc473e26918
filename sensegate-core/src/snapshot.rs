//! Snapshot rendering for the read path
//!
//! Turns a point-in-time copy of the state map into the response mapping,
//! optionally relabeling device serials and ordering entries newest-first.
//! Labels are display-only; merge logic never sees them.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::state::CurrentState;

/// Static display labels for device serials
#[derive(Debug, Clone, Default)]
pub struct DeviceLabelMap {
    labels: HashMap<String, String>,
}

impl DeviceLabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, serial: impl Into<String>, label: impl Into<String>) {
        self.labels.insert(serial.into(), label.into());
    }

    pub fn label_for(&self, serial: &str) -> Option<&str> {
        self.labels.get(serial).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<(String, String)> for DeviceLabelMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

/// Render the state map for serialization.
///
/// Serials present in the label table are replaced by their label; others
/// pass through unchanged. With `sort_by_recency` the entries are ordered
/// by timestamp descending, and the returned map keeps that order.
pub fn render(
    states: HashMap<String, CurrentState>,
    labels: &DeviceLabelMap,
    sort_by_recency: bool,
) -> IndexMap<String, CurrentState> {
    let mut entries: Vec<(String, CurrentState)> = states.into_iter().collect();
    if sort_by_recency {
        entries.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp));
    }

    entries
        .into_iter()
        .map(|(serial, state)| {
            let key = match labels.label_for(&serial) {
                Some(label) => label.to_string(),
                None => serial,
            };
            (key, state)
        })
        .collect()
}
