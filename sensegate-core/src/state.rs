//! Latest-state store with last-writer-wins merge
//!
//! Holds exactly one record per device. A merge either replaces the whole
//! record or does nothing; readers always get a consistent point-in-time
//! copy of the map.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// A measurement value from the batch gateway protocol.
///
/// The wire carries either a bare string or a bare number; the variant tag
/// exists only on the Rust side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Text(String),
    Number(f64),
}

/// The measurement set carried by one reading
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    /// Climate channels from the query-parameter webhook form.
    /// A channel the firmware did not sample stays `None` and is rendered
    /// as `null` in snapshots.
    Climate {
        temperature: Option<i64>,
        humidity: Option<i64>,
        pressure: Option<i64>,
    },
    /// Single generic value from the batch protocol
    Value { value: MeasurementValue },
}

/// One normalized inbound reading, produced by a protocol decoder
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub device_id: String,
    pub event_time: DateTime<Utc>,
    pub reading: Reading,
}

/// The latest known reading for one device.
///
/// Replaced wholesale by a merge or left untouched, never partially
/// updated. The timestamp serializes as an RFC 3339 UTC string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentState {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub reading: Reading,
}

impl From<SensorEvent> for CurrentState {
    fn from(event: SensorEvent) -> Self {
        Self {
            timestamp: event.event_time,
            reading: event.reading,
        }
    }
}

/// Shared latest-state map, keyed by device serial.
///
/// Constructed empty at startup and injected into handlers; entries are
/// never removed. The lock makes the read-compare-write in `merge` atomic
/// with respect to concurrent callers.
#[derive(Debug, Default)]
pub struct StateStore {
    inner: RwLock<HashMap<String, CurrentState>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last-writer-wins merge for one device.
    ///
    /// Replaces the stored record only when the incoming timestamp is
    /// strictly newer; ties keep the first-seen record. Stale and duplicate
    /// events from retrying gateways are dropped silently.
    pub async fn merge(&self, device_id: &str, state: CurrentState) {
        let mut map = self.inner.write().await;
        let replace = map
            .get(device_id)
            .map_or(true, |last| state.timestamp > last.timestamp);
        if replace {
            map.insert(device_id.to_string(), state);
        }
    }

    /// Merge one normalized event
    pub async fn merge_event(&self, event: SensorEvent) {
        let device_id = event.device_id.clone();
        self.merge(&device_id, event.into()).await;
    }

    /// Latest record for one device
    pub async fn get(&self, device_id: &str) -> Option<CurrentState> {
        self.inner.read().await.get(device_id).cloned()
    }

    /// Point-in-time copy of the whole map
    pub async fn snapshot(&self) -> HashMap<String, CurrentState> {
        self.inner.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
