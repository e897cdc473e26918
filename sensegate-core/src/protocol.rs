//! Batch gateway protocol types
//!
//! The newer gateway protocol POSTs a JSON array of message envelopes.
//! Each envelope carries a correlation header and a payload list of
//! per-sensor readings. The whole body is decoded before anything is
//! merged; a structural mismatch rejects the batch as a unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::{MeasurementValue, Reading, SensorEvent};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Malformed batch payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One message envelope from a batch push
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub header: EnvelopeHeader,
    pub payload: Vec<BatchReading>,
}

/// Correlation data for logging; never used in state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    pub message_id: String,
}

/// One per-sensor reading inside an envelope payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReading {
    pub device_id: String,
    pub event_time: DateTime<Utc>,
    pub measurement: Measurement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub value: MeasurementValue,
}

/// Decode a raw batch body into normalized events.
pub fn decode_batch(body: &[u8]) -> Result<Vec<SensorEvent>, ValidationError> {
    let envelopes: Vec<Envelope> = serde_json::from_slice(body)?;

    let mut events = Vec::new();
    for envelope in envelopes {
        tracing::debug!(
            "Batch message {} carries {} readings",
            envelope.header.message_id,
            envelope.payload.len()
        );
        for reading in envelope.payload {
            events.push(SensorEvent {
                device_id: reading.device_id,
                event_time: reading.event_time,
                reading: Reading::Value {
                    value: reading.measurement.value,
                },
            });
        }
    }
    Ok(events)
}
