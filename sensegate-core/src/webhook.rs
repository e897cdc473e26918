//! Query-parameter webhook decoding
//!
//! Simple gateway firmware pushes one event per GET call, encoded as URL
//! query parameters. An integer `Event` code selects the measurement
//! layout. Gateways also send heartbeat and other event types we do not
//! recognize; those must be acknowledged, not rejected, or the gateway
//! keeps retrying.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use crate::state::{Reading, SensorEvent};

/// Timestamp format sent by gateway firmware, always UTC
const EVENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Event-type codes understood by the webhook form
const EVENT_HUMIDITY_TEMPERATURE: i64 = 9;
const EVENT_PRESSURE: i64 = 12;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Missing required parameter: {0}")]
    MissingParam(&'static str),

    #[error("Invalid integer in {param}: {value:?}")]
    InvalidInt { param: &'static str, value: String },

    #[error("Invalid event timestamp: {0:?}")]
    InvalidTimestamp(String),
}

/// Outcome of decoding a webhook query
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookCall {
    /// A recognized reading to merge into the store
    Reading(SensorEvent),

    /// Heartbeat or unrecognized event type; acknowledged with success and
    /// no state change
    Acknowledged,
}

/// Decode the query-parameter webhook form.
///
/// Returns `Ok(None)` when no `Event` parameter is present at all, which
/// marks the call as a plain state query rather than a webhook push.
pub fn parse_webhook_query(
    params: &HashMap<String, String>,
) -> Result<Option<WebhookCall>, ParseError> {
    let Some(raw_type) = params.get("Event") else {
        return Ok(None);
    };
    let event_type: i64 = raw_type.parse().map_err(|_| ParseError::InvalidInt {
        param: "Event",
        value: raw_type.clone(),
    })?;

    // Required parameters are validated before dispatch, so a malformed
    // timestamp is rejected even on event types we ignore.
    let raw_time = required(params, "DT_Event")?;
    let event_time: DateTime<Utc> = NaiveDateTime::parse_from_str(raw_time, EVENT_TIME_FORMAT)
        .map_err(|_| ParseError::InvalidTimestamp(raw_time.to_string()))?
        .and_utc();
    let device_id = required(params, "DeviceSN")?.to_string();

    // Accepted but unused: APSN (access point serial), RF (field strength),
    // Flags, BaseSN, AssetSN, Unit, Decimals, and the deprecated
    // DeviceID/APID pair.

    let reading = match event_type {
        EVENT_HUMIDITY_TEMPERATURE => {
            let humidity = required_int(params, "Param1")?;
            let temperature = required_int(params, "Param2")?;
            // Firmware reports zero for a channel it did not sample
            Reading::Climate {
                temperature: (temperature != 0).then_some(temperature),
                humidity: (humidity != 0).then_some(humidity),
                pressure: None,
            }
        }
        EVENT_PRESSURE => Reading::Climate {
            temperature: None,
            humidity: None,
            pressure: Some(required_int(params, "Param2")?),
        },
        other => {
            tracing::info!(
                "Encountered unknown event type: {}. Provided data: Param1={:?}, Param2={:?}",
                other,
                params.get("Param1"),
                params.get("Param2")
            );
            return Ok(Some(WebhookCall::Acknowledged));
        }
    };

    Ok(Some(WebhookCall::Reading(SensorEvent {
        device_id,
        event_time,
        reading,
    })))
}

fn required<'a>(
    params: &'a HashMap<String, String>,
    name: &'static str,
) -> Result<&'a str, ParseError> {
    params
        .get(name)
        .map(String::as_str)
        .ok_or(ParseError::MissingParam(name))
}

fn required_int(params: &HashMap<String, String>, name: &'static str) -> Result<i64, ParseError> {
    let raw = required(params, name)?;
    raw.parse().map_err(|_| ParseError::InvalidInt {
        param: name,
        value: raw.to_string(),
    })
}
