//! The service wraps every reply as `{ code, msg, data }`.
//!
//! `code == 0` means success and `data` holds an operation-specific payload.
//! Any other code is a failure described by `msg`, and `data` is ignored.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::ServiceInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ServiceInfo,
    Convert,
    Diff,
}

impl Operation {
    pub fn path(self) -> &'static str {
        match self {
            Operation::ServiceInfo => "service-info",
            Operation::Convert | Operation::Diff => "convert",
        }
    }
}

/// Decoded `data`, keyed by the operation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    ServiceInfo(ServiceInfo),
    Converted(String),
    Diff(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub code: i64,
    pub msg: String,
    /// Present exactly when `code == 0`.
    pub payload: Option<Payload>,
}

impl Envelope {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct ConvertData {
    text: String,
}

#[derive(Deserialize)]
struct DiffData {
    diff: String,
}

pub fn decode_envelope(operation: Operation, body: &[u8]) -> Result<Envelope, serde_json::Error> {
    let raw: RawEnvelope = serde_json::from_slice(body)?;
    let payload = if raw.code == 0 {
        Some(match operation {
            Operation::ServiceInfo => Payload::ServiceInfo(serde_json::from_value(raw.data)?),
            Operation::Convert => {
                let data: ConvertData = serde_json::from_value(raw.data)?;
                Payload::Converted(data.text)
            }
            Operation::Diff => {
                let data: DiffData = serde_json::from_value(raw.data)?;
                Payload::Diff(data.diff)
            }
        })
    } else {
        None
    };
    Ok(Envelope {
        code: raw.code,
        msg: raw.msg.unwrap_or_default(),
        payload,
    })
}

/// The service takes `modules` as a JSON document inside a string field
/// rather than as a nested object. Empty maps are omitted.
pub fn encode_modules(modules: &BTreeMap<String, i32>) -> Result<Option<String>, serde_json::Error> {
    if modules.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(modules).map(Some)
}
