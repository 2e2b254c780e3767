use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::envelope::encode_modules;

pub const DEFAULT_API_BASE_URL: &str = "https://api.zhconvert.org";
pub const DEFAULT_CONVERTER: &str = "Taiwan";
/// Leaves characters of Japanese origin unconverted.
pub const DEFAULT_JP_TEXT_STYLES: &str = "protect";
/// Side-by-side HTML diff.
pub const DIFF_TEMPLATE: &str = "SideBySide";

/// Per-call conversion settings.
///
/// `modules` is a sparse map of module id to its setting (the service uses
/// `-1` auto, `0` off, `1` on). An empty map sends no module field at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    pub converter: String,
    pub jp_text_styles: String,
    pub modules: BTreeMap<String, i32>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            converter: DEFAULT_CONVERTER.to_string(),
            jp_text_styles: DEFAULT_JP_TEXT_STYLES.to_string(),
            modules: BTreeMap::new(),
        }
    }
}

/// Body of `POST /convert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub text: String,
    pub converter: String,
    pub jp_text_styles: String,
    /// JSON-encoded module map, sent as a string value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modules: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_enable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_template: Option<String>,
}

impl ConversionRequest {
    pub fn convert(text: &str, options: &ConvertOptions) -> Result<Self, ConversionError> {
        let modules = encode_modules(&options.modules).map_err(|err| {
            ConversionError::new(FailureKind::InvalidRequest, err.to_string())
        })?;
        Ok(Self {
            text: text.to_string(),
            converter: options.converter.clone(),
            jp_text_styles: options.jp_text_styles.clone(),
            modules,
            diff_enable: None,
            diff_template: None,
        })
    }

    pub fn diff(text: &str, options: &ConvertOptions) -> Result<Self, ConversionError> {
        Ok(Self {
            diff_enable: Some(true),
            diff_template: Some(DIFF_TEMPLATE.to_string()),
            ..Self::convert(text, options)?
        })
    }

    pub fn wants_diff(&self) -> bool {
        self.diff_enable == Some(true)
    }
}

/// Capabilities reported by `GET /service-info`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ServiceInfo {
    #[serde(default)]
    pub converters: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub modules: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutput {
    Text(String),
    /// Opaque HTML markup.
    Diff(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub code: i64,
    pub msg: String,
    pub output: ConversionOutput,
}

/// Last check outcome. Replaced as a whole by every check, except that a
/// failed check keeps the previous `service_info`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectionState {
    pub is_connected: bool,
    pub is_checking: bool,
    pub service_info: Option<ServiceInfo>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ConversionError {
    pub kind: FailureKind,
    pub message: String,
}

impl ConversionError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The service answered with a non-zero envelope code.
    Rejected { code: i64 },
    HttpStatus(u16),
    Timeout,
    Network,
    MalformedEnvelope,
    InvalidRequest,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Rejected { code } => write!(f, "rejected with code {code}"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::MalformedEnvelope => write!(f, "malformed response envelope"),
            FailureKind::InvalidRequest => write!(f, "invalid request"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}
