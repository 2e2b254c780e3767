use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use subtitle_logging::{subtitle_debug, subtitle_warn};
use url::Url;

use crate::envelope::{decode_envelope, Envelope, Operation, Payload};
use crate::{
    ConnectionState, ConversionError, ConversionOutput, ConversionRequest, ConversionResult,
    ConvertOptions, FailureKind, DEFAULT_API_BASE_URL,
};

const CONNECTION_FAILED: &str = "Connection failed";
const UNKNOWN_ERROR: &str = "Unknown error";

/// Messages used when the service gives no better explanation.
struct Fallbacks {
    rejected: &'static str,
    network: &'static str,
}

const CONVERT_FALLBACKS: Fallbacks = Fallbacks {
    rejected: "Conversion failed",
    network: "Network error during conversion",
};

const DIFF_FALLBACKS: Fallbacks = Fallbacks {
    rejected: "Diff generation failed",
    network: "Network error during diff generation",
};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Either the service itself or a proxy prefix such as `http://localhost:8788/api`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// What the orchestrator needs from a conversion backend.
#[async_trait::async_trait]
pub trait SubtitleConverter: Send + Sync {
    async fn convert_subtitle(
        &self,
        text: &str,
        options: &ConvertOptions,
    ) -> Result<String, ConversionError>;

    async fn get_diff(&self, text: &str, options: &ConvertOptions)
        -> Result<String, ConversionError>;
}

/// Typed client for the zhconvert HTTP API.
///
/// Holds no state besides the outcome of the last connectivity check.
#[derive(Debug)]
pub struct ZhConvertClient {
    http: reqwest::Client,
    base_url: Url,
    connection: Mutex<ConnectionState>,
}

impl ZhConvertClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ConversionError> {
        let mut base_url = Url::parse(&settings.base_url)
            .map_err(|err| ConversionError::new(FailureKind::InvalidRequest, err.to_string()))?;
        // `Url::join` drops the last segment unless the path ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ConversionError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            http,
            base_url,
            connection: Mutex::new(ConnectionState::default()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Snapshot of the last check.
    pub fn connection(&self) -> ConnectionState {
        self.lock_connection().clone()
    }

    /// Checks `GET /service-info`. Never fails: the outcome is recorded in
    /// the connection state, which is also returned.
    pub async fn check_connection(&self) -> ConnectionState {
        {
            let mut state = self.lock_connection();
            state.is_checking = true;
            state.error = None;
        }

        let outcome = self.exchange(Operation::ServiceInfo, None).await;

        let mut state = self.lock_connection();
        state.is_checking = false;
        match outcome {
            Ok(Envelope {
                code: 0,
                payload: Some(Payload::ServiceInfo(info)),
                ..
            }) => {
                subtitle_debug!("Service reachable, version {}", info.version);
                state.is_connected = true;
                state.service_info = Some(info);
            }
            Ok(envelope) => {
                state.is_connected = false;
                state.error = Some(non_empty_or(envelope.msg, UNKNOWN_ERROR));
            }
            Err(err) => {
                subtitle_warn!("Service check failed: {} ({})", err.message, err.kind);
                state.is_connected = false;
                state.error = Some(non_empty_or(err.message, CONNECTION_FAILED));
            }
        }
        state.clone()
    }

    /// Sends a prepared request to `POST /convert`.
    ///
    /// Failures carry the service's message when an envelope was received,
    /// otherwise a fixed network-error message; transport details go to the log.
    pub async fn convert(
        &self,
        request: &ConversionRequest,
    ) -> Result<ConversionResult, ConversionError> {
        let (operation, fallbacks) = if request.wants_diff() {
            (Operation::Diff, &DIFF_FALLBACKS)
        } else {
            (Operation::Convert, &CONVERT_FALLBACKS)
        };

        let envelope = match self.exchange(operation, Some(request)).await {
            Ok(envelope) => envelope,
            Err(err) => {
                subtitle_warn!("{} request failed: {} ({})", operation.path(), err.message, err.kind);
                return Err(ConversionError::new(err.kind, fallbacks.network));
            }
        };

        let output = match envelope.payload {
            Some(Payload::Converted(text)) => ConversionOutput::Text(text),
            Some(Payload::Diff(diff)) => ConversionOutput::Diff(diff),
            Some(Payload::ServiceInfo(_)) => {
                return Err(ConversionError::new(
                    FailureKind::MalformedEnvelope,
                    fallbacks.rejected,
                ));
            }
            None => {
                return Err(ConversionError::new(
                    FailureKind::Rejected {
                        code: envelope.code,
                    },
                    non_empty_or(envelope.msg, fallbacks.rejected),
                ));
            }
        };

        Ok(ConversionResult {
            code: envelope.code,
            msg: envelope.msg,
            output,
        })
    }

    async fn exchange(
        &self,
        operation: Operation,
        request: Option<&ConversionRequest>,
    ) -> Result<Envelope, ConversionError> {
        let url = self
            .base_url
            .join(operation.path())
            .map_err(|err| ConversionError::new(FailureKind::InvalidRequest, err.to_string()))?;

        let builder = match request {
            Some(body) => self
                .http
                .request(Method::POST, url)
                .header(CONTENT_TYPE, "application/json")
                .json(body),
            None => self.http.request(Method::GET, url),
        };

        let response = builder
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        match decode_envelope(operation, &body) {
            Ok(envelope) if status.is_success() || !envelope.is_success() => Ok(envelope),
            Ok(envelope) => Err(ConversionError::new(
                FailureKind::HttpStatus(status.as_u16()),
                non_empty_or(envelope.msg, &status.to_string()),
            )),
            Err(_) if !status.is_success() => Err(ConversionError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            )),
            Err(err) => Err(ConversionError::new(
                FailureKind::MalformedEnvelope,
                err.to_string(),
            )),
        }
    }

    fn lock_connection(&self) -> std::sync::MutexGuard<'_, ConnectionState> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl SubtitleConverter for ZhConvertClient {
    async fn convert_subtitle(
        &self,
        text: &str,
        options: &ConvertOptions,
    ) -> Result<String, ConversionError> {
        let request = ConversionRequest::convert(text, options)?;
        match self.convert(&request).await?.output {
            ConversionOutput::Text(text) => Ok(text),
            ConversionOutput::Diff(_) => Err(ConversionError::new(
                FailureKind::MalformedEnvelope,
                CONVERT_FALLBACKS.rejected,
            )),
        }
    }

    async fn get_diff(
        &self,
        text: &str,
        options: &ConvertOptions,
    ) -> Result<String, ConversionError> {
        let request = ConversionRequest::diff(text, options)?;
        match self.convert(&request).await?.output {
            ConversionOutput::Diff(diff) => Ok(diff),
            ConversionOutput::Text(_) => Err(ConversionError::new(
                FailureKind::MalformedEnvelope,
                DIFF_FALLBACKS.rejected,
            )),
        }
    }
}

fn non_empty_or(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ConversionError {
    if err.is_timeout() {
        return ConversionError::new(FailureKind::Timeout, err.to_string());
    }
    ConversionError::new(FailureKind::Network, err.to_string())
}
