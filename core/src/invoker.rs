use crate::config::ClientSettings;
use crate::credentials::CredentialStore;
use crate::error::{extract_http_message, ApiError};
use crate::request::{RequestBody, RequestDescriptor};
use crate::transport::{PreparedBody, PreparedRequest, RawResponse, ReqwestTransport, Transport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Normalized result of one network call. `Value::Null` stands for "no content".
pub type Outcome = Result<Value, ApiError>;

/// The single chokepoint every network call goes through.
///
/// Each call runs under the configured deadline, carries the bearer token when
/// one is stored, and comes back as an [`Outcome`]. Invocations share nothing
/// but the read-only credential lookup, so any number may be in flight.
#[derive(Clone)]
pub struct Invoker {
    base_url: String,
    timeout: Duration,
    credentials: CredentialStore,
    transport: Arc<dyn Transport>,
}

impl Invoker {
    pub fn new(
        settings: &ClientSettings,
        credentials: CredentialStore,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            timeout: settings.timeout,
            credentials,
            transport,
        }
    }

    pub fn over_http(settings: &ClientSettings, credentials: CredentialStore) -> Self {
        Self::new(settings, credentials, Arc::new(ReqwestTransport::new()))
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn invoke(&self, descriptor: RequestDescriptor) -> Outcome {
        let method = descriptor.method.clone();
        let path = descriptor.path.clone();
        let request = match self.prepare(descriptor) {
            Ok(request) => request,
            Err(err) => {
                warn!(%method, %path, error = ?err, "request not sent");
                return Err(err);
            }
        };

        debug!(%method, %path, "dispatching request");
        // Dropping the transport future on expiry aborts the call; the timer
        // goes away with it on every other path.
        let raw = match tokio::time::timeout(self.timeout, self.transport.send(request)).await {
            Err(_) => {
                warn!(%method, %path, timeout_ms = self.timeout.as_millis() as u64, "request timed out");
                return Err(ApiError::Timeout);
            }
            Ok(Err(err)) => {
                let detail = format!("{err:#}");
                warn!(%method, %path, error = %detail, "transport failure");
                return Err(ApiError::network(detail));
            }
            Ok(Ok(raw)) => raw,
        };
        debug!(%method, %path, status = raw.status, "response received");

        let outcome = classify(raw);
        if let Err(err) = &outcome {
            warn!(%method, %path, error = ?err, "request failed");
        }
        outcome
    }

    fn prepare(&self, descriptor: RequestDescriptor) -> Result<PreparedRequest, ApiError> {
        if let Some(err) = descriptor.encode_error() {
            return Err(ApiError::network(format!("failed to encode body: {err}")));
        }
        let url = join_url(&self.base_url, &descriptor.path);
        Url::parse(&url).map_err(|err| ApiError::network(format!("invalid url {url}: {err}")))?;

        let mut headers = descriptor.headers;
        if let Some(token) = self.credentials.get() {
            set_header(&mut headers, "Authorization", format!("Bearer {token}"));
        }

        let body = match descriptor.body {
            None => PreparedBody::Empty,
            Some(RequestBody::Multipart(payload)) => PreparedBody::Multipart(payload),
            Some(RequestBody::Json(value)) => {
                let bytes = serde_json::to_vec(&value)
                    .map_err(|err| ApiError::network(format!("failed to encode body: {err}")))?;
                set_header(&mut headers, "Content-Type", "application/json".to_string());
                PreparedBody::Json(bytes)
            }
        };

        Ok(PreparedRequest {
            method: descriptor.method,
            url,
            headers,
            body,
        })
    }
}

/// Turns a raw response into an [`Outcome`].
pub fn classify(raw: RawResponse) -> Outcome {
    if !(200..300).contains(&raw.status) {
        let message = extract_http_message(raw.status, &raw.body);
        return Err(ApiError::http(raw.status, message));
    }
    if raw.status == 204 || raw.content_length == Some(0) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&raw.body)
        .map_err(|err| ApiError::network(format!("malformed response body: {err}")))
}

/// Reshapes a successful payload into a typed response. A payload missing
/// the fields a façade depends on is treated like a malformed response.
pub(crate) fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, ApiError> {
    serde_json::from_value(payload)
        .map_err(|err| ApiError::network(format!("unexpected response shape: {err}")))
}

fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value));
}
