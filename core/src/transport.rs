use crate::request::{FormPart, MultipartPayload};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::CONTENT_LENGTH;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Body of a request after the invoker has chosen its encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedBody {
    Empty,
    Json(Vec<u8>),
    Multipart(MultipartPayload),
}

/// A fully resolved request: absolute URL, final headers, encoded body.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: PreparedBody,
}

impl PreparedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What came back over the wire, before any classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn json(status: u16, value: &Value) -> Self {
        let body = value.to_string().into_bytes();
        Self {
            status,
            content_length: Some(body.len() as u64),
            body,
        }
    }

    pub fn text(status: u16, text: impl Into<String>) -> Self {
        let body = text.into().into_bytes();
        Self {
            status,
            content_length: Some(body.len() as u64),
            body,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_length: Some(0),
            body: Vec::new(),
        }
    }
}

/// Sends one prepared request. Implementations do not apply deadlines; the
/// invoker owns the timer and drops the future to abort.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: PreparedRequest) -> Result<RawResponse>;
}

#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: PreparedRequest) -> Result<RawResponse> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            PreparedBody::Empty => builder,
            PreparedBody::Json(bytes) => builder.body(bytes),
            PreparedBody::Multipart(payload) => builder.multipart(to_form(payload)?),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        let body = response.bytes().await?.to_vec();
        Ok(RawResponse {
            status,
            content_length,
            body,
        })
    }
}

fn to_form(payload: MultipartPayload) -> Result<Form> {
    let mut form = Form::new();
    for part in payload.parts().iter().cloned() {
        form = match part {
            FormPart::Text { name, value } => form.text(name, value),
            FormPart::File {
                name,
                file_name,
                media_type,
                bytes,
            } => {
                let part = Part::bytes(bytes).file_name(file_name).mime_str(&media_type)?;
                form.part(name, part)
            }
        };
    }
    Ok(form)
}

/// Scripted reply for [`MockTransport`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(RawResponse),
    Fail(String),
    /// Never completes; only a deadline can end the call.
    Hang,
}

#[derive(Default)]
struct MockInner {
    queue: VecDeque<(MockReply, Duration)>,
    requests: Vec<PreparedRequest>,
    aborted: usize,
    completed: usize,
}

/// In-process transport that replays scripted replies in call order and
/// records every request it receives.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: MockReply) -> &Self {
        self.push_delayed(reply, Duration::ZERO)
    }

    pub fn push_delayed(&self, reply: MockReply, delay: Duration) -> &Self {
        self.inner.lock().queue.push_back((reply, delay));
        self
    }

    pub fn push_json(&self, status: u16, value: Value) -> &Self {
        self.push(MockReply::Respond(RawResponse::json(status, &value)))
    }

    pub fn requests(&self) -> Vec<PreparedRequest> {
        self.inner.lock().requests.clone()
    }

    pub fn last_request(&self) -> Option<PreparedRequest> {
        self.inner.lock().requests.last().cloned()
    }

    /// Calls dropped before their reply was delivered.
    pub fn aborted_calls(&self) -> usize {
        self.inner.lock().aborted
    }

    pub fn completed_calls(&self) -> usize {
        self.inner.lock().completed
    }
}

struct InFlight {
    inner: Arc<Mutex<MockInner>>,
    finished: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if self.finished {
            inner.completed += 1;
        } else {
            inner.aborted += 1;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: PreparedRequest) -> Result<RawResponse> {
        let scripted = {
            let mut inner = self.inner.lock();
            inner.requests.push(request.clone());
            inner.queue.pop_front()
        };
        let (reply, delay) = scripted
            .ok_or_else(|| anyhow!("no scripted response for {} {}", request.method, request.url))?;

        let mut guard = InFlight {
            inner: self.inner.clone(),
            finished: false,
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let result = match reply {
            MockReply::Respond(response) => Ok(response),
            MockReply::Fail(reason) => Err(anyhow!(reason)),
            MockReply::Hang => std::future::pending().await,
        };
        guard.finished = true;
        result
    }
}
