use crate::error::ApiError;
use crate::invoker::{decode, Invoker};
use crate::request::RequestDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

pub const SUMMARY_TITLE: &str = "Document Summary";
pub const REPLY_CONFIDENCE: f32 = 0.85;

const SUMMARY_FAILED: &str = "Failed to fetch summary.";
const CHAT_FAILED: &str = "Failed to get response.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryEnvelope {
    pub id: String,
    pub title: String,
    pub content: Value,
    pub word_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub id: Uuid,
    pub user_id: String,
    pub user_message: String,
    pub ai_response: String,
    pub timestamp: DateTime<Utc>,
    pub confidence: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: Value,
}

/// Number of top-level elements in an analysis payload.
///
/// This is not a textual word count: arrays count their items, objects their
/// keys, strings their characters.
pub fn word_count(content: &Value) -> usize {
    match content {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(text) => text.chars().count(),
        _ => 0,
    }
}

#[derive(Clone)]
pub struct DocumentService {
    invoker: Invoker,
}

impl DocumentService {
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker }
    }

    pub async fn get_summary(&self, document_id: &str) -> Result<SummaryEnvelope, ApiError> {
        let path = format!("/analysis/{}", urlencoding::encode(document_id));
        let content = self
            .invoker
            .invoke(RequestDescriptor::get(path))
            .await
            .map_err(|err| err.or_message(SUMMARY_FAILED))?;
        Ok(SummaryEnvelope {
            id: document_id.to_string(),
            title: SUMMARY_TITLE.to_string(),
            word_count: word_count(&content),
            content,
            created_at: Utc::now(),
        })
    }

    /// Sends one question about the user's documents. Failures are returned
    /// as-is; recovery is up to the caller.
    pub async fn chat_with_document(
        &self,
        user_id: &str,
        message: &str,
    ) -> Result<ChatReply, ApiError> {
        let request = RequestDescriptor::post("/chat/user")
            .json(&json!({ "user_id": user_id, "query": message }));
        let payload = self
            .invoker
            .invoke(request)
            .await
            .map_err(|err| err.or_message(CHAT_FAILED))?;
        let ChatResponse { response } = decode(payload)?;
        let ai_response = match response {
            Value::String(text) => text,
            Value::Null => {
                return Err(ApiError::network("chat response carried no `response` text"))
            }
            other => other.to_string(),
        };
        Ok(ChatReply {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            user_message: message.to_string(),
            ai_response,
            timestamp: Utc::now(),
            confidence: REPLY_CONFIDENCE,
        })
    }
}
