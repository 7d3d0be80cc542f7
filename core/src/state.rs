use crate::auth::SessionManager;
use crate::documents::{DocumentService, SummaryEnvelope};
use crate::error::ApiError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const GREETING: &str = "I have analyzed your document. Ask me anything about its content.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: Uuid,
    pub speaker: Speaker,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

pub fn apology(err: &ApiError) -> String {
    format!("Sorry, I couldn't get a response. {err}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    Busy,
    EmptyMessage,
    NoUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ignored(IgnoredReason),
    Answered,
    Apologized,
}

/// Turn-based chat over one document.
///
/// The transcript is append-only and in display order. At most one request is
/// in flight per session; a submit while a reply is pending is a no-op. The
/// asking user is looked up on every submit, so a logout takes effect on the
/// next one.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<RwLock<InnerState>>,
    documents: DocumentService,
    session: SessionManager,
    document_id: String,
}

struct InnerState {
    transcript: Vec<ChatTurn>,
    awaiting_reply: bool,
}

impl ChatSession {
    pub fn new(
        documents: DocumentService,
        session: SessionManager,
        document_id: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(InnerState {
                transcript: vec![ChatTurn::new(Speaker::Assistant, GREETING)],
                awaiting_reply: false,
            })),
            documents,
            session,
            document_id: document_id.into(),
        }
    }

    /// Fetches the document's summary and starts a session for it. No session
    /// is created when the summary cannot be loaded.
    pub async fn open(
        documents: DocumentService,
        session: SessionManager,
        document_id: impl Into<String>,
    ) -> Result<(SummaryEnvelope, Self), ApiError> {
        let document_id = document_id.into();
        let summary = documents.get_summary(&document_id).await?;
        Ok((summary, Self::new(documents, session, document_id)))
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn transcript(&self) -> Vec<ChatTurn> {
        self.inner.read().transcript.clone()
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.inner.read().awaiting_reply
    }

    pub async fn submit(&self, message: impl Into<String>) -> SubmitOutcome {
        let message = message.into();
        let user_id = {
            let mut inner = self.inner.write();
            if inner.awaiting_reply {
                return SubmitOutcome::Ignored(IgnoredReason::Busy);
            }
            if message.trim().is_empty() {
                return SubmitOutcome::Ignored(IgnoredReason::EmptyMessage);
            }
            let Some(user_id) = self.session.current_user().map(|user| user.id) else {
                return SubmitOutcome::Ignored(IgnoredReason::NoUser);
            };
            inner
                .transcript
                .push(ChatTurn::new(Speaker::User, message.clone()));
            inner.awaiting_reply = true;
            user_id
        };
        let _pending = PendingReply {
            inner: self.inner.clone(),
        };

        let result = self.documents.chat_with_document(&user_id, &message).await;

        let mut inner = self.inner.write();
        match result {
            Ok(reply) => {
                inner
                    .transcript
                    .push(ChatTurn::new(Speaker::Assistant, reply.ai_response));
                SubmitOutcome::Answered
            }
            Err(err) => {
                tracing::warn!(document_id = %self.document_id, error = %err, "chat request failed");
                inner
                    .transcript
                    .push(ChatTurn::new(Speaker::Assistant, apology(&err)));
                SubmitOutcome::Apologized
            }
        }
    }
}

/// Clears the awaiting-reply flag when a submission ends, including when the
/// submitting future is dropped mid-request.
struct PendingReply {
    inner: Arc<RwLock<InnerState>>,
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.inner.write().awaiting_reply = false;
    }
}
