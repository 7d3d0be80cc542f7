pub mod auth;
pub mod config;
pub mod credentials;
pub mod documents;
pub mod error;
pub mod files;
pub mod invoker;
pub mod request;
pub mod state;
pub mod telemetry;
pub mod transport;

pub use auth::{AuthService, ExternalIdentity, SessionManager, UserProfile};
pub use config::{ClientSettings, ConfigError};
pub use credentials::CredentialStore;
pub use documents::{ChatReply, DocumentService, SummaryEnvelope};
pub use error::ApiError;
pub use files::{DocumentRecord, DocumentStatus, FileService, UploadFile};
pub use invoker::{Invoker, Outcome};
pub use request::{MultipartPayload, RequestBody, RequestDescriptor};
pub use state::{ChatSession, ChatTurn, IgnoredReason, Speaker, SubmitOutcome};
pub use transport::{MockReply, MockTransport, ReqwestTransport, Transport};

use std::sync::Arc;

/// Every façade wired to one invoker and one credential store.
#[derive(Clone)]
pub struct DocentClient {
    pub session: SessionManager,
    pub files: FileService,
    pub documents: DocumentService,
    invoker: Invoker,
}

impl DocentClient {
    pub fn new(invoker: Invoker) -> Self {
        Self {
            session: SessionManager::new(invoker.clone()),
            files: FileService::new(invoker.clone()),
            documents: DocumentService::new(invoker.clone()),
            invoker,
        }
    }

    /// Real HTTP client with the credential persisted under the settings' data dir.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        let credentials = match &settings.data_dir {
            Some(dir) => CredentialStore::persistent(dir),
            None => CredentialStore::in_memory(),
        };
        Self::new(Invoker::over_http(settings, credentials))
    }

    pub fn with_transport(
        settings: &ClientSettings,
        credentials: CredentialStore,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::new(Invoker::new(settings, credentials, transport))
    }

    pub fn credentials(&self) -> &CredentialStore {
        self.invoker.credentials()
    }

    /// A chat over `document_id` on behalf of whoever `session` has signed in.
    pub fn chat_session(&self, document_id: impl Into<String>) -> ChatSession {
        ChatSession::new(self.documents.clone(), self.session.clone(), document_id)
    }

    /// Like [`chat_session`](Self::chat_session), but fetches the summary first.
    pub async fn open_chat(
        &self,
        document_id: impl Into<String>,
    ) -> Result<(SummaryEnvelope, ChatSession), ApiError> {
        ChatSession::open(self.documents.clone(), self.session.clone(), document_id).await
    }
}
