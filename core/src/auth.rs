use crate::credentials::CredentialStore;
use crate::error::ApiError;
use crate::files::id_string;
use crate::invoker::{decode, Invoker};
use crate::request::RequestDescriptor;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

const AUTH_FAILED: &str = "Authentication failed.";
const NO_TOKEN: &str = "No token found";

/// Profile of the signed-in user, enriched client-side with an avatar and token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    user: RemoteUser,
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: Value,
    email: String,
    name: String,
}

/// Identity asserted by an outside provider. The provider's handshake happens
/// elsewhere; only the resulting identity reaches the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub provider: String,
    pub email: String,
    pub name: String,
}

impl ExternalIdentity {
    pub fn new(
        provider: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            email: email.into(),
            name: name.into(),
        }
    }

    pub fn google() -> Self {
        Self::new("google", "user@gmail.com", "Google User")
    }
}

pub fn avatar_url(name: &str) -> String {
    format!(
        "https://ui-avatars.com/api/?name={}&background=193A83&color=fff",
        urlencoding::encode(name)
    )
}

/// Login and registration calls. A success writes the minted token to the
/// credential store.
#[derive(Clone)]
pub struct AuthService {
    invoker: Invoker,
}

impl AuthService {
    pub fn new(invoker: Invoker) -> Self {
        Self { invoker }
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        let request = RequestDescriptor::post("/auth/login")
            .json(&json!({ "email": email, "password": password }));
        self.exchange(request).await
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ApiError> {
        let request = RequestDescriptor::post("/auth/register")
            .json(&json!({ "name": name, "email": email, "password": password }));
        self.exchange(request).await
    }

    async fn exchange(&self, request: RequestDescriptor) -> Result<UserProfile, ApiError> {
        let payload = self
            .invoker
            .invoke(request)
            .await
            .map_err(|err| err.or_message(AUTH_FAILED))?;
        let AuthResponse { user } = decode(payload)?;
        let id = id_string(user.id);
        let profile = UserProfile {
            avatar: avatar_url(&user.name),
            token: format!("token_{id}"),
            id,
            email: user.email,
            name: user.name,
        };
        self.invoker.credentials().set(profile.token.clone());
        tracing::info!(user_id = %profile.id, "signed in");
        Ok(profile)
    }
}

/// Owns the signed-in session: login, logout and token refresh.
#[derive(Clone)]
pub struct SessionManager {
    auth: AuthService,
    credentials: CredentialStore,
    current: Arc<RwLock<Option<UserProfile>>>,
}

impl SessionManager {
    pub fn new(invoker: Invoker) -> Self {
        let credentials = invoker.credentials().clone();
        Self {
            auth: AuthService::new(invoker),
            credentials,
            current: Arc::new(RwLock::new(None)),
        }
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.current.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_authenticated()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        let profile = self.auth.authenticate(email, password).await?;
        *self.current.write() = Some(profile.clone());
        Ok(profile)
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ApiError> {
        let profile = self.auth.register(name, email, password).await?;
        *self.current.write() = Some(profile.clone());
        Ok(profile)
    }

    /// Signs in with an identity vouched for by an outside provider. The
    /// account id and `<provider>_token_<ms>` credential are minted locally.
    pub fn login_with_external_identity(&self, identity: ExternalIdentity) -> UserProfile {
        let millis = Utc::now().timestamp_millis();
        let profile = UserProfile {
            id: millis.to_string(),
            avatar: avatar_url(&identity.name),
            token: format!("{}_token_{millis}", identity.provider),
            email: identity.email,
            name: identity.name,
        };
        self.credentials.set(profile.token.clone());
        *self.current.write() = Some(profile.clone());
        tracing::info!(provider = %identity.provider, user_id = %profile.id, "signed in");
        profile
    }

    /// Adopts `user_id` as the current user when a token is already stored,
    /// e.g. one persisted by an earlier process.
    pub fn resume(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        let token = self
            .credentials
            .get()
            .ok_or_else(|| ApiError::validation(NO_TOKEN))?;
        let profile = UserProfile {
            id: user_id.to_string(),
            email: String::new(),
            name: user_id.to_string(),
            avatar: avatar_url(user_id),
            token,
        };
        *self.current.write() = Some(profile.clone());
        Ok(profile)
    }

    pub fn logout(&self) {
        self.credentials.clear();
        *self.current.write() = None;
        tracing::info!("signed out");
    }

    pub fn verify_token(&self) -> Result<(), ApiError> {
        if self.credentials.is_authenticated() {
            Ok(())
        } else {
            Err(ApiError::validation(NO_TOKEN))
        }
    }

    /// Stores a freshly minted token, whether or not one was stored before.
    pub fn refresh_token(&self) -> String {
        let token = format!("refreshed_token_{}", Utc::now().timestamp_millis());
        self.credentials.set(token.clone());
        if let Some(profile) = self.current.write().as_mut() {
            profile.token = token.clone();
        }
        tracing::debug!("token refreshed");
        token
    }
}
