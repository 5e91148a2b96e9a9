//! HttpApi - the request/response service over HTTPS + JSON.

use super::{ApiError, ChatApi, UserProfile};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tandem_chat_types::wire::{
    AddContactRequest, Credentials, CurrentUserRecord, ErrorBody, LoginResponse, MessageRecord,
    SendMessageRequest, UserRecord,
};
use tandem_chat_types::{Message, Peer, SessionToken, UserId};

/// Which endpoint produced an error status; auth endpoints map some
/// statuses to their own error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Login,
    Signup,
    Authenticated,
}

/// Chat backend client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    /// Create a client for the API rooted at `base_url` (e.g. `http://localhost:5000/api`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        reqwest::Url::parse(base_url)
            .map_err(|e| ApiError::Network(format!("invalid api url {base_url}: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn execute(&self, request: RequestBuilder, endpoint: Endpoint) -> Result<Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        tracing::debug!("api error status {} on {:?}", status, endpoint);
        Err(classify(status, endpoint, body.message))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// Map a non-success status to the error taxonomy.
fn classify(status: StatusCode, endpoint: Endpoint, message: Option<String>) -> ApiError {
    let message = message.unwrap_or_else(|| status.to_string());
    match (endpoint, status) {
        (Endpoint::Login, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) => {
            ApiError::InvalidCredentials
        }
        (Endpoint::Signup, StatusCode::BAD_REQUEST | StatusCode::CONFLICT) => {
            ApiError::Conflict(message)
        }
        (_, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => ApiError::Unauthorized,
        (_, s) if s.is_server_error() => ApiError::Network(message),
        _ => ApiError::RemoteRejected(message),
    }
}

#[async_trait]
impl ChatApi for HttpApi {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let request = self.client.post(self.url("auth/login")).json(&body);
        decode(self.execute(request, Endpoint::Login).await?).await
    }

    async fn signup(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let body = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let request = self.client.post(self.url("auth/signup")).json(&body);
        self.execute(request, Endpoint::Signup).await?;
        Ok(())
    }

    async fn current_user(&self, token: &SessionToken) -> Result<UserProfile, ApiError> {
        let request = self.client.get(self.url("users/me")).bearer_auth(token.expose());
        let record: CurrentUserRecord = decode(self.execute(request, Endpoint::Authenticated).await?).await?;
        Ok(record.into())
    }

    async fn search_users(&self, token: &SessionToken, query: &str) -> Result<Vec<Peer>, ApiError> {
        let request = self
            .client
            .get(self.url("users/search"))
            .query(&[("username", query)])
            .bearer_auth(token.expose());
        let records: Vec<UserRecord> = decode(self.execute(request, Endpoint::Authenticated).await?).await?;
        Ok(records.into_iter().map(Peer::from).collect())
    }

    async fn add_contact(&self, token: &SessionToken, peer_id: &UserId) -> Result<(), ApiError> {
        let body = AddContactRequest {
            user_id: peer_id.clone(),
        };
        let request = self
            .client
            .post(self.url("users/add"))
            .json(&body)
            .bearer_auth(token.expose());
        self.execute(request, Endpoint::Authenticated).await?;
        Ok(())
    }

    async fn get_messages(&self, token: &SessionToken, peer_id: &UserId) -> Result<Vec<Message>, ApiError> {
        let request = self
            .client
            .get(self.url(&format!("messages/{}", peer_id)))
            .bearer_auth(token.expose());
        let records: Vec<MessageRecord> =
            decode(self.execute(request, Endpoint::Authenticated).await?).await?;
        Ok(records.into_iter().map(Message::from).collect())
    }

    async fn send_message(
        &self,
        token: &SessionToken,
        receiver_id: &UserId,
        content: &str,
    ) -> Result<Message, ApiError> {
        let body = SendMessageRequest {
            receiver_id: receiver_id.clone(),
            content: content.to_string(),
        };
        let request = self
            .client
            .post(self.url("messages/send"))
            .json(&body)
            .bearer_auth(token.expose());
        let record: MessageRecord = decode(self.execute(request, Endpoint::Authenticated).await?).await?;
        Ok(record.into())
    }
}
