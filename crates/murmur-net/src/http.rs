use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use murmur_shared::message::{OutgoingMessage, ServerMessage};
use murmur_shared::types::{AuthUser, MessageId, Peer, UserId};

use crate::api::{ChatApi, EditRequest, LoginRequest, ProfileUpdate, SignUpRequest};
use crate::error::ApiError;

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// [`ChatApi`] over HTTP.  The session lives in a cookie, so the client keeps
/// a cookie store for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        url::Url::parse(base_url)?;
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let err = error_for_status(status, &body);
        debug!(status = status.as_u16(), error = %err, "Backend rejected request");
        Err(err)
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let resp = Self::check(resp).await?;
        resp.json::<T>().await.map_err(|e| {
            warn!(error = %e, "Failed to decode backend response");
            ApiError::Decode(e.to_string())
        })
    }
}

fn error_for_status(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.message)
        .filter(|m| !m.is_empty());
    if status == StatusCode::UNAUTHORIZED {
        ApiError::Unauthorized { message }
    } else {
        ApiError::Server {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl ChatApi for HttpApi {
    async fn check_session(&self) -> Result<AuthUser, ApiError> {
        let resp = self.client.get(self.url("/auth/check")).send().await?;
        Self::decode(resp).await
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthUser, ApiError> {
        let resp = self
            .client
            .post(self.url("/auth/signup"))
            .json(request)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthUser, ApiError> {
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .json(request)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let resp = self.client.post(self.url("/auth/logout")).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<AuthUser, ApiError> {
        let resp = self
            .client
            .put(self.url("/auth/update-profile"))
            .json(update)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn list_contacts(&self) -> Result<Vec<Peer>, ApiError> {
        let resp = self.client.get(self.url("/messages/users")).send().await?;
        Self::decode(resp).await
    }

    async fn history(&self, peer: &UserId) -> Result<Vec<ServerMessage>, ApiError> {
        let resp = self
            .client
            .get(self.url(&format!("/messages/{peer}")))
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn send_message(
        &self,
        peer: &UserId,
        message: &OutgoingMessage,
    ) -> Result<ServerMessage, ApiError> {
        let resp = self
            .client
            .post(self.url(&format!("/messages/send/{peer}")))
            .json(message)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn edit_message(&self, id: &MessageId, text: &str) -> Result<ServerMessage, ApiError> {
        let resp = self
            .client
            .put(self.url(&format!("/messages/edit/{id}")))
            .json(&EditRequest {
                text: text.to_string(),
            })
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn delete_message(&self, id: &MessageId) -> Result<(), ApiError> {
        let resp = self
            .client
            .delete(self.url(&format!("/messages/delete/{id}")))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}
