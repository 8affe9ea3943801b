//! REST contract consumed by the stores.
//!
//! [`ChatApi`] is the seam between the stores and the backend: production
//! code uses [`crate::HttpApi`], tests substitute an in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use murmur_shared::message::{OutgoingMessage, ServerMessage};
use murmur_shared::types::{AuthUser, MessageId, Peer, UserId};

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Partial profile update.  Only the avatar is editable today.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditRequest {
    pub text: String,
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /auth/check`
    async fn check_session(&self) -> Result<AuthUser, ApiError>;

    /// `POST /auth/signup`
    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthUser, ApiError>;

    /// `POST /auth/login`
    async fn login(&self, request: &LoginRequest) -> Result<AuthUser, ApiError>;

    /// `POST /auth/logout`
    async fn logout(&self) -> Result<(), ApiError>;

    /// `PUT /auth/update-profile`
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<AuthUser, ApiError>;

    /// `GET /messages/users`
    async fn list_contacts(&self) -> Result<Vec<Peer>, ApiError>;

    /// `GET /messages/:peerId`
    async fn history(&self, peer: &UserId) -> Result<Vec<ServerMessage>, ApiError>;

    /// `POST /messages/send/:peerId`
    async fn send_message(
        &self,
        peer: &UserId,
        message: &OutgoingMessage,
    ) -> Result<ServerMessage, ApiError>;

    /// `PUT /messages/edit/:messageId`
    async fn edit_message(&self, id: &MessageId, text: &str) -> Result<ServerMessage, ApiError>;

    /// `DELETE /messages/delete/:messageId`
    async fn delete_message(&self, id: &MessageId) -> Result<(), ApiError>;
}
