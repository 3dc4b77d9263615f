//! Instagram Graph API client implementation

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{InstagramError, Result};

/// Instagram Graph API client
#[derive(Debug, Clone)]
pub struct InstagramApi {
    client: Client,
    access_token: String,
    base_url: String,
    api_version: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    recipient: Recipient<'a>,
    message: MessagePayload<'a>,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    id: &'a str,
}

#[derive(Debug, Default, Serialize)]
struct MessagePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<OutgoingAttachment<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<ReplyTarget<'a>>,
}

#[derive(Debug, Serialize)]
struct OutgoingAttachment<'a> {
    #[serde(rename = "type")]
    attachment_type: &'a str,
    payload: AttachmentUrl<'a>,
}

#[derive(Debug, Serialize)]
struct AttachmentUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct ReplyTarget<'a> {
    mid: &'a str,
}

/// An outgoing Instagram direct message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage<'a> {
    pub text: Option<&'a str>,
    /// `(type, url)` where type is `image`, `video`, `audio` or `file`
    pub attachment: Option<(&'a str, &'a str)>,
    pub reply_to: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    pub recipient_id: Option<String>,
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfileResponse {
    pub id: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub profile_pic: Option<String>,
}

/// A message from the conversations endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct GraphMessage {
    pub id: String,
    pub created_time: Option<String>,
    pub from: Option<GraphUser>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphUser {
    pub id: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Paged<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct GraphConversation {
    messages: Option<Paged<GraphMessage>>,
}

impl InstagramApi {
    /// Create a new Instagram API client
    pub fn new(access_token: String) -> Self {
        Self {
            client: Client::new(),
            access_token,
            base_url: "https://graph.instagram.com".to_string(),
            api_version: "v21.0".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Rebuild the HTTP client with a request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InstagramError::Config(e.to_string()))?;
        Ok(self)
    }

    /// Copy of this client authenticated with another token
    pub fn with_access_token(&self, access_token: &str) -> Self {
        Self {
            access_token: access_token.to_string(),
            ..self.clone()
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.api_version, path)
    }

    fn ensure_token(&self) -> Result<()> {
        if self.access_token.is_empty() {
            return Err(InstagramError::AccessTokenNotSet);
        }
        Ok(())
    }

    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;
        debug!("Instagram API response: {} - {}", status, body);

        if !status.is_success() {
            error!("Instagram API error: {} - {}", status, body);
            return Err(InstagramError::GraphApi {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// Send a direct message to an Instagram-scoped user id
    pub async fn send_message(
        &self,
        recipient_id: &str,
        message: &OutgoingMessage<'_>,
    ) -> Result<SendMessageResponse> {
        self.ensure_token()?;
        info!("Sending Instagram message to {}", recipient_id);

        let request_body = SendMessageRequest {
            recipient: Recipient { id: recipient_id },
            message: MessagePayload {
                text: message.text,
                attachment: message.attachment.map(|(attachment_type, url)| OutgoingAttachment {
                    attachment_type,
                    payload: AttachmentUrl { url },
                }),
                reply_to: message.reply_to.map(|mid| ReplyTarget { mid }),
            },
        };

        let response = self
            .client
            .post(self.url("me/messages"))
            .query(&[("access_token", &self.access_token)])
            .json(&request_body)
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Get user profile information
    pub async fn get_user_profile(&self, user_id: &str) -> Result<UserProfileResponse> {
        self.ensure_token()?;
        debug!("Getting Instagram profile for {}", user_id);

        let response = self
            .client
            .get(self.url(user_id))
            .query(&[
                ("fields", "id,name,username,profile_pic"),
                ("access_token", self.access_token.as_str()),
            ])
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Messages of the conversation with `user_id`, as returned by the API (newest first)
    pub async fn get_conversation_messages(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<GraphMessage>> {
        self.ensure_token()?;

        let fields = format!("messages.limit({}){{id,created_time,from,message}}", limit);
        let response = self
            .client
            .get(self.url("me/conversations"))
            .query(&[
                ("platform", "instagram"),
                ("user_id", user_id),
                ("fields", fields.as_str()),
                ("access_token", self.access_token.as_str()),
            ])
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        let conversations: Paged<GraphConversation> = serde_json::from_str(&body)?;
        Ok(conversations
            .data
            .into_iter()
            .filter_map(|c| c.messages)
            .flat_map(|m| m.data)
            .collect())
    }
}
