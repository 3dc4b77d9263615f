//! Twilio API client for WhatsApp

use std::collections::BTreeMap;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha1::Sha1;
use tracing::{debug, info};

use crate::error::{Result, WhatsAppError};
use crate::payload::{WHATSAPP_PREFIX, strip_prefix};

type HmacSha1 = Hmac<Sha1>;

/// Twilio API client
#[derive(Debug, Clone)]
pub struct TwilioClient {
    client: Client,
    account_sid: String,
    auth_token: String,
    phone_number: Option<String>,
    base_url: String,
}

/// Message resource as returned by the Messages list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TwilioMessage {
    pub sid: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub body: Option<String>,
    pub direction: Option<String>,
    pub status: Option<String>,
    pub num_media: Option<String>,
    /// RFC 2822, e.g. `Mon, 16 Aug 2010 03:45:01 +0000`
    pub date_created: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<TwilioMessage>,
}

#[derive(Deserialize)]
struct SendMessageResponse {
    sid: String,
}

impl TwilioClient {
    /// Create a new Twilio client
    pub fn new(account_sid: String, auth_token: String, phone_number: Option<String>) -> Self {
        Self {
            client: Client::new(),
            account_sid,
            auth_token,
            phone_number,
            base_url: "https://api.twilio.com".to_string(),
        }
    }

    /// Point the client at another API host (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Rebuild the HTTP client with a request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WhatsAppError::Config(e.to_string()))?;
        Ok(self)
    }

    /// Copy of this client using another account's credentials
    pub fn with_credentials(&self, account_sid: &str, auth_token: &str, phone_number: &str) -> Self {
        Self {
            client: self.client.clone(),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            phone_number: Some(phone_number.to_string()).filter(|n| !n.is_empty()),
            base_url: self.base_url.clone(),
        }
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    fn ensure_credentials(&self) -> Result<&str> {
        if self.account_sid.is_empty() || self.auth_token.is_empty() {
            return Err(WhatsAppError::CredentialsNotSet);
        }
        self.phone_number
            .as_deref()
            .ok_or(WhatsAppError::CredentialsNotSet)
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }

    /// Send a WhatsApp message with optional text and media
    pub async fn send_message(
        &self,
        to: &str,
        body: Option<&str>,
        media_url: Option<&str>,
    ) -> Result<String> {
        let from = self.ensure_credentials()?;
        info!("Sending WhatsApp message to {}", to);

        let mut form = vec![
            ("From", whatsapp_address(from)),
            ("To", whatsapp_address(to)),
        ];
        if let Some(body) = body {
            form.push(("Body", body.to_string()));
        }
        if let Some(url) = media_url {
            form.push(("MediaUrl", url.to_string()));
        }

        self.post_message(&form).await
    }

    /// Send a pre-approved content template
    pub async fn send_template(
        &self,
        to: &str,
        content_sid: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<String> {
        let from = self.ensure_credentials()?;
        info!("Sending WhatsApp template {} to {}", content_sid, to);

        let variables = serde_json::to_string(variables)
            .map_err(|e| WhatsAppError::InvalidPayload(e.to_string()))?;
        let form = vec![
            ("From", whatsapp_address(from)),
            ("To", whatsapp_address(to)),
            ("ContentSid", content_sid.to_string()),
            ("ContentVariables", variables),
        ];

        self.post_message(&form).await
    }

    async fn post_message(&self, form: &[(&str, String)]) -> Result<String> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(WhatsAppError::Api { status, body });
        }

        let result: SendMessageResponse = response.json().await?;
        debug!("Twilio accepted message {}", result.sid);
        Ok(result.sid)
    }

    /// List messages exchanged with `address`, both directions, newest first per page
    pub async fn list_messages(&self, address: &str, page_size: usize) -> Result<Vec<TwilioMessage>> {
        self.ensure_credentials()?;
        let address = whatsapp_address(address);
        let page_size = page_size.to_string();

        let mut messages = Vec::new();
        for filter in ["To", "From"] {
            let response = self
                .client
                .get(self.messages_url())
                .basic_auth(&self.account_sid, Some(&self.auth_token))
                .query(&[(filter, address.as_str()), ("PageSize", page_size.as_str())])
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(WhatsAppError::Api { status, body });
            }

            let page: MessageList = response.json().await?;
            messages.extend(page.messages);
        }

        Ok(messages)
    }
}

/// Prefix a phone number with `whatsapp:` unless already present
pub fn whatsapp_address(number: &str) -> String {
    format!("{}{}", WHATSAPP_PREFIX, strip_prefix(number))
}

fn signature_mac(auth_token: &str, url: &str, params: &BTreeMap<String, String>) -> Option<HmacSha1> {
    let mut mac = HmacSha1::new_from_slice(auth_token.as_bytes()).ok()?;
    mac.update(url.as_bytes());
    // BTreeMap iterates keys in sorted order
    for (key, value) in params {
        mac.update(key.as_bytes());
        mac.update(value.as_bytes());
    }
    Some(mac)
}

/// Compute the `X-Twilio-Signature` value for a form POST
pub fn compute_signature(auth_token: &str, url: &str, params: &BTreeMap<String, String>) -> Option<String> {
    let mac = signature_mac(auth_token, url, params)?;
    Some(BASE64.encode(mac.finalize().into_bytes()))
}

/// Verify an `X-Twilio-Signature` header against the request URL and form params
pub fn verify_signature(
    auth_token: &str,
    url: &str,
    params: &BTreeMap<String, String>,
    signature: &str,
) -> bool {
    let Ok(provided) = BASE64.decode(signature.trim()) else {
        return false;
    };
    match signature_mac(auth_token, url, params) {
        Some(mac) => mac.verify_slice(&provided).is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TwilioClient {
        TwilioClient::new(
            "AC123".to_string(),
            "token123".to_string(),
            Some("+15559990000".to_string()),
        )
        .with_base_url(server.uri())
    }

    #[test]
    fn test_whatsapp_address() {
        assert_eq!(whatsapp_address("+1555"), "whatsapp:+1555");
        assert_eq!(whatsapp_address("whatsapp:+1555"), "whatsapp:+1555");
    }

    #[test]
    fn test_signature_round_trip() {
        let mut params = BTreeMap::new();
        params.insert("From".to_string(), "whatsapp:+15550001111".to_string());
        params.insert("Body".to_string(), "hi".to_string());
        let url = "https://inbox.example.com/webhooks/whatsapp";

        let signature = compute_signature("token123", url, &params).unwrap();
        assert!(verify_signature("token123", url, &params, &signature));
        assert!(!verify_signature("other-token", url, &params, &signature));
        assert!(!verify_signature("token123", url, &params, "not base64!"));

        params.insert("Body".to_string(), "tampered".to_string());
        assert!(!verify_signature("token123", url, &params, &signature));
    }

    #[tokio::test]
    async fn test_send_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("Body=hello"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"sid": "SM42"})))
            .expect(1)
            .mount(&server)
            .await;

        let sid = client(&server)
            .send_message("+15550001111", Some("hello"), None)
            .await
            .unwrap();
        assert_eq!(sid, "SM42");
    }

    #[tokio::test]
    async fn test_send_message_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid To"))
            .mount(&server)
            .await;

        let err = client(&server)
            .send_message("+15550001111", Some("hello"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WhatsAppError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_send_without_number_fails_fast() {
        let client = TwilioClient::new("AC123".to_string(), "token".to_string(), None);
        let err = client.send_message("+1555", Some("hi"), None).await.unwrap_err();
        assert!(matches!(err, WhatsAppError::CredentialsNotSet));
    }

    #[tokio::test]
    async fn test_send_template() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("ContentSid=HX123"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"sid": "SM7"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut variables = BTreeMap::new();
        variables.insert("1".to_string(), "Jane".to_string());
        let sid = client(&server)
            .send_template("+15550001111", "HX123", &variables)
            .await
            .unwrap();
        assert_eq!(sid, "SM7");
    }

    #[tokio::test]
    async fn test_list_messages_queries_both_directions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("To", "whatsapp:+15550001111"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"sid": "SM1", "body": "out", "direction": "outbound-api"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("From", "whatsapp:+15550001111"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"sid": "SM2", "body": "in", "direction": "inbound"}]
            })))
            .mount(&server)
            .await;

        let messages = client(&server)
            .list_messages("+15550001111", 20)
            .await
            .unwrap();
        let sids: Vec<_> = messages.iter().map(|m| m.sid.as_str()).collect();
        assert_eq!(sids, vec!["SM1", "SM2"]);
    }
}
