//! HTTP handlers
//!
//! Webhook endpoints acknowledge every well-formed delivery with `200` once
//! processed; providers retry on anything else. The inbox API surfaces
//! engine errors through [`ApiError`].

use std::collections::BTreeMap;

use axum::{
    Form, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use inbox_core::adapter::ChannelAdapter;
use inbox_core::repository::{ConversationRepository, MessageRepository};
use inbox_core::types::{Conversation, Message};
use inbox_engine::{ComposeRequest, ProcessOutcome};
use inbox_instagram::SIGNATURE_HEADER;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::error::{ApiError, Result};
use crate::server::AppState;

const TWILIO_SIGNATURE_HEADER: &str = "x-twilio-signature";
const DEFAULT_HISTORY_LIMIT: usize = 50;

// ============================================================================
// Request types
// ============================================================================

/// Query of the Meta subscription handshake
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

// ============================================================================
// Handler functions
// ============================================================================

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Twilio Conversations / Messaging webhook
pub async fn whatsapp_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(params): Form<BTreeMap<String, String>>,
) -> Result<StatusCode> {
    let adapter = state
        .whatsapp
        .as_ref()
        .ok_or(ApiError::ChannelNotConfigured("whatsapp"))?;

    if let Some(url) = &state.twilio_webhook_url {
        let signature = headers
            .get(TWILIO_SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !adapter.verify_request_signature(url, &params, signature) {
            warn!("Rejected WhatsApp webhook with invalid signature");
            return Ok(StatusCode::FORBIDDEN);
        }
    }

    let raw = JsonValue::Object(
        params
            .into_iter()
            .map(|(k, v)| (k, JsonValue::String(v)))
            .collect(),
    );
    process(&state, &**adapter, &raw).await;
    Ok(StatusCode::OK)
}

/// Meta subscription handshake
pub async fn instagram_verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> impl IntoResponse {
    let Some(adapter) = state.instagram.as_ref() else {
        return (StatusCode::NOT_FOUND, String::new());
    };

    let subscribed = query.mode.as_deref() == Some("subscribe")
        && query
            .verify_token
            .as_deref()
            .is_some_and(|token| adapter.verify_webhook(token));

    match (subscribed, query.challenge) {
        (true, Some(challenge)) => {
            info!("Instagram webhook subscription verified");
            (StatusCode::OK, challenge)
        }
        _ => {
            warn!("Instagram webhook verification failed");
            (StatusCode::FORBIDDEN, String::new())
        }
    }
}

/// Meta Instagram Messaging webhook
pub async fn instagram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let adapter = state
        .instagram
        .as_ref()
        .ok_or(ApiError::ChannelNotConfigured("instagram"))?;

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if !adapter.verify_payload(&body, signature) {
        warn!("Rejected Instagram webhook with invalid signature");
        return Ok(StatusCode::UNAUTHORIZED);
    }

    let raw: JsonValue = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Invalid Instagram webhook body: {}", e);
            return Ok(StatusCode::BAD_REQUEST);
        }
    };

    process(&state, &**adapter, &raw).await;
    Ok(StatusCode::OK)
}

async fn process(state: &AppState, adapter: &dyn ChannelAdapter, raw: &JsonValue) {
    let events = adapter.parse_webhook_events(raw);
    if events.is_empty() {
        debug!("No {} events in webhook payload", adapter.channel());
        return;
    }

    let outcomes = state.engine.process_events(&events).await;
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, ProcessOutcome::Failed(_)))
        .count();
    debug!(
        "Processed {} {} events ({} failed)",
        outcomes.len(),
        adapter.channel(),
        failed
    );
}

/// Send a staff message
pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(request): Json<ComposeRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    let message = state.outbound.send(&conversation_id, request).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Stored timeline of a conversation, oldest first
pub async fn list_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>> {
    state
        .conversations
        .find_one(&conversation_id)
        .await?
        .ok_or_else(|| inbox_core::Error::NotFound(format!("conversation {}", conversation_id)))?;

    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let messages = state
        .messages
        .list_by_conversation(&conversation_id, limit)
        .await?;
    Ok(Json(messages))
}

/// Reset the unread counter
pub async fn mark_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Conversation>> {
    let conversation = state.conversations.mark_read(&conversation_id).await?;
    Ok(Json(conversation))
}

/// Re-send a failed outbound message
pub async fn resend_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<Json<Message>> {
    let message = state.outbound.resend(&message_id).await?;
    Ok(Json(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::app;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use http::Request;
    use inbox_core::config::{Config, InstagramConfig, WhatsAppConfig};
    use inbox_core::store::SqliteStore;
    use async_trait::async_trait;
    use inbox_core::repository::NotificationSink;
    use inbox_core::types::{Direction, MessageStatus};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CUSTOMER: &str = "whatsapp:+15550001111";
    const WEBHOOK_URL: &str = "https://inbox.example.com/webhooks/whatsapp";

    fn whatsapp_config(api_base_url: &str, webhook_url: Option<&str>) -> WhatsAppConfig {
        WhatsAppConfig {
            account_sid: "AC123".to_string(),
            auth_token: "twilio-token".to_string(),
            phone_number: Some("+14155238886".to_string()),
            api_base_url: api_base_url.to_string(),
            validate_signature: webhook_url.is_some(),
            webhook_url: webhook_url.map(str::to_string),
            verify_token: None,
        }
    }

    fn instagram_config(app_secret: Option<&str>) -> InstagramConfig {
        InstagramConfig {
            access_token: "ig-token".to_string(),
            business_account_id: Some("1784".to_string()),
            verify_token: Some("hub-secret".to_string()),
            app_secret: app_secret.map(str::to_string),
            graph_base_url: "http://127.0.0.1:9".to_string(),
            api_version: "v21.0".to_string(),
        }
    }

    fn build(config: Config) -> (Router, SqliteStore) {
        let store = SqliteStore::in_memory().unwrap();
        let state = AppState::from_config(&config, store.clone()).unwrap();
        (app(state), store)
    }

    /// Sink that keeps the status notifications it receives
    #[derive(Default)]
    struct StatusRecorder(Mutex<Vec<(String, MessageStatus)>>);

    impl StatusRecorder {
        fn statuses(&self) -> Vec<(String, MessageStatus)> {
            self.0.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for StatusRecorder {
        async fn emit_new_message(
            &self,
            _conversation_id: &str,
            _message: &Message,
        ) -> inbox_core::Result<()> {
            Ok(())
        }

        async fn emit_conversation_update(
            &self,
            _conversation: &Conversation,
        ) -> inbox_core::Result<()> {
            Ok(())
        }

        async fn emit_message_status_update(
            &self,
            _conversation_id: &str,
            message_id: &str,
            status: MessageStatus,
        ) -> inbox_core::Result<()> {
            self.0.lock().unwrap().push((message_id.to_string(), status));
            Ok(())
        }
    }

    fn build_recording(config: Config) -> (Router, SqliteStore, Arc<StatusRecorder>) {
        let store = SqliteStore::in_memory().unwrap();
        let recorder = Arc::new(StatusRecorder::default());
        let state = AppState::with_sink(&config, store.clone(), recorder.clone()).unwrap();
        (app(state), store, recorder)
    }

    fn form_body(params: &BTreeMap<String, String>) -> String {
        params
            .iter()
            .map(|(k, v)| {
                let v = v.replace('+', "%2B").replace(':', "%3A").replace(' ', "+");
                format!("{}={}", k, v)
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    fn inbound_params(sid: &str, body: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("AccountSid".to_string(), "AC123".to_string()),
            ("MessageSid".to_string(), sid.to_string()),
            ("From".to_string(), CUSTOMER.to_string()),
            ("To".to_string(), "whatsapp:+14155238886".to_string()),
            ("Body".to_string(), body.to_string()),
            ("ProfileName".to_string(), "Jane".to_string()),
            ("NumMedia".to_string(), "0".to_string()),
        ])
    }

    fn post_form(uri: &str, body: String, signature: Option<&str>) -> Request<Body> {
        let mut builder =
            Request::post(uri).header("content-type", "application/x-www-form-urlencoded");
        if let Some(signature) = signature {
            builder = builder.header(TWILIO_SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn inbound_conversation(app: &Router, store: &SqliteStore) -> String {
        let response = app
            .clone()
            .oneshot(post_form(
                "/webhooks/whatsapp",
                form_body(&inbound_params("SM100", "Hello there")),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        ConversationRepository::find_by_channel_conversation_id(store, CUSTOMER)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = build(Config::default());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "OK");
    }

    #[tokio::test]
    async fn test_whatsapp_inbound_is_recorded_once() {
        let (app, store) = build(Config {
            whatsapp: Some(whatsapp_config("http://127.0.0.1:9", None)),
            ..Default::default()
        });

        let conversation_id = inbound_conversation(&app, &store).await;
        // Twilio retry of the same delivery
        inbound_conversation(&app, &store).await;

        let conversation = ConversationRepository::find_one(&store, &conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.unread_count, 1);
        assert_eq!(conversation.contact_name.as_deref(), Some("Jane"));

        let message = store.find_by_channel_message_id("SM100").await.unwrap().unwrap();
        assert_eq!(message.direction, Direction::Inbound);
        assert_eq!(message.content_text.as_deref(), Some("Hello there"));

        let response = app
            .oneshot(
                Request::get(format!("/api/conversations/{}/messages", conversation_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let timeline: JsonValue = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(timeline.as_array().map(Vec::len), Some(1));
        assert_eq!(timeline[0]["channel_message_id"], "SM100");
    }

    #[tokio::test]
    async fn test_conversations_message_added_redelivery() {
        let (app, store) = build(Config {
            whatsapp: Some(whatsapp_config("http://127.0.0.1:9", None)),
            ..Default::default()
        });
        let params = BTreeMap::from([
            ("EventType".to_string(), "onMessageAdded".to_string()),
            ("AccountSid".to_string(), "AC123".to_string()),
            ("ConversationSid".to_string(), "CH123".to_string()),
            ("MessageSid".to_string(), "IM1".to_string()),
            ("Author".to_string(), CUSTOMER.to_string()),
            ("Body".to_string(), "Is the clinic open today".to_string()),
            ("Source".to_string(), "WHATSAPP".to_string()),
        ]);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(post_form("/webhooks/whatsapp", form_body(&params), None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let conversation = ConversationRepository::find_by_channel_conversation_id(&store, "CH123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.unread_count, 1);
        assert_eq!(conversation.contact_identifier, CUSTOMER);
        // The thread is keyed by the conversation, never by the author
        assert!(
            ConversationRepository::find_by_channel_conversation_id(&store, CUSTOMER)
                .await
                .unwrap()
                .is_none()
        );

        let messages = store.list_by_conversation(&conversation.id, 10).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel_message_id, "IM1");
        assert_eq!(messages[0].direction, Direction::Inbound);
    }

    #[tokio::test]
    async fn test_status_callback_updates_sent_message() {
        let twilio = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "sid": "SM999"
            })))
            .mount(&twilio)
            .await;

        let (app, store, recorder) = build_recording(Config {
            whatsapp: Some(whatsapp_config(&twilio.uri(), None)),
            ..Default::default()
        });
        let conversation_id = inbound_conversation(&app, &store).await;

        let response = app
            .clone()
            .oneshot(
                Request::post(format!("/api/conversations/{}/messages", conversation_id))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"text":"See you at 10"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(recorder.statuses().is_empty());

        let callback = BTreeMap::from([
            ("AccountSid".to_string(), "AC123".to_string()),
            ("MessageSid".to_string(), "SM999".to_string()),
            ("SmsStatus".to_string(), "delivered".to_string()),
            ("From".to_string(), "whatsapp:+14155238886".to_string()),
            ("To".to_string(), CUSTOMER.to_string()),
        ]);
        let response = app
            .oneshot(post_form("/webhooks/whatsapp", form_body(&callback), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let sent = store.find_by_channel_message_id("SM999").await.unwrap().unwrap();
        assert_eq!(sent.status, MessageStatus::Delivered);
        assert_eq!(
            recorder.statuses(),
            vec![(sent.id.clone(), MessageStatus::Delivered)]
        );
    }

    #[tokio::test]
    async fn test_whatsapp_unparseable_payload_is_acknowledged() {
        let (app, _) = build(Config {
            whatsapp: Some(whatsapp_config("http://127.0.0.1:9", None)),
            ..Default::default()
        });
        let response = app
            .oneshot(post_form("/webhooks/whatsapp", "Foo=bar".to_string(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_whatsapp_signature() {
        let (app, store) = build(Config {
            whatsapp: Some(whatsapp_config("http://127.0.0.1:9", Some(WEBHOOK_URL))),
            ..Default::default()
        });
        let params = inbound_params("SM200", "signed");

        let response = app
            .clone()
            .oneshot(post_form("/webhooks/whatsapp", form_body(&params), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(store.find_by_channel_message_id("SM200").await.unwrap().is_none());

        let signature =
            inbox_whatsapp::compute_signature("twilio-token", WEBHOOK_URL, &params).unwrap();
        let response = app
            .oneshot(post_form(
                "/webhooks/whatsapp",
                form_body(&params),
                Some(&signature),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(store.find_by_channel_message_id("SM200").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unconfigured_channel() {
        let (app, _) = build(Config::default());
        let response = app
            .oneshot(post_form("/webhooks/whatsapp", "From=x".to_string(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_instagram_handshake() {
        let (app, _) = build(Config {
            instagram: Some(instagram_config(None)),
            ..Default::default()
        });

        let response = app
            .clone()
            .oneshot(
                Request::get(
                    "/webhooks/instagram?hub.mode=subscribe&hub.verify_token=hub-secret&hub.challenge=12345",
                )
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "12345");

        let response = app
            .oneshot(
                Request::get(
                    "/webhooks/instagram?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=12345",
                )
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_instagram_webhook_signature_and_body() {
        let (app, store) = build(Config {
            instagram: Some(instagram_config(Some("app-secret"))),
            ..Default::default()
        });
        let payload = serde_json::json!({
            "object": "instagram",
            "entry": [{
                "id": "1784",
                "time": 1767268800000i64,
                "messaging": [{
                    "sender": {"id": "1789"},
                    "recipient": {"id": "1784"},
                    "timestamp": 1767268800000i64,
                    "message": {"mid": "m_1", "text": "hi there"}
                }]
            }]
        })
        .to_string();

        let post = |body: String, signature: Option<String>| {
            let mut builder =
                Request::post("/webhooks/instagram").header("content-type", "application/json");
            if let Some(signature) = signature {
                builder = builder.header(SIGNATURE_HEADER, signature);
            }
            builder.body(Body::from(body)).unwrap()
        };

        let response = app
            .clone()
            .oneshot(post(payload.clone(), Some("sha256=00".to_string())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let garbage = "not json".to_string();
        let signature = inbox_instagram::sign_payload("app-secret", garbage.as_bytes());
        let response = app.clone().oneshot(post(garbage, signature)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let signature = inbox_instagram::sign_payload("app-secret", payload.as_bytes());
        let response = app.oneshot(post(payload, signature)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let message = store.find_by_channel_message_id("m_1").await.unwrap().unwrap();
        assert_eq!(message.content_text.as_deref(), Some("hi there"));
    }

    #[tokio::test]
    async fn test_send_and_resend_api() {
        let twilio = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "sid": "SM999"
            })))
            .mount(&twilio)
            .await;

        let (app, store) = build(Config {
            whatsapp: Some(whatsapp_config(&twilio.uri(), None)),
            ..Default::default()
        });
        let conversation_id = inbound_conversation(&app, &store).await;

        let send = |body: JsonValue| {
            Request::post(format!("/api/conversations/{}/messages", conversation_id))
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        };

        let response = app
            .clone()
            .oneshot(send(serde_json::json!({"text": "See you at 10"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let message: JsonValue = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(message["channel_message_id"], "SM999");
        assert_eq!(message["status"], "sent");
        let message_id = message["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(send(serde_json::json!({"text": ""})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: JsonValue = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(error["error"].as_str().is_some());

        // Sent messages cannot be re-sent
        let resend = |id: &str| {
            Request::post(format!("/api/messages/{}/resend", id))
                .body(Body::empty())
                .unwrap()
        };
        let response = app.clone().oneshot(resend(&message_id)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        store
            .update_status("SM999", MessageStatus::Failed, None)
            .await
            .unwrap();
        let response = app.clone().oneshot(resend(&message_id)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(resend("missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_send_provider_failure_is_bad_gateway() {
        let twilio = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("{\"code\":21211}"))
            .mount(&twilio)
            .await;

        let (app, store) = build(Config {
            whatsapp: Some(whatsapp_config(&twilio.uri(), None)),
            ..Default::default()
        });
        let conversation_id = inbound_conversation(&app, &store).await;

        let response = app
            .oneshot(
                Request::post(format!("/api/conversations/{}/messages", conversation_id))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"text":"hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let timeline = store.list_by_conversation(&conversation_id, 10).await.unwrap();
        assert_eq!(timeline.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_read() {
        let (app, store) = build(Config {
            whatsapp: Some(whatsapp_config("http://127.0.0.1:9", None)),
            ..Default::default()
        });
        let conversation_id = inbound_conversation(&app, &store).await;

        let response = app
            .clone()
            .oneshot(
                Request::post(format!("/api/conversations/{}/read", conversation_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let conversation: JsonValue = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(conversation["unread_count"], 0);

        let response = app
            .oneshot(
                Request::post("/api/conversations/missing/read")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
