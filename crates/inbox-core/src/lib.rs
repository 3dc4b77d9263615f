//! inbox-core: shared model for the unified inbox gateway
//!
//! Channel-neutral conversation and message types, the normalized webhook
//! event model, the channel adapter contract, repository contracts and a
//! SQLite implementation of them.

pub mod adapter;
pub mod config;
pub mod error;
pub mod event;
pub mod repository;
pub mod store;
pub mod types;

pub use adapter::{
    AdapterRegistry, ChannelAdapter, ChannelCredentials, FetchOptions, OutboundContent,
    SendResult, UserProfile,
};
pub use config::{
    ChannelConfigEntry, Config, HttpConfig, InstagramConfig, ServerConfig, StorageConfig,
    TenantConfig, WhatsAppConfig,
};
pub use error::{Error, Result};
pub use event::{EventKind, NormalizedMessage, NormalizedWebhookEvent, Reaction, StatusUpdate};
pub use repository::{
    ContactProfileStore, ConversationRepository, CredentialsResolver, MessageRepository,
    NoopNotificationSink, NotificationSink, TenantResolver,
};
pub use store::SqliteStore;
pub use types::{
    Channel, ContactChannelProfile, ContentType, Conversation, ConversationStatus,
    ConversationUpdate, DeliveryError, Direction, InstagramMessageMeta, MEDIA_PLACEHOLDER,
    Message, MessageMetadata, MessageStatus, NewConversation, NewMessage, PREVIEW_MAX_CHARS,
    TemplateMeta, TenantContext, WhatsAppMessageMeta, looks_like_raw_id, message_preview,
    truncate_preview,
};
