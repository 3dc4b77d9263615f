//! Config-backed tenant and credential lookup

use std::collections::HashMap;

use async_trait::async_trait;
use inbox_core::adapter::ChannelCredentials;
use inbox_core::config::{ChannelConfigEntry, Config, TenantConfig};
use inbox_core::repository::{CredentialsResolver, TenantResolver};
use inbox_core::types::{Channel, TenantContext};
use inbox_core::Result;

/// Resolves tenants from the static `[[tenants]]` table
#[derive(Debug, Clone, Default)]
pub struct ConfigTenantResolver {
    tenants: Vec<TenantConfig>,
}

impl ConfigTenantResolver {
    pub fn new(tenants: Vec<TenantConfig>) -> Self {
        Self { tenants }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tenants.clone())
    }
}

#[async_trait]
impl TenantResolver for ConfigTenantResolver {
    async fn resolve(&self, channel: Channel, identifier: &str) -> Result<Option<TenantContext>> {
        Ok(self
            .tenants
            .iter()
            .find(|t| t.channel == channel && t.identifier == identifier)
            .map(|t| TenantContext {
                clinic_id: t.clinic_id.clone(),
                region_id: t.region_id.clone(),
                channel_config_id: t.channel_config_id.clone(),
            }))
    }
}

/// Resolves credentials from the `[[channel_configs]]` table
#[derive(Debug, Clone, Default)]
pub struct ConfigCredentialsResolver {
    credentials: HashMap<String, ChannelCredentials>,
}

impl ConfigCredentialsResolver {
    pub fn new(entries: Vec<ChannelConfigEntry>) -> Self {
        Self {
            credentials: entries
                .into_iter()
                .map(|c| (c.id, c.credentials))
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.channel_configs.clone())
    }
}

#[async_trait]
impl CredentialsResolver for ConfigCredentialsResolver {
    async fn resolve(&self, channel_config_id: &str) -> Option<ChannelCredentials> {
        self.credentials.get(channel_config_id).cloned()
    }
}
