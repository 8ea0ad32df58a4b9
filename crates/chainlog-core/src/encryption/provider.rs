//! Encryption config providers, one per configured strategy.

use super::config::{EncryptionConfig, EncryptionMember, RecipientPolicy};
use super::key_mapping::KeyMapping;
use super::EncryptionConfigProvider;
use crate::errors::{ChainLogError, Result};
use crate::grouping::{Grouping, GroupingStrategy};
use crate::identifier::ClientId;
use crate::settings::EncryptionSettings;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Pick the provider matching `settings`
///
/// Encryption disabled gives the disabled provider, no grouping gives one
/// server-wide key, member or subsystem grouping gives member keys.
///
/// # Errors
///
/// Fails when the key mapping file exists but cannot be read.
pub fn provider_from_settings(
    settings: &EncryptionSettings,
) -> Result<Box<dyn EncryptionConfigProvider>> {
    if !settings.enabled {
        return Ok(Box::new(DisabledEncryptionConfigProvider));
    }

    match settings.grouping {
        GroupingStrategy::None => Ok(Box::new(ServerEncryptionConfigProvider::new(
            settings.default_key_id.clone(),
            settings.key_store_location.clone(),
        ))),
        GroupingStrategy::Member | GroupingStrategy::Subsystem => {
            let mapping = match &settings.key_mapping_file {
                Some(path) => KeyMapping::load(path)?,
                None => KeyMapping::default(),
            };
            Ok(Box::new(MemberEncryptionConfigProvider::new(
                mapping,
                settings.default_key_id.clone(),
                settings.key_store_location.clone(),
            )))
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEncryptionConfigProvider;

impl EncryptionConfigProvider for DisabledEncryptionConfigProvider {
    fn is_enabled(&self) -> bool {
        false
    }

    fn for_grouping(&self, _grouping: &Grouping) -> Result<EncryptionConfig> {
        Ok(EncryptionConfig::disabled())
    }

    fn for_diagnostics(&self, _members: &[ClientId]) -> EncryptionConfig {
        EncryptionConfig::disabled()
    }
}

/// Every archive encrypted for one server-wide key
#[derive(Debug, Clone)]
pub struct ServerEncryptionConfigProvider {
    default_key_id: Option<String>,
    key_store_location: Option<PathBuf>,
}

impl ServerEncryptionConfigProvider {
    pub fn new(default_key_id: Option<String>, key_store_location: Option<PathBuf>) -> Self {
        Self {
            default_key_id: default_key_id.filter(|k| !k.trim().is_empty()),
            key_store_location,
        }
    }

    fn config(&self) -> EncryptionConfig {
        EncryptionConfig::new(
            RecipientPolicy::SingleDefaultKey(self.default_key_id.clone()),
            self.key_store_location.clone(),
        )
    }
}

impl EncryptionConfigProvider for ServerEncryptionConfigProvider {
    fn is_enabled(&self) -> bool {
        true
    }

    fn for_grouping(&self, _grouping: &Grouping) -> Result<EncryptionConfig> {
        Ok(self.config())
    }

    fn for_diagnostics(&self, _members: &[ClientId]) -> EncryptionConfig {
        self.config()
    }
}

/// Archives of each member encrypted for that member's keys
#[derive(Debug, Clone)]
pub struct MemberEncryptionConfigProvider {
    mapping: KeyMapping,
    default_keys: BTreeSet<String>,
    key_store_location: Option<PathBuf>,
}

impl MemberEncryptionConfigProvider {
    pub fn new(
        mapping: KeyMapping,
        default_key_id: Option<String>,
        key_store_location: Option<PathBuf>,
    ) -> Self {
        let default_keys = default_key_id
            .filter(|k| !k.trim().is_empty())
            .into_iter()
            .collect();
        Self {
            mapping,
            default_keys,
            key_store_location,
        }
    }

    /// Keys for `member_id` and whether the default was used
    fn resolve(&self, member_id: &str) -> (BTreeSet<String>, bool) {
        match self.mapping.get(member_id) {
            Some(keys) if !keys.is_empty() => (keys.clone(), false),
            _ if !self.default_keys.is_empty() => {
                info!(
                    component = "encryption",
                    op = "resolve_member_keys",
                    member_id = member_id,
                    "No keys mapped for member, using default key"
                );
                (self.default_keys.clone(), true)
            }
            _ => {
                warn!(
                    component = "encryption",
                    op = "resolve_member_keys",
                    member_id = member_id,
                    "No keys mapped for member and no default key configured"
                );
                (BTreeSet::new(), true)
            }
        }
    }
}

impl EncryptionConfigProvider for MemberEncryptionConfigProvider {
    fn is_enabled(&self) -> bool {
        true
    }

    fn for_grouping(&self, grouping: &Grouping) -> Result<EncryptionConfig> {
        let client = grouping
            .client()
            .ok_or(ChainLogError::MissingGroupingClient)?;
        let member_id = client.member_id().to_short_string();
        let (keys, default_key_used) = self.resolve(&member_id);

        debug!(
            component = "encryption",
            op = "encryption_for_grouping",
            member_id = %member_id,
            key_count = keys.len(),
            default_key_used,
        );

        Ok(EncryptionConfig::new(
            RecipientPolicy::ResolvedKeySet(keys.clone()),
            self.key_store_location.clone(),
        )
        .with_members(vec![EncryptionMember {
            member_id,
            keys,
            default_key_used,
        }]))
    }

    fn for_diagnostics(&self, members: &[ClientId]) -> EncryptionConfig {
        let mut resolved: BTreeMap<String, EncryptionMember> = BTreeMap::new();
        for client in members {
            let member_id = client.member_id().to_short_string();
            if resolved.contains_key(&member_id) {
                continue;
            }
            let (keys, default_key_used) = self.resolve(&member_id);
            resolved.insert(
                member_id.clone(),
                EncryptionMember {
                    member_id,
                    keys,
                    default_key_used,
                },
            );
        }

        EncryptionConfig::new(
            RecipientPolicy::ResolvedKeySet(self.default_keys.clone()),
            self.key_store_location.clone(),
        )
        .with_members(resolved.into_values().collect())
    }
}
