use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Who an archive is encrypted for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientPolicy {
    /// Archives are written in plain
    Disabled,
    /// One server-wide key; `None` means the key store's primary key
    SingleDefaultKey(Option<String>),
    /// Keys resolved for one member
    ResolvedKeySet(BTreeSet<String>),
}

/// Diagnostic view of the keys a member's archives are encrypted with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncryptionMember {
    pub member_id: String,
    pub keys: BTreeSet<String>,
    pub default_key_used: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionConfig {
    policy: RecipientPolicy,
    key_store_location: Option<PathBuf>,
    members: Vec<EncryptionMember>,
}

impl EncryptionConfig {
    pub fn disabled() -> Self {
        Self {
            policy: RecipientPolicy::Disabled,
            key_store_location: None,
            members: Vec::new(),
        }
    }

    pub fn new(policy: RecipientPolicy, key_store_location: Option<PathBuf>) -> Self {
        Self {
            policy,
            key_store_location,
            members: Vec::new(),
        }
    }

    pub fn with_members(mut self, members: Vec<EncryptionMember>) -> Self {
        self.members = members;
        self
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.policy, RecipientPolicy::Disabled)
    }

    pub fn policy(&self) -> &RecipientPolicy {
        &self.policy
    }

    /// Explicit recipient key ids; empty means the key store's own key
    pub fn recipients(&self) -> Vec<String> {
        match &self.policy {
            RecipientPolicy::Disabled | RecipientPolicy::SingleDefaultKey(None) => Vec::new(),
            RecipientPolicy::SingleDefaultKey(Some(key)) => vec![key.clone()],
            RecipientPolicy::ResolvedKeySet(keys) => keys.iter().cloned().collect(),
        }
    }

    pub fn key_store_location(&self) -> Option<&Path> {
        self.key_store_location.as_deref()
    }

    pub fn members(&self) -> &[EncryptionMember] {
        &self.members
    }
}
