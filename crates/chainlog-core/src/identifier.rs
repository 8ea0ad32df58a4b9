//! Client identifiers.
//!
//! A client is a member (`INSTANCE/CLASS/CODE`) or one of its subsystems
//! (`INSTANCE/CLASS/CODE/SUBSYSTEM`). The short form without subsystem is
//! the member id used to look up encryption keys.

use crate::errors::{ChainLogError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId {
    instance: String,
    member_class: String,
    member_code: String,
    subsystem_code: Option<String>,
}

impl ClientId {
    pub fn member(
        instance: impl Into<String>,
        member_class: impl Into<String>,
        member_code: impl Into<String>,
    ) -> Self {
        Self {
            instance: instance.into(),
            member_class: member_class.into(),
            member_code: member_code.into(),
            subsystem_code: None,
        }
    }

    pub fn subsystem(
        instance: impl Into<String>,
        member_class: impl Into<String>,
        member_code: impl Into<String>,
        subsystem_code: impl Into<String>,
    ) -> Self {
        Self {
            subsystem_code: Some(subsystem_code.into()),
            ..Self::member(instance, member_class, member_code)
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn member_class(&self) -> &str {
        &self.member_class
    }

    pub fn member_code(&self) -> &str {
        &self.member_code
    }

    pub fn subsystem_code(&self) -> Option<&str> {
        self.subsystem_code.as_deref()
    }

    /// The owning member, without subsystem
    pub fn member_id(&self) -> ClientId {
        Self::member(&self.instance, &self.member_class, &self.member_code)
    }

    /// `INSTANCE/CLASS/CODE[/SUBSYSTEM]`
    pub fn to_short_string(&self) -> String {
        match &self.subsystem_code {
            Some(sub) => format!(
                "{}/{}/{}/{}",
                self.instance, self.member_class, self.member_code, sub
            ),
            None => format!(
                "{}/{}/{}",
                self.instance, self.member_class, self.member_code
            ),
        }
    }

    /// Same member, regardless of subsystem
    pub fn same_member(&self, other: &ClientId) -> bool {
        self.instance == other.instance
            && self.member_class == other.member_class
            && self.member_code == other.member_code
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_short_string())
    }
}

impl FromStr for ClientId {
    type Err = crate::errors::ExError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        let invalid = || -> crate::errors::ExError {
            ChainLogError::InvalidClientId {
                value: s.to_string(),
            }
            .into()
        };

        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(invalid());
        }

        match parts.as_slice() {
            [instance, class, code] => Ok(Self::member(*instance, *class, *code)),
            [instance, class, code, sub] => Ok(Self::subsystem(*instance, *class, *code, *sub)),
            _ => Err(invalid()),
        }
    }
}
