//! Archive grouping strategies.
//!
//! Records are archived in partitions: all together, one partition per
//! member, or one per subsystem. A partition (`Grouping`) knows its owning
//! client, if any, and decides whether a record belongs to it.

use crate::identifier::ClientId;
use crate::record::ArchiveRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingStrategy {
    #[default]
    None,
    Member,
    Subsystem,
}

impl GroupingStrategy {
    /// Grouping that `client`'s records fall into
    pub fn for_client(&self, client: &ClientId) -> Grouping {
        match self {
            GroupingStrategy::None => Grouping::None,
            GroupingStrategy::Member => Grouping::ByMember(client.member_id()),
            GroupingStrategy::Subsystem => Grouping::BySubsystem(client.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grouping {
    None,
    ByMember(ClientId),
    BySubsystem(ClientId),
}

impl Grouping {
    pub fn client(&self) -> Option<&ClientId> {
        match self {
            Grouping::None => None,
            Grouping::ByMember(client) | Grouping::BySubsystem(client) => Some(client),
        }
    }

    /// Does `record` belong to this grouping
    pub fn matches(&self, record: &ArchiveRecord) -> bool {
        match self {
            Grouping::None => true,
            Grouping::ByMember(member) => member.same_member(&record.client),
            Grouping::BySubsystem(client) => *client == record.client,
        }
    }

    /// Distinct key per grouping, `None` for the ungrouped partition
    ///
    /// Components are joined with `/`; a `/` or `%` inside a component is
    /// percent-encoded, so two clients never share a key.
    pub fn key(&self) -> Option<String> {
        self.client().map(|client| {
            let mut parts = vec![client.instance(), client.member_class(), client.member_code()];
            parts.extend(client.subsystem_code());
            parts
                .iter()
                .map(|p| p.replace('%', "%25").replace('/', "%2F"))
                .collect::<Vec<_>>()
                .join("/")
        })
    }

    /// File-name safe grouping name, `None` for the ungrouped partition
    ///
    /// Readable but lossy; use [`Grouping::key`] to tell groupings apart.
    pub fn name(&self) -> Option<String> {
        self.client().map(|client| {
            client
                .to_short_string()
                .chars()
                .map(|c| match c {
                    '/' => '-',
                    c if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' => c,
                    _ => '_',
                })
                .collect()
        })
    }
}
