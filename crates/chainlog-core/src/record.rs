use crate::identifier::ClientId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logged message, ready to be archived
///
/// `container` holds the signed ASiC container produced by the message
/// logger; the archiver treats it as opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub id: u64,
    pub query_id: String,
    pub response: bool,
    pub time: DateTime<Utc>,
    pub client: ClientId,
    #[serde(with = "container_bytes")]
    pub container: Vec<u8>,
}

impl ArchiveRecord {
    pub fn new(
        id: u64,
        query_id: impl Into<String>,
        response: bool,
        time: DateTime<Utc>,
        client: ClientId,
        container: Vec<u8>,
    ) -> Self {
        Self {
            id,
            query_id: query_id.into(),
            response,
            time,
            client,
            container,
        }
    }

    /// `request` or `response`
    pub fn direction(&self) -> &'static str {
        if self.response {
            "response"
        } else {
            "request"
        }
    }
}

mod container_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded).map_err(serde::de::Error::custom)
    }
}
