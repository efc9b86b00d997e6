//! Data shapes shared by the integrations and the command surface.

mod command;
mod snapshot;

pub use command::{CommandOutcome, CommandRequest};
pub use snapshot::{
    AdBlockSnapshot, DomainSnapshot, MediaRequest, MediaRequestSnapshot, ReachabilitySnapshot,
    RepositorySnapshot, RepositorySummary, TorrentItem, TorrentSnapshot, TorrentState,
    TransferStats,
};

use serde::{Deserialize, Deserializer};

/// Deserialize an id that upstream sends as either a string or an integer.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer")
        }

        fn visit_str<E>(self, value: &str) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

/// Deserialize a nullable number as zero.
pub(crate) fn deserialize_nullable_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u64>::deserialize(deserializer).map(|opt| opt.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Row {
        #[serde(deserialize_with = "deserialize_id")]
        id: String,
        #[serde(default, deserialize_with = "deserialize_nullable_u64")]
        count: u64,
    }

    #[test]
    fn test_id_accepts_string_or_integer() {
        let row: Row = serde_json::from_str(r#"{"id": 12, "count": null}"#).unwrap();
        assert_eq!(row.id, "12");
        assert_eq!(row.count, 0);

        let row: Row = serde_json::from_str(r#"{"id": "abc", "count": 3}"#).unwrap();
        assert_eq!(row.id, "abc");
        assert_eq!(row.count, 3);
    }
}
