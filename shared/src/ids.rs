use bson::oid::ObjectId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Raised when a string is not a 24-character hex ObjectId
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid ID")]
pub struct InvalidIdentifier;

/// Store-native user identifier, carried on the wire as lower-case hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(ObjectId);

impl UserId {
    /// Mint a fresh identifier for a new document
    pub fn generate() -> Self {
        Self(ObjectId::new())
    }

    pub fn decode(raw: &str) -> Result<Self, InvalidIdentifier> {
        if raw.len() != 24 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidIdentifier);
        }
        ObjectId::parse_str(raw)
            .map(Self)
            .map_err(|_| InvalidIdentifier)
    }

    pub fn encode(&self) -> String {
        self.0.to_hex()
    }

    #[cfg(test)]
    pub(crate) fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(ObjectId::from_bytes(bytes))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for UserId {
    type Err = InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for UserId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::decode(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_known_object_id() {
        let id = UserId::decode("5ce930b307a444000179a4e0").unwrap();
        assert_eq!(id.encode(), "5ce930b307a444000179a4e0");
    }

    #[test]
    fn upper_case_hex_is_accepted_and_normalised() {
        let id = UserId::decode("5CE930B307A444000179A4E0").unwrap();
        assert_eq!(id.to_string(), "5ce930b307a444000179a4e0");
    }

    #[test]
    fn rejects_malformed_ids() {
        for raw in [
            "",
            "not-a-hex-id",
            "5ce930b307a444000179a4e",
            "5ce930b307a444000179a4e00",
            "zce930b307a444000179a4e0",
            " 5ce930b307a444000179a4e",
            "5ce930b3-7a444000179a4e0",
        ] {
            assert_eq!(UserId::decode(raw), Err(InvalidIdentifier), "{raw:?}");
        }
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(UserId::generate(), UserId::generate());
    }

    #[test]
    fn serializes_as_hex_string() {
        let id = UserId::decode("5ce930b307a444000179a4e0").unwrap();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::json!("5ce930b307a444000179a4e0"));
        let back: UserId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(bytes in any::<[u8; 12]>()) {
            let id = UserId::from_bytes(bytes);
            prop_assert_eq!(UserId::decode(&id.encode()), Ok(id));
        }

        #[test]
        fn short_or_long_strings_never_decode(raw in "[0-9a-f]{0,23}|[0-9a-f]{25,40}") {
            prop_assert_eq!(UserId::decode(&raw), Err(InvalidIdentifier));
        }
    }
}
