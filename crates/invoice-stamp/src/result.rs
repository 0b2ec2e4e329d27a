//! The record returned once per successful stamp.

use invoice_stamp_core::{Digest, EntityId};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Everything the transport side needs about one stamped document.
///
/// Digests serialize as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampResult {
    pub entity: EntityId,
    /// Position of the document in the entity's chain, starting at 1.
    pub counter: u64,
    #[serde(with = "hex_digest")]
    pub digest: Digest,
    #[serde(with = "hex_digest")]
    pub previous_digest: Digest,
    /// Base64 of the DER signature.
    pub signature: String,
    /// Base64 of the TLV payload.
    pub encoded_payload: String,
    /// Base64 body of the signer's public key PEM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl StampResult {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

mod hex_digest {
    use invoice_stamp_core::Digest;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(digest: &Digest, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&digest.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Digest, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_hex(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StampResult {
        StampResult {
            entity: EntityId::from("399999999900003"),
            counter: 2,
            digest: Digest::of(b"doc"),
            previous_digest: Digest::placeholder(),
            signature: "MEUCIQ==".into(),
            encoded_payload: "AQRBY21l".into(),
            public_key: None,
        }
    }

    #[test]
    fn test_json_uses_hex_digests() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["previous_digest"], invoice_stamp_core::PLACEHOLDER_DIGEST_HEX);
        assert_eq!(value["counter"], 2);
        assert!(value.get("public_key").is_none());
        assert_eq!(StampResult::from_json(&json).unwrap(), sample());
    }

    #[test]
    fn test_bad_digest_rejected() {
        let json = sample().to_json().unwrap().replace(&Digest::of(b"doc").to_hex(), "00");
        assert!(StampResult::from_json(&json).is_err());
    }
}
