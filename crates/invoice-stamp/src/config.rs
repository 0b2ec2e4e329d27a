//! Stamping configuration.
//!
//! Every wire constant (placeholder digest, marker names, TLV tags) lives
//! here with its standard value as the default, so a deployment can load a
//! JSON file without restating what it does not change.

use std::time::Duration;

use invoice_stamp_core::{Digest, ExclusionRules, PLACEHOLDER_DIGEST_HEX};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StampError};

/// Identifiers written into the `ID` child of each stamp reference element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Markers {
    /// Reference carrying the encoded TLV payload.
    pub qr: String,
    /// Reference carrying the sequence counter.
    pub counter: String,
    /// Reference carrying the previous document's digest.
    pub previous_digest: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            qr: "QR".to_string(),
            counter: "ICV".to_string(),
            previous_digest: "PIH".to_string(),
        }
    }
}

impl Markers {
    pub fn all(&self) -> [&str; 3] {
        [
            self.qr.as_str(),
            self.counter.as_str(),
            self.previous_digest.as_str(),
        ]
    }
}

/// TLV tag numbers for each payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConvention {
    pub seller_name: u8,
    pub vat_number: u8,
    pub timestamp: u8,
    pub total_with_vat: u8,
    pub vat_total: u8,
    pub digest: u8,
    pub signature: u8,
    pub public_key: u8,
}

impl Default for TagConvention {
    fn default() -> Self {
        Self {
            seller_name: 1,
            vat_number: 2,
            timestamp: 3,
            total_with_vat: 4,
            vat_total: 5,
            digest: 6,
            signature: 7,
            public_key: 8,
        }
    }
}

impl TagConvention {
    pub fn all(&self) -> [u8; 8] {
        [
            self.seller_name,
            self.vat_number,
            self.timestamp,
            self.total_with_vat,
            self.vat_total,
            self.digest,
            self.signature,
            self.public_key,
        ]
    }
}

/// Local-name paths, below the document root, of the summary fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryPaths {
    pub seller_name: Vec<String>,
    pub vat_number: Vec<String>,
    pub issue_date: Vec<String>,
    /// Optional: when absent from the document the timestamp is the date alone.
    pub issue_time: Vec<String>,
    pub total_with_vat: Vec<String>,
    pub vat_total: Vec<String>,
}

fn path(steps: &[&str]) -> Vec<String> {
    steps.iter().map(|s| s.to_string()).collect()
}

impl Default for SummaryPaths {
    fn default() -> Self {
        Self {
            seller_name: path(&[
                "AccountingSupplierParty",
                "Party",
                "PartyLegalEntity",
                "RegistrationName",
            ]),
            vat_number: path(&[
                "AccountingSupplierParty",
                "Party",
                "PartyTaxScheme",
                "CompanyID",
            ]),
            issue_date: path(&["IssueDate"]),
            issue_time: path(&["IssueTime"]),
            total_with_vat: path(&["LegalMonetaryTotal", "TaxInclusiveAmount"]),
            vat_total: path(&["TaxTotal", "TaxAmount"]),
        }
    }
}

/// Configuration for a [`DocumentStamper`](crate::DocumentStamper).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StampConfig {
    /// Hex digest used as the previous digest of an entity's first document.
    pub placeholder_digest_hex: String,
    pub markers: Markers,
    pub tags: TagConvention,
    /// Elements removed before hashing.
    pub exclusion: ExclusionRules,
    pub summary: SummaryPaths,
    /// Reserve/commit rounds before giving up with a contention error.
    pub max_commit_attempts: u32,
    /// How long one reservation may wait for the entity. `None` waits forever.
    pub reserve_timeout_ms: Option<u64>,
    /// Put the signer's public key in the payload and the result.
    pub embed_public_key: bool,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self {
            placeholder_digest_hex: PLACEHOLDER_DIGEST_HEX.to_string(),
            markers: Markers::default(),
            tags: TagConvention::default(),
            exclusion: ExclusionRules::default(),
            summary: SummaryPaths::default(),
            max_commit_attempts: 3,
            reserve_timeout_ms: None,
            embed_public_key: true,
        }
    }
}

impl StampConfig {
    /// Parse and validate a JSON configuration. Missing keys take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StampConfig =
            serde_json::from_str(json).map_err(|e| StampError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The placeholder digest as a value.
    pub fn placeholder(&self) -> Result<Digest> {
        Digest::from_hex(&self.placeholder_digest_hex)
            .map_err(|e| StampError::Config(format!("placeholder_digest_hex: {}", e)))
    }

    pub fn reserve_timeout(&self) -> Option<Duration> {
        self.reserve_timeout_ms.map(Duration::from_millis)
    }

    /// Check the settings are consistent with each other.
    ///
    /// Every stamp marker must also be an exclusion marker, otherwise a
    /// re-stamped document would hash differently from its first stamp.
    pub fn validate(&self) -> Result<()> {
        self.placeholder()?;

        if self.max_commit_attempts == 0 {
            return Err(StampError::Config(
                "max_commit_attempts must be at least 1".into(),
            ));
        }

        let markers = self.markers.all();
        for (i, marker) in markers.iter().enumerate() {
            if marker.trim().is_empty() {
                return Err(StampError::Config("stamp markers must not be empty".into()));
            }
            if markers[..i].contains(marker) {
                return Err(StampError::Config(format!("duplicate stamp marker {:?}", marker)));
            }
            if !self.exclusion.markers.iter().any(|m| m == marker) {
                return Err(StampError::Config(format!(
                    "stamp marker {:?} is not excluded from hashing",
                    marker
                )));
            }
        }

        let tags = self.tags.all();
        for (i, tag) in tags.iter().enumerate() {
            if *tag == 0 {
                return Err(StampError::Config("TLV tag 0 is reserved".into()));
            }
            if tags[..i].contains(tag) {
                return Err(StampError::Config(format!("duplicate TLV tag {}", tag)));
            }
        }

        Ok(())
    }
}
