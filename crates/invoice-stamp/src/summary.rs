//! The handful of invoice fields that go into the scanner payload.

use invoice_stamp_core::StructuredDocument;
use serde::{Deserialize, Serialize};

use crate::config::SummaryPaths;
use crate::error::{Result, StampError};

/// Seller identity, timestamp, and totals, as text exactly as they appear in
/// the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub seller_name: String,
    pub vat_number: String,
    /// `date` or `dateTtime`, e.g. `2022-09-07T12:21:28`.
    pub timestamp: String,
    pub total_with_vat: String,
    pub vat_total: String,
}

impl InvoiceSummary {
    /// Read the summary from a document using local-name paths.
    ///
    /// Every field except the issue time is required; a missing or empty
    /// field is a malformed document naming that field.
    pub fn from_document(document: &StructuredDocument, paths: &SummaryPaths) -> Result<Self> {
        let date = required(document, "issue_date", &paths.issue_date)?;
        let timestamp = match optional(document, &paths.issue_time) {
            Some(time) => format!("{}T{}", date, time),
            None => date,
        };

        Ok(Self {
            seller_name: required(document, "seller_name", &paths.seller_name)?,
            vat_number: required(document, "vat_number", &paths.vat_number)?,
            timestamp,
            total_with_vat: required(document, "total_with_vat", &paths.total_with_vat)?,
            vat_total: required(document, "vat_total", &paths.vat_total)?,
        })
    }
}

fn optional(document: &StructuredDocument, path: &[String]) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    document.text_at(path).filter(|t| !t.is_empty())
}

fn required(document: &StructuredDocument, field: &str, path: &[String]) -> Result<String> {
    optional(document, path).ok_or_else(|| {
        StampError::malformed(
            format!("summary field {}", field),
            format!("no text at {}", path.join("/")),
        )
    })
}
