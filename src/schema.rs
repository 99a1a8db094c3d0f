use crate::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

pub type TransactionId = i64;
pub type BucketId = i64;

pub const DEFAULT_ATTRIBUTION: &str = "Joint";
pub const DEFAULT_PREVIEW_ROW_LIMIT: usize = 5;

/// Rows scoring above this are shown as auto-matched; everything else is
/// flagged for review but still committed.
pub const AUTO_MATCH_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    #[default]
    Pdf,
    Csv,
}

impl UploadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadMode::Pdf => "pdf",
            UploadMode::Csv => "csv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSource {
    pub mode: UploadMode,
    pub attribution: String,
}

impl Default for UploadSource {
    fn default() -> Self {
        Self {
            mode: UploadMode::Pdf,
            attribution: DEFAULT_ATTRIBUTION.to_string(),
        }
    }
}

/// A statement file held in memory between selection and upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl StatementFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .to_string();
        Self {
            name,
            mime_type,
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("Invalid file name: {}", path.display()),
                )
            })?
            .to_string();
        let bytes = fs::read(path).await?;
        Ok(Self::new(name, bytes))
    }
}

/// Raw column preview returned by the CSV analysis endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPreview {
    pub headers: Vec<String>,
    #[serde(deserialize_with = "deserialize_cells")]
    pub rows: Vec<BTreeMap<String, String>>,
    #[serde(default = "default_row_limit")]
    pub row_limit: usize,
}

fn default_row_limit() -> usize {
    DEFAULT_PREVIEW_ROW_LIMIT
}

// Preview cells arrive as whatever JSON the backend's CSV reader produced;
// the mapping screen only ever shows them as text.
fn deserialize_cells<'de, D>(deserializer: D) -> std::result::Result<Vec<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<BTreeMap<String, serde_json::Value>> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(header, value)| {
                    let cell = match value {
                        serde_json::Value::Null => String::new(),
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (header, cell)
                })
                .collect()
        })
        .collect())
}

impl ColumnPreview {
    pub fn cell(&self, row: usize, header: &str) -> Option<&str> {
        self.rows.get(row)?.get(header).map(String::as_str)
    }

    /// Rows the mapping screen should display.
    pub fn visible_rows(&self) -> &[BTreeMap<String, String>] {
        let end = self.rows.len().min(self.row_limit);
        &self.rows[..end]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: BucketId,
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
}

/// Denormalized category shown next to a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRef {
    pub id: BucketId,
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
}

impl From<&Bucket> for BucketRef {
    fn from(bucket: &Bucket) -> Self {
        Self {
            id: bucket.id,
            name: bucket.name.clone(),
            group: bucket.group.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub name_a: Option<String>,
    #[serde(default)]
    pub name_b: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributionOption {
    pub value: String,
    pub label: String,
}

impl UserSettings {
    /// Spender choices offered on the import screen, with the household
    /// members' configured names as labels.
    pub fn attribution_options(&self) -> Vec<AttributionOption> {
        let label = |name: &Option<String>, fallback: &str| {
            name.as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };
        vec![
            AttributionOption {
                value: DEFAULT_ATTRIBUTION.to_string(),
                label: DEFAULT_ATTRIBUTION.to_string(),
            },
            AttributionOption {
                value: "User A".to_string(),
                label: label(&self.name_a, "User A"),
            },
            AttributionOption {
                value: "User B".to_string(),
                label: label(&self.name_b, "User B"),
            },
        ]
    }
}

/// A transaction extracted from a statement, awaiting review.
///
/// Amounts are negative for money leaving the account and positive for
/// money coming in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTransaction {
    pub id: TransactionId,
    pub date: NaiveDate,
    pub description: String,
    #[serde(default)]
    pub raw_description: String,
    pub amount: f64,
    #[serde(default)]
    pub bucket_id: Option<BucketId>,
    #[serde(default)]
    pub bucket: Option<BucketRef>,
    #[serde(default)]
    pub spender: String,
    #[serde(default)]
    pub category_confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    AutoMatched,
    Review,
}

impl ReviewStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReviewStatus::AutoMatched => "Auto-Matched",
            ReviewStatus::Review => "Review",
        }
    }
}

impl CandidateTransaction {
    pub fn status(&self) -> ReviewStatus {
        if self.category_confidence > AUTO_MATCH_THRESHOLD {
            ReviewStatus::AutoMatched
        } else {
            ReviewStatus::Review
        }
    }

    pub fn is_outflow(&self) -> bool {
        self.amount < 0.0
    }
}

/// One row of the batch confirm payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmEntry {
    pub id: TransactionId,
    pub bucket_id: Option<BucketId>,
    pub is_verified: bool,
    pub spender: String,
}

impl From<&CandidateTransaction> for ConfirmEntry {
    fn from(txn: &CandidateTransaction) -> Self {
        Self {
            id: txn.id,
            bucket_id: txn.bucket_id,
            is_verified: true,
            spender: txn.spender.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitResult {
    pub confirmed: usize,
    pub response: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(confidence: f64) -> CandidateTransaction {
        CandidateTransaction {
            id: 1,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            description: "Coffee".to_string(),
            raw_description: "COFFEE 123".to_string(),
            amount: -4.5,
            bucket_id: None,
            bucket: None,
            spender: "Joint".to_string(),
            category_confidence: confidence,
        }
    }

    #[test]
    fn test_status_threshold_is_exclusive() {
        assert_eq!(txn(0.81).status(), ReviewStatus::AutoMatched);
        assert_eq!(txn(0.8).status(), ReviewStatus::Review);
        assert_eq!(txn(0.0).status().label(), "Review");
    }

    #[test]
    fn test_preview_cells_become_text() {
        let json = r#"{
            "headers": ["Date", "Amount", "Memo"],
            "rows": [{"Date": "2024-01-02", "Amount": -12.5, "Memo": null}]
        }"#;
        let preview: ColumnPreview = serde_json::from_str(json).unwrap();
        assert_eq!(preview.row_limit, DEFAULT_PREVIEW_ROW_LIMIT);
        assert_eq!(preview.cell(0, "Amount"), Some("-12.5"));
        assert_eq!(preview.cell(0, "Memo"), Some(""));
        assert_eq!(preview.cell(1, "Date"), None);
    }

    #[test]
    fn test_visible_rows_respects_limit() {
        let row: BTreeMap<String, String> = [("Date".to_string(), "2024-01-02".to_string())].into();
        let preview = ColumnPreview {
            headers: vec!["Date".to_string()],
            rows: vec![row; 8],
            row_limit: 3,
        };
        assert_eq!(preview.visible_rows().len(), 3);
    }

    #[test]
    fn test_candidate_defaults_from_sparse_payload() {
        let json = r#"{"id": 7, "date": "2024-02-29", "description": "Rent", "amount": -1500.0}"#;
        let parsed: CandidateTransaction = serde_json::from_str(json).unwrap();
        assert!(parsed.is_outflow());
        assert_eq!(parsed.bucket_id, None);
        assert_eq!(parsed.category_confidence, 0.0);
        assert!(parsed.spender.is_empty());
    }

    #[test]
    fn test_attribution_options_use_names() {
        let settings = UserSettings {
            name_a: Some("Alex".to_string()),
            name_b: Some("  ".to_string()),
        };
        let options = settings.attribution_options();
        assert_eq!(options[0].value, "Joint");
        assert_eq!(options[1].label, "Alex");
        assert_eq!(options[1].value, "User A");
        assert_eq!(options[2].label, "User B");
    }

    #[test]
    fn test_confirm_entry_marks_verified() {
        let entry = ConfirmEntry::from(&txn(0.5));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["is_verified"], true);
        assert_eq!(value["spender"], "Joint");
        assert!(value["bucket_id"].is_null());
    }

    #[test]
    fn test_statement_file_guesses_mime() {
        let file = StatementFile::new("march.csv", b"Date,Amount\n".to_vec());
        assert_eq!(file.mime_type, "text/csv");
        let file = StatementFile::new("march.pdf", Vec::new());
        assert_eq!(file.mime_type, "application/pdf");
    }
}
