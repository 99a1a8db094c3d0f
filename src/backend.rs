use crate::error::Result;
use crate::mapping::ColumnMapping;
use crate::schema::{
    Bucket, CandidateTransaction, ColumnPreview, CommitResult, ConfirmEntry, StatementFile,
    UserSettings,
};
use serde::Deserialize;
use std::future::Future;

pub const UPLOAD_PATH: &str = "/ingest/upload";
pub const CSV_PREVIEW_PATH: &str = "/ingest/csv/preview";
pub const CSV_IMPORT_PATH: &str = "/ingest/csv";
pub const CONFIRM_PATH: &str = "/ingest/confirm";
pub const BUCKETS_PATH: &str = "/settings/buckets";
pub const USER_SETTINGS_PATH: &str = "/settings/user";

/// The ingestion endpoints of the finance backend.
pub trait IngestBackend {
    /// Statement (PDF) extraction: file plus attribution in, parsed rows out.
    fn upload_statement(
        &self,
        file: &StatementFile,
        attribution: &str,
    ) -> impl Future<Output = Result<Vec<CandidateTransaction>>> + Send;

    fn preview_csv(&self, file: &StatementFile) -> impl Future<Output = Result<ColumnPreview>> + Send;

    fn import_csv(
        &self,
        file: &StatementFile,
        mapping: &ColumnMapping,
        attribution: &str,
    ) -> impl Future<Output = Result<Vec<CandidateTransaction>>> + Send;

    fn confirm(&self, entries: &[ConfirmEntry]) -> impl Future<Output = Result<CommitResult>> + Send;

    fn fetch_buckets(&self) -> impl Future<Output = Result<Vec<Bucket>>> + Send;

    fn fetch_user_settings(&self) -> impl Future<Output = Result<UserSettings>> + Send;
}

/// `{ "detail": "..." }` or `{ "detail": [{ "msg": "..." }, ...] }`
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    pub detail: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Items(Vec<ErrorItem>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorItem {
    pub msg: String,
}

impl ErrorPayload {
    pub fn message(&self) -> String {
        match &self.detail {
            ErrorDetail::Message(msg) => msg.clone(),
            ErrorDetail::Items(items) => items
                .iter()
                .map(|item| item.msg.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Best-effort display text from an error response body. Bodies that are not
/// the expected payload yield an empty string.
pub fn extract_error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorPayload>(body)
        .map(|payload| payload.message())
        .unwrap_or_default()
}
