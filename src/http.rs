use crate::backend::{
    extract_error_detail, IngestBackend, BUCKETS_PATH, CONFIRM_PATH, CSV_IMPORT_PATH,
    CSV_PREVIEW_PATH, UPLOAD_PATH, USER_SETTINGS_PATH,
};
use crate::config::ClientConfig;
use crate::error::{IngestError, Result};
use crate::mapping::ColumnMapping;
use crate::schema::{
    Bucket, CandidateTransaction, ColumnPreview, CommitResult, ConfirmEntry, StatementFile,
    UserSettings,
};
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn file_form(file: &StatementFile) -> Result<Form> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)?;
        Ok(Form::new().part("file", part))
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T> {
        let url = self.config.endpoint(path);
        debug!("POST {} (multipart)", url);
        let res = self.authorize(self.client.post(&url)).multipart(form).send().await?;
        read_json(res).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.config.endpoint(path);
        debug!("GET {}", url);
        let res = self.authorize(self.client.get(&url)).send().await?;
        read_json(res).await
    }
}

async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await?;
        return Err(IngestError::Backend {
            status: status.as_u16(),
            detail: extract_error_detail(&body),
        });
    }
    Ok(res.json().await?)
}

/// Multipart form for the CSV import endpoint: the file, the active mapping
/// columns and the attribution.
pub fn csv_import_form(file: &StatementFile, mapping: &ColumnMapping, attribution: &str) -> Result<Form> {
    let mut form = HttpBackend::file_form(file)?;
    for (key, header) in mapping.form_fields() {
        form = form.text(key, header);
    }
    Ok(form.text("spender", attribution.to_string()))
}

impl IngestBackend for HttpBackend {
    async fn upload_statement(
        &self,
        file: &StatementFile,
        attribution: &str,
    ) -> Result<Vec<CandidateTransaction>> {
        let form = Self::file_form(file)?.text("spender", attribution.to_string());
        self.post_form(UPLOAD_PATH, form).await
    }

    async fn preview_csv(&self, file: &StatementFile) -> Result<ColumnPreview> {
        self.post_form(CSV_PREVIEW_PATH, Self::file_form(file)?).await
    }

    async fn import_csv(
        &self,
        file: &StatementFile,
        mapping: &ColumnMapping,
        attribution: &str,
    ) -> Result<Vec<CandidateTransaction>> {
        mapping.validate()?;
        let form = csv_import_form(file, mapping, attribution)?;
        self.post_form(CSV_IMPORT_PATH, form).await
    }

    async fn confirm(&self, entries: &[ConfirmEntry]) -> Result<CommitResult> {
        let url = self.config.endpoint(CONFIRM_PATH);
        debug!("POST {} ({} rows)", url, entries.len());
        let res = self
            .authorize(self.client.post(&url))
            .json(entries)
            .send()
            .await?;
        let response: serde_json::Value = read_json(res).await?;
        Ok(CommitResult {
            confirmed: entries.len(),
            response,
        })
    }

    async fn fetch_buckets(&self) -> Result<Vec<Bucket>> {
        self.get_json(BUCKETS_PATH).await
    }

    async fn fetch_user_settings(&self) -> Result<UserSettings> {
        self.get_json(USER_SETTINGS_PATH).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{MappingField, MappingMode};

    #[test]
    fn test_backend_builds_with_timeout() {
        let config = ClientConfig::new("http://127.0.0.1:9")
            .unwrap()
            .with_timeout(std::time::Duration::from_secs(5))
            .with_bearer_token("t");
        let backend = HttpBackend::new(config).unwrap();
        assert_eq!(backend.config().endpoint(CONFIRM_PATH), "http://127.0.0.1:9/ingest/confirm");
    }

    #[test]
    fn test_csv_form_builds_for_split_mapping() {
        let file = StatementFile::new("may.csv", b"Date,Memo,Out\n".to_vec());
        let mut mapping = ColumnMapping {
            mode: MappingMode::Split,
            date_column: "Date".to_string(),
            description_column: "Memo".to_string(),
            ..Default::default()
        };
        mapping.set_column(MappingField::Debit, "Out");
        assert!(csv_import_form(&file, &mapping, "Joint").is_ok());
    }

    #[tokio::test]
    async fn test_import_rejects_incomplete_mapping_before_sending() {
        let backend = HttpBackend::new(ClientConfig::new("http://127.0.0.1:9").unwrap()).unwrap();
        let file = StatementFile::new("may.csv", Vec::new());
        let err = backend
            .import_csv(&file, &ColumnMapping::default(), "Joint")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::IncompleteMapping { .. }));
    }
}
