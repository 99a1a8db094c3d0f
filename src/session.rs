use crate::backend::{IngestBackend, BUCKETS_PATH, USER_SETTINGS_PATH};
use crate::cache::{QueryCache, TRANSACTIONS_KEY};
use crate::error::Result;
use crate::notify::{LogNotifier, Notice, Notifier};
use crate::schema::{AttributionOption, Bucket, BucketId, StatementFile, TransactionId, UserSettings};
use crate::workflow::{Completion, ImportWorkflow};
use log::info;

/// Read-only data the import screen needs: the category list and the
/// household's display names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReferenceData {
    pub buckets: Vec<Bucket>,
    pub user: UserSettings,
}

impl ReferenceData {
    pub fn attribution_options(&self) -> Vec<AttributionOption> {
        self.user.attribution_options()
    }
}

/// One import screen: owns the workflow and drives each stage against the
/// backend, reporting outcomes to the notifier.
pub struct ImportSession<B, N = LogNotifier> {
    backend: B,
    notifier: N,
    workflow: ImportWorkflow,
    cache: QueryCache,
    reference: Option<ReferenceData>,
}

impl<B: IngestBackend> ImportSession<B, LogNotifier> {
    pub fn new(backend: B) -> Self {
        Self::with_notifier(backend, LogNotifier)
    }
}

impl<B: IngestBackend, N: Notifier> ImportSession<B, N> {
    pub fn with_notifier(backend: B, notifier: N) -> Self {
        Self {
            backend,
            notifier,
            workflow: ImportWorkflow::default(),
            cache: QueryCache::new(),
            reference: None,
        }
    }

    pub fn workflow(&self) -> &ImportWorkflow {
        &self.workflow
    }

    /// Local edits (mode, attribution, mapping columns, row text) go
    /// straight to the workflow.
    pub fn workflow_mut(&mut self) -> &mut ImportWorkflow {
        &mut self.workflow
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut QueryCache {
        &mut self.cache
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn reference(&self) -> Option<&ReferenceData> {
        self.reference.as_ref()
    }

    /// Fetch buckets and user settings once; later calls reuse them.
    pub async fn load_reference_data(&mut self) -> Result<&ReferenceData> {
        if self.reference.is_none() {
            let (buckets, user) = futures::try_join!(
                self.backend.fetch_buckets(),
                self.backend.fetch_user_settings()
            )?;
            info!("Loaded {} buckets for categorization", buckets.len());
            self.cache.insert(BUCKETS_PATH, serde_json::to_value(&buckets)?);
            self.cache.insert(USER_SETTINGS_PATH, serde_json::to_value(&user)?);
            self.reference = Some(ReferenceData { buckets, user });
        }
        Ok(self.reference.get_or_insert_with(ReferenceData::default))
    }

    /// Change a row's category, resolving its display from the loaded
    /// bucket list.
    pub fn set_category(&mut self, id: TransactionId, bucket_id: Option<BucketId>) -> Result<()> {
        let buckets = self
            .reference
            .as_ref()
            .map(|r| r.buckets.as_slice())
            .unwrap_or(&[]);
        self.workflow.set_category(id, bucket_id, buckets)
    }

    pub async fn upload_pdf(&mut self, file: StatementFile) -> Result<Completion> {
        let request = self.workflow.begin_upload(file)?;
        let result = self
            .backend
            .upload_statement(&request.file, &request.attribution)
            .await;
        let done = self.workflow.complete_upload(request.ticket, result);
        self.report_extraction(&done);
        Ok(done)
    }

    pub async fn preview_csv(&mut self, file: StatementFile) -> Result<Completion> {
        let request = self.workflow.begin_preview(file)?;
        let result = self.backend.preview_csv(&request.file).await;
        let done = self.workflow.complete_preview(request.ticket, result);
        if let Completion::Failed(message) = &done {
            self.notifier.notify(Notice::error(message.clone()));
        }
        Ok(done)
    }

    pub async fn commit_mapping(&mut self) -> Result<Completion> {
        let request = self.workflow.begin_mapping_commit()?;
        let result = self
            .backend
            .import_csv(&request.file, &request.mapping, &request.attribution)
            .await;
        let done = self.workflow.complete_mapping_commit(request.ticket, result);
        self.report_extraction(&done);
        Ok(done)
    }

    /// Save the reviewed rows as verified. On success cached transaction
    /// lists are marked stale.
    pub async fn confirm(&mut self) -> Result<Completion> {
        let request = self.workflow.begin_confirm()?;
        let count = request.entries.len();
        let result = self.backend.confirm(&request.entries).await;
        let done = self.workflow.complete_confirm(request.ticket, result);
        match &done {
            Completion::Applied => {
                self.cache.invalidate_prefix(TRANSACTIONS_KEY);
                self.notifier
                    .notify(Notice::success(format!("Saved {} transactions", count)));
            }
            Completion::Failed(message) => self.notifier.notify(Notice::error(message.clone())),
            Completion::Stale => {}
        }
        Ok(done)
    }

    fn report_extraction(&self, done: &Completion) {
        match done {
            Completion::Applied => {
                let count = self.workflow.buffer().map(|b| b.len()).unwrap_or(0);
                self.notifier.notify(Notice::success(format!(
                    "{} transactions ready for review",
                    count
                )));
            }
            Completion::Failed(message) => self.notifier.notify(Notice::error(message.clone())),
            Completion::Stale => {}
        }
    }
}
