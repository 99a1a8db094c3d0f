//! Import workflow state machine.
//!
//! The workflow is a single enum of stages, each carrying only the data that
//! stage needs, so a stale preview can never outlive a mode switch and a
//! buffer can never coexist with a mapping screen.
//!
//! Every backend call is split in two: `begin_*` validates the request,
//! moves the workflow into its waiting state and hands back an owned request
//! tagged with a ticket; `complete_*` takes that ticket and the backend
//! result. A ticket that no longer matches the waiting state (the user reset,
//! switched mode, or picked another file in the meantime) is reported as
//! [`Completion::Stale`] and changes nothing.

use crate::error::{IngestError, Result};
use crate::mapping::{guess_mapping, ColumnMapping, MappingField, MappingMode};
use crate::review::ReviewBuffer;
use crate::schema::{
    Bucket, BucketId, CandidateTransaction, ColumnPreview, CommitResult, ConfirmEntry,
    StatementFile, TransactionId, UploadMode, UploadSource,
};
use log::{debug, info, warn};
use std::mem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Upload,
    Preview,
    MappingCommit,
    Confirm,
}

impl RequestKind {
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::Upload => "upload",
            RequestKind::Preview => "preview",
            RequestKind::MappingCommit => "mapping commit",
            RequestKind::Confirm => "confirm",
        }
    }

    /// User-facing message for a failed request of this kind.
    pub fn failure_message(&self, err: &IngestError) -> String {
        match self {
            RequestKind::Upload => err.backend_detail().unwrap_or("Upload failed").to_string(),
            RequestKind::Preview => "CSV Analysis failed".to_string(),
            RequestKind::MappingCommit => "CSV Import failed".to_string(),
            RequestKind::Confirm => "Failed to save transactions".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    seq: u64,
    kind: RequestKind,
}

impl RequestTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowStage {
    Idle,
    /// A PDF upload or CSV preview request is in flight.
    Previewing {
        file: StatementFile,
        ticket: RequestTicket,
    },
    Mapping {
        file: StatementFile,
        preview: ColumnPreview,
        mapping: ColumnMapping,
        submitting: Option<RequestTicket>,
    },
    Reviewing {
        buffer: ReviewBuffer,
    },
    Committing {
        buffer: ReviewBuffer,
        ticket: RequestTicket,
    },
}

impl WorkflowStage {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowStage::Idle => "idle",
            WorkflowStage::Previewing { .. } => "previewing",
            WorkflowStage::Mapping { .. } => "mapping",
            WorkflowStage::Reviewing { .. } => "reviewing",
            WorkflowStage::Committing { .. } => "committing",
        }
    }

    fn pending(&self) -> Option<RequestTicket> {
        match self {
            WorkflowStage::Previewing { ticket, .. } | WorkflowStage::Committing { ticket, .. } => {
                Some(*ticket)
            }
            WorkflowStage::Mapping { submitting, .. } => *submitting,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Applied,
    Failed(String),
    Stale,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub ticket: RequestTicket,
    pub file: StatementFile,
    pub attribution: String,
}

#[derive(Debug, Clone)]
pub struct PreviewRequest {
    pub ticket: RequestTicket,
    pub file: StatementFile,
}

#[derive(Debug, Clone)]
pub struct MappingRequest {
    pub ticket: RequestTicket,
    pub file: StatementFile,
    pub mapping: ColumnMapping,
    pub attribution: String,
}

#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub ticket: RequestTicket,
    pub entries: Vec<ConfirmEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportWorkflow {
    source: UploadSource,
    stage: WorkflowStage,
    last_error: Option<String>,
    next_seq: u64,
}

impl Default for ImportWorkflow {
    fn default() -> Self {
        Self::new(UploadSource::default())
    }
}

impl ImportWorkflow {
    pub fn new(source: UploadSource) -> Self {
        Self {
            source,
            stage: WorkflowStage::Idle,
            last_error: None,
            next_seq: 1,
        }
    }

    pub fn source(&self) -> &UploadSource {
        &self.source
    }

    pub fn stage(&self) -> &WorkflowStage {
        &self.stage
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn in_flight(&self) -> Option<RequestKind> {
        self.stage.pending().map(|t| t.kind)
    }

    pub fn preview(&self) -> Option<&ColumnPreview> {
        match &self.stage {
            WorkflowStage::Mapping { preview, .. } => Some(preview),
            _ => None,
        }
    }

    pub fn mapping(&self) -> Option<&ColumnMapping> {
        match &self.stage {
            WorkflowStage::Mapping { mapping, .. } => Some(mapping),
            _ => None,
        }
    }

    pub fn buffer(&self) -> Option<&ReviewBuffer> {
        match &self.stage {
            WorkflowStage::Reviewing { buffer } | WorkflowStage::Committing { buffer, .. } => {
                Some(buffer)
            }
            _ => None,
        }
    }

    fn issue(&mut self, kind: RequestKind) -> RequestTicket {
        let ticket = RequestTicket {
            seq: self.next_seq,
            kind,
        };
        self.next_seq += 1;
        debug!("Issued {} request #{}", kind.name(), ticket.seq);
        ticket
    }

    fn invalid(&self, action: &'static str) -> IngestError {
        IngestError::InvalidStage {
            action,
            stage: self.stage.name(),
        }
    }

    // --- Source selector ---

    /// Switching mode abandons whatever the previous mode had produced.
    pub fn set_mode(&mut self, mode: UploadMode) {
        if self.source.mode == mode {
            return;
        }
        info!("Import mode changed to {}", mode.as_str());
        self.source.mode = mode;
        self.reset();
    }

    pub fn set_attribution(&mut self, attribution: impl Into<String>) -> Result<()> {
        if !matches!(self.stage, WorkflowStage::Idle) {
            return Err(IngestError::AttributionLocked);
        }
        self.source.attribution = attribution.into();
        Ok(())
    }

    /// Drop every transient payload and return to idle. Responses to
    /// requests issued before the reset will be ignored.
    pub fn reset(&mut self) {
        if let Some(ticket) = self.stage.pending() {
            debug!(
                "Abandoning in-flight {} request #{}",
                ticket.kind.name(),
                ticket.seq
            );
        }
        self.stage = WorkflowStage::Idle;
        self.last_error = None;
    }

    fn ensure_file_selectable(&self, kind: RequestKind) -> Result<()> {
        match &self.stage {
            WorkflowStage::Idle => Ok(()),
            WorkflowStage::Mapping {
                submitting: None, ..
            } => Ok(()),
            stage => match stage.pending() {
                Some(ticket) => Err(IngestError::RequestInFlight(ticket.kind.name())),
                None => Err(self.invalid(match kind {
                    RequestKind::Upload => "upload a statement",
                    _ => "preview a CSV file",
                })),
            },
        }
    }

    // --- Extraction requester ---

    pub fn begin_upload(&mut self, file: StatementFile) -> Result<UploadRequest> {
        if self.source.mode != UploadMode::Pdf {
            return Err(self.invalid("upload a PDF statement"));
        }
        self.ensure_file_selectable(RequestKind::Upload)?;
        let ticket = self.issue(RequestKind::Upload);
        info!("Uploading statement {} ({} bytes)", file.name, file.bytes.len());
        self.last_error = None;
        self.stage = WorkflowStage::Previewing {
            file: file.clone(),
            ticket,
        };
        Ok(UploadRequest {
            ticket,
            file,
            attribution: self.source.attribution.clone(),
        })
    }

    pub fn complete_upload(
        &mut self,
        ticket: RequestTicket,
        result: Result<Vec<CandidateTransaction>>,
    ) -> Completion {
        if !self.is_current(ticket, RequestKind::Upload) {
            return self.stale(ticket);
        }
        match result {
            Ok(transactions) => {
                let buffer = ReviewBuffer::from_extracted(transactions, &self.source.attribution);
                info!("Statement extracted {} transactions for review", buffer.len());
                self.stage = WorkflowStage::Reviewing { buffer };
                Completion::Applied
            }
            Err(err) => self.fail_to_idle(ticket, err),
        }
    }

    pub fn begin_preview(&mut self, file: StatementFile) -> Result<PreviewRequest> {
        if self.source.mode != UploadMode::Csv {
            return Err(self.invalid("preview a CSV file"));
        }
        self.ensure_file_selectable(RequestKind::Preview)?;
        let ticket = self.issue(RequestKind::Preview);
        info!("Analysing CSV {} ({} bytes)", file.name, file.bytes.len());
        self.last_error = None;
        self.stage = WorkflowStage::Previewing {
            file: file.clone(),
            ticket,
        };
        Ok(PreviewRequest { ticket, file })
    }

    pub fn complete_preview(
        &mut self,
        ticket: RequestTicket,
        result: Result<ColumnPreview>,
    ) -> Completion {
        if !self.is_current(ticket, RequestKind::Preview) {
            return self.stale(ticket);
        }
        match result {
            Ok(preview) => {
                let file = match mem::replace(&mut self.stage, WorkflowStage::Idle) {
                    WorkflowStage::Previewing { file, .. } => file,
                    other => {
                        self.stage = other;
                        return self.stale(ticket);
                    }
                };
                let mapping = guess_mapping(&preview.headers);
                info!(
                    "CSV preview ready: {} columns, guessed {:?} mapping",
                    preview.headers.len(),
                    mapping.mode
                );
                self.stage = WorkflowStage::Mapping {
                    file,
                    preview,
                    mapping,
                    submitting: None,
                };
                Completion::Applied
            }
            Err(err) => self.fail_to_idle(ticket, err),
        }
    }

    // --- Column mapping resolver ---

    fn mapping_mut(&mut self) -> Result<&mut ColumnMapping> {
        let stage_name = self.stage.name();
        match &mut self.stage {
            WorkflowStage::Mapping {
                submitting: Some(_),
                ..
            } => Err(IngestError::RequestInFlight(RequestKind::MappingCommit.name())),
            WorkflowStage::Mapping { mapping, .. } => Ok(mapping),
            _ => Err(IngestError::InvalidStage {
                action: "edit the column mapping",
                stage: stage_name,
            }),
        }
    }

    pub fn set_mapping_mode(&mut self, mode: MappingMode) -> Result<()> {
        self.mapping_mut()?.set_mode(mode);
        self.last_error = None;
        Ok(())
    }

    pub fn set_mapping_column(&mut self, field: MappingField, header: impl Into<String>) -> Result<()> {
        self.mapping_mut()?.set_column(field, header);
        self.last_error = None;
        Ok(())
    }

    /// Rejected client-side, without issuing a request, when the mapping is
    /// incomplete for its mode.
    pub fn begin_mapping_commit(&mut self) -> Result<MappingRequest> {
        let (file, mapping) = match &self.stage {
            WorkflowStage::Mapping {
                submitting: Some(_),
                ..
            } => return Err(IngestError::RequestInFlight(RequestKind::MappingCommit.name())),
            WorkflowStage::Mapping { file, mapping, .. } => (file.clone(), mapping.clone()),
            _ => return Err(self.invalid("commit a column mapping")),
        };
        mapping.validate()?;

        let ticket = self.issue(RequestKind::MappingCommit);
        if let WorkflowStage::Mapping { submitting, .. } = &mut self.stage {
            *submitting = Some(ticket);
        }
        self.last_error = None;
        info!("Submitting CSV {} with {:?} column mapping", file.name, mapping.mode);
        Ok(MappingRequest {
            ticket,
            file,
            mapping,
            attribution: self.source.attribution.clone(),
        })
    }

    pub fn complete_mapping_commit(
        &mut self,
        ticket: RequestTicket,
        result: Result<Vec<CandidateTransaction>>,
    ) -> Completion {
        if !self.is_current(ticket, RequestKind::MappingCommit) {
            return self.stale(ticket);
        }
        match result {
            Ok(transactions) => {
                let buffer = ReviewBuffer::from_extracted(transactions, &self.source.attribution);
                info!("CSV import produced {} transactions for review", buffer.len());
                self.stage = WorkflowStage::Reviewing { buffer };
                Completion::Applied
            }
            Err(err) => {
                if let WorkflowStage::Mapping { submitting, .. } = &mut self.stage {
                    *submitting = None;
                }
                self.record_failure(ticket, &err)
            }
        }
    }

    // --- Review buffer ---

    /// Row fields stay editable while a confirm is in flight. The request
    /// already carries its own snapshot, and edits made meanwhile survive a
    /// failed confirm.
    fn buffer_mut(&mut self) -> Result<&mut ReviewBuffer> {
        let stage_name = self.stage.name();
        match &mut self.stage {
            WorkflowStage::Reviewing { buffer } | WorkflowStage::Committing { buffer, .. } => Ok(buffer),
            _ => Err(IngestError::InvalidStage {
                action: "edit transactions",
                stage: stage_name,
            }),
        }
    }

    pub fn set_description(&mut self, id: TransactionId, text: impl Into<String>) -> Result<()> {
        self.buffer_mut()?.set_description(id, text)
    }

    pub fn set_category(
        &mut self,
        id: TransactionId,
        bucket_id: Option<BucketId>,
        buckets: &[Bucket],
    ) -> Result<()> {
        self.buffer_mut()?.set_category(id, bucket_id, buckets)
    }

    pub fn set_attribution_for(&mut self, id: TransactionId, spender: impl Into<String>) -> Result<()> {
        self.buffer_mut()?.set_attribution(id, spender)
    }

    /// Rows already sent in a confirm cannot be taken back out of it.
    pub fn remove_transaction(&mut self, id: TransactionId) -> Result<CandidateTransaction> {
        if matches!(self.stage, WorkflowStage::Committing { .. }) {
            return Err(IngestError::RequestInFlight(RequestKind::Confirm.name()));
        }
        self.buffer_mut()?.remove(id)
    }

    /// Throw away the reviewed rows without saving.
    pub fn discard(&mut self) -> Result<()> {
        if matches!(self.stage, WorkflowStage::Committing { .. }) {
            return Err(IngestError::RequestInFlight(RequestKind::Confirm.name()));
        }
        self.buffer_mut()?.clear();
        self.reset();
        Ok(())
    }

    // --- Commit coordinator ---

    pub fn begin_confirm(&mut self) -> Result<ConfirmRequest> {
        let buffer = match mem::replace(&mut self.stage, WorkflowStage::Idle) {
            WorkflowStage::Reviewing { buffer } if buffer.is_empty() => {
                self.stage = WorkflowStage::Reviewing { buffer };
                return Err(IngestError::EmptyBuffer);
            }
            WorkflowStage::Reviewing { buffer } => buffer,
            other => {
                self.stage = other;
                return Err(match self.stage.pending() {
                    Some(ticket) => IngestError::RequestInFlight(ticket.kind.name()),
                    None => self.invalid("confirm transactions"),
                });
            }
        };

        let ticket = self.issue(RequestKind::Confirm);
        let entries = buffer.confirm_payload();
        info!("Confirming {} reviewed transactions", entries.len());
        self.last_error = None;
        self.stage = WorkflowStage::Committing { buffer, ticket };
        Ok(ConfirmRequest { ticket, entries })
    }

    /// On success the buffer is dropped and the source goes back to its
    /// defaults. On failure the buffer returns to review, including any row
    /// edits made while the request was out, so the confirm can be retried.
    pub fn complete_confirm(&mut self, ticket: RequestTicket, result: Result<CommitResult>) -> Completion {
        if !self.is_current(ticket, RequestKind::Confirm) {
            return self.stale(ticket);
        }
        let buffer = match mem::replace(&mut self.stage, WorkflowStage::Idle) {
            WorkflowStage::Committing { buffer, .. } => buffer,
            other => {
                self.stage = other;
                return self.stale(ticket);
            }
        };
        match result {
            Ok(commit) => {
                self.source = UploadSource::default();
                info!("Saved {} verified transactions", commit.confirmed);
                Completion::Applied
            }
            Err(err) => {
                self.stage = WorkflowStage::Reviewing { buffer };
                self.record_failure(ticket, &err)
            }
        }
    }

    // --- helpers ---

    /// A ticket only completes the request kind it was issued for.
    fn is_current(&self, ticket: RequestTicket, expected: RequestKind) -> bool {
        ticket.kind == expected && self.stage.pending() == Some(ticket)
    }

    fn stale(&self, ticket: RequestTicket) -> Completion {
        warn!(
            "Ignoring late {} response #{} (workflow is {})",
            ticket.kind.name(),
            ticket.seq,
            self.stage.name()
        );
        Completion::Stale
    }

    fn fail_to_idle(&mut self, ticket: RequestTicket, err: IngestError) -> Completion {
        self.stage = WorkflowStage::Idle;
        self.record_failure(ticket, &err)
    }

    fn record_failure(&mut self, ticket: RequestTicket, err: &IngestError) -> Completion {
        let message = ticket.kind.failure_message(err);
        warn!("{} request #{} failed: {}", ticket.kind.name(), ticket.seq, err);
        self.last_error = Some(message.clone());
        Completion::Failed(message)
    }
}
