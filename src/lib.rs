//! # Statement Ingest
//!
//! Client-side workflow for importing bank statements into a personal-finance
//! backend and reviewing the extracted transactions before they are saved.
//!
//! ## Stages
//!
//! - **Source selection**: PDF statement or CSV export, plus the household
//!   member ("spender") the transactions belong to
//! - **Extraction**: a PDF goes straight to the backend for parsing; a CSV is
//!   first previewed so its columns can be mapped
//! - **Column mapping** (CSV only): keyword auto-guess, then user override
//! - **Review**: per-row edits to description, category and spender
//! - **Confirm**: one batch request marks every row verified
//!
//! [`ImportWorkflow`] is the synchronous state machine; [`ImportSession`]
//! drives it against an [`IngestBackend`] such as [`HttpBackend`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use statement_ingest::*;
//!
//! let backend = HttpBackend::new(ClientConfig::from_env()?)?;
//! let mut session = ImportSession::new(backend);
//! session.load_reference_data().await?;
//!
//! session.workflow_mut().set_mode(UploadMode::Csv);
//! let file = StatementFile::from_path("march.csv".as_ref()).await?;
//! session.preview_csv(file).await?;
//! session.workflow_mut().set_mapping_mode(MappingMode::Split)?;
//! session.commit_mapping().await?;
//!
//! session.workflow_mut().set_attribution_for(42, "User A")?;
//! session.confirm().await?;
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod mapping;
pub mod notify;
pub mod review;
pub mod schema;
pub mod session;
pub mod workflow;

#[cfg(feature = "http")]
pub mod http;

pub use backend::*;
pub use cache::{CacheEntry, QueryCache, TRANSACTIONS_KEY};
pub use config::ClientConfig;
pub use error::{IngestError, Result};
pub use mapping::{guess_mapping, ColumnMapping, MappingField, MappingMode};
pub use notify::*;
pub use review::{BufferTotals, ReviewBuffer};
pub use schema::*;
pub use session::{ImportSession, ReferenceData};
pub use workflow::*;

#[cfg(feature = "http")]
pub use http::HttpBackend;
