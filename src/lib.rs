//! Elasticsearch to Loki label extraction
//!
//! This library derives a flat set of Loki labels from nested log documents
//! written by Filebeat and Elastic agents, and provides a small runner that
//! applies the extraction to a stream of documents.

pub mod config;
pub mod document;
pub mod errors;
pub mod labels;
pub mod transfer;

pub use config::Config;
pub use errors::{ExtractionFault, Result, TransferError};
pub use labels::{FieldSpec, LABEL_FIELDS, LabelMap, extract_labels};
pub use transfer::{
    LabelTransfer, TransferBase, TransferRecord, TransferStats, run_transfer, transfer_documents,
};
