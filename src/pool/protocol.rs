//! Envelopes exchanged between the pool, its workers and callers

use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::files::FileRecord;

/// One file of a batch, addressed to a single worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub file_url: String,
    /// Correlation id of the batch this file belongs to
    pub request_id: String,
}

/// Outcome of exactly one [`TransferRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub file_url: String,
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<FileRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferResponse {
    pub fn succeeded(request: TransferRequest, record: FileRecord) -> Self {
        Self {
            file_url: request.file_url,
            request_id: request.request_id,
            success: true,
            data: Some(record),
            error: None,
        }
    }

    pub fn failed(request: TransferRequest, error: impl Display) -> Self {
        Self {
            file_url: request.file_url,
            request_id: request.request_id,
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUpload {
    pub url: String,
    pub error: String,
}

/// Result of a whole batch; every submitted URL appears exactly once
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub successful_uploads: Vec<FileRecord>,
    pub failed_uploads: Vec<FailedUpload>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.successful_uploads.len() + self.failed_uploads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// File the response under successes or failures
    pub fn absorb(&mut self, response: TransferResponse) {
        match response {
            TransferResponse {
                success: true,
                data: Some(record),
                ..
            } => self.successful_uploads.push(record),
            TransferResponse {
                file_url, error, ..
            } => self.failed_uploads.push(FailedUpload {
                url: file_url,
                error: error.unwrap_or_else(|| "Unknown error".to_string()),
            }),
        }
    }
}
