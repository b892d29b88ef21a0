//! Source collector error types
//!
//! Every variant carries enough context (provider, field, offending data, URL)
//! to diagnose a changed page layout from the log line alone. None of them is
//! recoverable: the caller aborts the whole run.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("{provider} 강좌 데이터 파싱 실패: field '{field}' (data: '{data}', URL: {url})")]
    FieldExtractionFailed {
        provider: String,
        field: String,
        data: String,
        url: String,
    },

    #[error("{provider} 강좌 데이터 파싱 실패: expected {expected} columns, found {actual} (URL: {url})")]
    ColumnCountMismatch {
        provider: String,
        expected: usize,
        actual: usize,
        url: String,
    },

    #[error("{provider} 강좌 데이터 파싱 실패: unsupported reception status '{status}' (URL: {url})")]
    UnsupportedStatus {
        provider: String,
        status: String,
        url: String,
    },

    #[error("{provider} {kind} code mismatch: '{code}' ({name}) not offered by the site")]
    CodeMismatch {
        provider: String,
        kind: String,
        code: String,
        name: String,
    },

    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid extraction pattern: {pattern} - {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("HTTP client could not be created: {message}")]
    ClientBuild { message: String },

    #[error("HTTP request failed: {status} - {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Network error while requesting {url}: {message}")]
    Network { url: String, message: String },

    #[error("JSON decode failed for {url}: {message}")]
    Json { url: String, message: String },

    #[error("Collector task '{task}' did not complete: {message}")]
    TaskFailed { task: String, message: String },
}

impl ScrapeError {
    pub fn field_extraction_failed(provider: &str, field: &str, data: &str, url: &str) -> Self {
        Self::FieldExtractionFailed {
            provider: provider.to_string(),
            field: field.to_string(),
            data: data.to_string(),
            url: url.to_string(),
        }
    }

    pub fn column_count_mismatch(provider: &str, expected: usize, actual: usize, url: &str) -> Self {
        Self::ColumnCountMismatch {
            provider: provider.to_string(),
            expected,
            actual,
            url: url.to_string(),
        }
    }

    pub fn unsupported_status(provider: &str, status: &str, url: &str) -> Self {
        Self::UnsupportedStatus {
            provider: provider.to_string(),
            status: status.to_string(),
            url: url.to_string(),
        }
    }

    pub fn code_mismatch(provider: &str, kind: &str, code: &str, name: &str) -> Self {
        Self::CodeMismatch {
            provider: provider.to_string(),
            kind: kind.to_string(),
            code: code.to_string(),
            name: name.to_string(),
        }
    }

    pub fn network(url: &str, err: &reqwest::Error) -> Self {
        Self::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub fn json(url: &str, err: &serde_json::Error) -> Self {
        Self::Json {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;
