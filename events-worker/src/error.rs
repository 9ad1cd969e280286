use std::io;

use events_common::enrich::UuidLoadError;
use events_common::events::EventizeError;
use events_common::filter::FilterError;
use thiserror::Error;

/// Enumeration of errors talking to the source or destination document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid store url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("store url must use http or https, got {0}")]
    UnsupportedScheme(String),
    #[error("request to the document store failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("document store answered {status} to {operation}: {body}")]
    UnexpectedStatus {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("could not decode document store response to {operation}: {source}")]
    InvalidResponse {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("bulk write rejected {failed} of {total} documents")]
    BulkRejected { failed: usize, total: usize },
}

/// Enumeration of errors loading collaborators and stage descriptions at startup.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("embedded mapping for {kind} is invalid: {source}")]
    Mapping {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid genderize url: {0}")]
    GenderizeUrl(#[source] url::ParseError),
    #[error(transparent)]
    Uuids(#[from] UuidLoadError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Enumeration of errors aborting a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Eventize(#[from] EventizeError),
    #[error(transparent)]
    Filter(#[from] FilterError),
}
