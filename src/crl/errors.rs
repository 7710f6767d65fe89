use std::path::PathBuf;

use thiserror::Error;

/// Failures of the retrieval and validation stages
#[derive(Error, Debug)]
pub enum CrlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid CRL URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Timeout while fetching CRL from {0}")]
    Timeout(String),

    #[error("CRL retrieval failed: {0}")]
    Retrieval(String),

    #[error("CRL decoding failed: {0}")]
    Decode(String),

    #[error("Failed to load issuer certificate {path}: {reason}")]
    CertificateLoad { path: PathBuf, reason: String },

    #[error("CRL signature verification failed: {0}")]
    Signature(String),

    #[error("Malformed extension {oid}: {reason}")]
    ExtensionDecode { oid: String, reason: String },
}

impl CrlError {
    /// Transport level failures, as opposed to problems with the list itself.
    pub fn is_retrieval(&self) -> bool {
        matches!(
            self,
            CrlError::Http(_) | CrlError::InvalidUrl(_) | CrlError::Timeout(_) | CrlError::Retrieval(_)
        )
    }
}

/// Convenient Result type alias
pub type CrlResult<T> = Result<T, CrlError>;
