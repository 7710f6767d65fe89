//! Certificate Revocation List retrieval and validation
//!
//! # Features
//! - Fetching raw CRL bytes from configured HTTP endpoints
//! - Decoding DER revocation lists into a structured view
//! - Inspecting the ADCS "next CRL publish" extension
//! - Verifying the signature against the issuing CA certificate

mod errors;
pub mod extensions;
pub mod fetcher;
mod types;
pub mod validation;

// Re-export public types
pub use errors::{CrlError, CrlResult};
pub use extensions::{NEXT_PUBLISH_OID, NextPublish};
pub use fetcher::{CrlFetcher, HttpFetcher};
pub use types::{CrlExtension, DecodedCrl};
pub use validation::{IssuerCertificate, ValidationVerdict, validate};
