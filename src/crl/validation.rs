use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

use super::errors::{CrlError, CrlResult};
use super::extensions::{NextPublish, inspect_next_publish};
use super::types::DecodedCrl;

/// Certificate of the CA expected to have signed a list
#[derive(Debug, Clone)]
pub struct IssuerCertificate {
    pub path: PathBuf,
    /// DER encoded certificate
    pub der: Vec<u8>,
}

impl IssuerCertificate {
    /// Read the certificate from disk. PEM and DER encodings are accepted.
    pub async fn load(path: &Path) -> CrlResult<Self> {
        let load_error = |reason: String| CrlError::CertificateLoad {
            path: path.to_path_buf(),
            reason,
        };

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| load_error(e.to_string()))?;
        Self::from_bytes(path, &data).map_err(|e| match e {
            CrlError::Decode(reason) => load_error(reason),
            other => other,
        })
    }

    pub fn from_bytes(path: &Path, data: &[u8]) -> CrlResult<Self> {
        let der = if data.starts_with(b"-----BEGIN") {
            let (_, pem) = parse_x509_pem(data).map_err(|e| CrlError::Decode(e.to_string()))?;
            pem.contents
        } else {
            data.to_vec()
        };

        let issuer = Self {
            path: path.to_path_buf(),
            der,
        };
        // Fail closed on anything that is not a well-formed certificate
        issuer.parse()?;
        Ok(issuer)
    }

    pub fn parse(&self) -> CrlResult<X509Certificate<'_>> {
        let (_, cert) =
            X509Certificate::from_der(&self.der).map_err(|e| CrlError::Decode(e.to_string()))?;
        Ok(cert)
    }

    pub fn subject(&self) -> CrlResult<String> {
        Ok(self.parse()?.subject().to_string())
    }
}

/// Outcome of validating one list against its issuer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationVerdict {
    /// Signature verified and the list is not expired
    pub valid: bool,
    pub publish_ready: bool,
    pub next_publish_time: Option<DateTime<Utc>>,
    pub expired: bool,
    /// Reason the signature check failed, if it did
    pub signature_error: Option<String>,
    /// Set when the next-publish extension is present but undecodable
    pub next_publish_malformed: Option<String>,
}

/// Verify that `crl` was signed by the key in `issuer`, using the algorithm
/// declared in the list.
pub fn verify_signature(crl: &DecodedCrl, issuer: &IssuerCertificate) -> CrlResult<()> {
    let parsed = crl.parse()?;
    let cert = issuer.parse()?;

    if cert.subject() != parsed.issuer() {
        return Err(CrlError::Signature(format!(
            "CRL issuer '{}' does not match certificate subject '{}'",
            parsed.issuer(),
            cert.subject()
        )));
    }

    check_crl_signer(&cert)?;

    parsed
        .verify_signature(cert.public_key())
        .map_err(|e| CrlError::Signature(e.to_string()))?;
    debug!("[OK] CRL signature verification passed");
    Ok(())
}

/// The signer must be a CA and, if it restricts key usage, allowed to sign CRLs.
/// Version 1 certificates carry no extensions and are accepted as is.
fn check_crl_signer(cert: &X509Certificate<'_>) -> CrlResult<()> {
    let constraints = cert
        .basic_constraints()
        .map_err(|e| CrlError::Signature(format!("invalid basicConstraints: {e}")))?;
    match constraints {
        Some(ext) if !ext.value.ca => {
            return Err(CrlError::Signature(
                "issuer certificate is not a CA".to_string(),
            ));
        }
        None if cert.version() == X509Version::V3 => {
            return Err(CrlError::Signature(
                "issuer certificate has no basicConstraints".to_string(),
            ));
        }
        _ => {}
    }

    let key_usage = cert
        .key_usage()
        .map_err(|e| CrlError::Signature(format!("invalid keyUsage: {e}")))?;
    if key_usage.is_some_and(|ext| !ext.value.crl_sign()) {
        return Err(CrlError::Signature(
            "issuer certificate key usage does not permit cRLSign".to_string(),
        ));
    }
    Ok(())
}

/// Validate `crl` against `issuer` as of `now`.
///
/// An expired list is never valid, whatever the signature outcome. The
/// publish-readiness flag defaults to ready unless a decodable next-publish
/// marker lies in the future.
pub fn validate(crl: &DecodedCrl, issuer: &IssuerCertificate, now: DateTime<Utc>) -> ValidationVerdict {
    let expired = crl.is_expired_at(now);
    if expired {
        warn!("CRL from '{}' is expired (next_update: {:?})", crl.issuer, crl.next_update);
    }

    let next_publish = inspect_next_publish(&crl.extensions);

    let signature_error = match verify_signature(crl, issuer) {
        Ok(()) => None,
        Err(e) => {
            debug!("[ERROR] CRL signature verification failed: {}", e);
            Some(e.to_string())
        }
    };

    let (publish_ready, next_publish_malformed) = match &next_publish {
        NextPublish::Absent => {
            debug!("CRL does not contain NextPublish (ADCS-specific)");
            (true, None)
        }
        NextPublish::Present(next_publish_time) => {
            debug!("CRL contains NextPublish (ADCS-specific): {}", next_publish_time);
            (now > *next_publish_time, None)
        }
        NextPublish::Malformed(reason) => {
            warn!(
                "NextPublish extension present but malformed ({}), treating CRL as publish-ready",
                reason
            );
            (true, Some(reason.clone()))
        }
    };

    ValidationVerdict {
        valid: signature_error.is_none() && !expired,
        publish_ready,
        next_publish_time: next_publish.time(),
        expired,
        signature_error,
        next_publish_malformed,
    }
}

/// Whether the earliest of nextUpdate and next-publish falls within
/// `threshold` of `now`.
pub fn time_to_update(
    next_update: Option<DateTime<Utc>>,
    next_publish: Option<DateTime<Utc>>,
    threshold: Duration,
    now: DateTime<Utc>,
) -> bool {
    let earliest = match (next_update, next_publish) {
        (Some(update), Some(publish)) => update.min(publish),
        (Some(update), None) => update,
        (None, Some(publish)) => publish,
        (None, None) => return false,
    };
    earliest - now <= threshold
}
