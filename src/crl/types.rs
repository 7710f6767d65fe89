use chrono::{DateTime, Utc};
use x509_parser::prelude::*;

use super::errors::{CrlError, CrlResult};

/// A single CRL extension, copied out of the DER structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlExtension {
    /// Dotted object identifier, e.g. `2.5.29.20`
    pub oid: String,
    pub critical: bool,
    /// DER encoded extension value (contents of the extnValue OCTET STRING)
    pub value: Vec<u8>,
}

/// Structured view of a revocation list
#[derive(Debug, Clone)]
pub struct DecodedCrl {
    /// The raw CRL data in DER format
    pub der: Vec<u8>,
    pub issuer: String,
    pub this_update: DateTime<Utc>,
    /// `None` when the list carries no nextUpdate field
    pub next_update: Option<DateTime<Utc>>,
    pub extensions: Vec<CrlExtension>,
    pub signature_algorithm: String,
    pub revoked_count: usize,
}

impl DecodedCrl {
    /// Decode a DER revocation list. Trailing bytes after the outer SEQUENCE
    /// are rejected.
    pub fn from_der(der: &[u8]) -> CrlResult<Self> {
        let (rem, crl) =
            CertificateRevocationList::from_der(der).map_err(|e| CrlError::Decode(e.to_string()))?;
        if !rem.is_empty() {
            return Err(CrlError::Decode(format!(
                "{} trailing bytes after CRL",
                rem.len()
            )));
        }

        let this_update = asn1_time_to_utc(crl.last_update())?;
        let next_update = crl.next_update().map(asn1_time_to_utc).transpose()?;

        let extensions = crl
            .extensions()
            .iter()
            .map(|ext| CrlExtension {
                oid: ext.oid.to_id_string(),
                critical: ext.critical,
                value: ext.value.to_vec(),
            })
            .collect();

        Ok(Self {
            der: der.to_vec(),
            issuer: crl.issuer().to_string(),
            this_update,
            next_update,
            extensions,
            signature_algorithm: crl.signature_algorithm.algorithm.to_id_string(),
            revoked_count: crl.iter_revoked_certificates().count(),
        })
    }

    /// Re-parse the stored DER for operations that need the borrowed x509 view
    pub(crate) fn parse(&self) -> CrlResult<CertificateRevocationList<'_>> {
        let (_, crl) = CertificateRevocationList::from_der(&self.der)
            .map_err(|e| CrlError::Decode(e.to_string()))?;
        Ok(crl)
    }

    /// Whether `now` is past nextUpdate. A list without nextUpdate gives no
    /// freshness guarantee and counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.next_update.is_none_or(|next_update| now > next_update)
    }
}

pub(crate) fn asn1_time_to_utc(time: ASN1Time) -> CrlResult<DateTime<Utc>> {
    DateTime::from_timestamp(time.timestamp(), 0)
        .ok_or_else(|| CrlError::Decode(format!("timestamp out of range: {time}")))
}
