use chrono::{DateTime, Utc};
use x509_parser::prelude::FromDer;
use x509_parser::time::ASN1Time;

use super::errors::{CrlError, CrlResult};
use super::types::{CrlExtension, asn1_time_to_utc};

/// Microsoft ADCS "Next CRL Publish" (szOID_CRL_NEXT_PUBLISH)
pub const NEXT_PUBLISH_OID: &str = "1.3.6.1.4.1.311.21.4";

/// State of the next-publish marker on a decoded list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPublish {
    Absent,
    Present(DateTime<Utc>),
    /// The extension exists but its value is not a valid time
    Malformed(String),
}

impl NextPublish {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        match self {
            NextPublish::Present(time) => Some(*time),
            _ => None,
        }
    }
}

/// Returns the first extension with the given OID. Absence is not an error.
pub fn find_extension<'a>(extensions: &'a [CrlExtension], oid: &str) -> Option<&'a CrlExtension> {
    extensions.iter().find(|ext| ext.oid == oid)
}

/// Decode an extension value holding a single UTCTime or GeneralizedTime.
pub fn decode_time_extension(value: &[u8]) -> CrlResult<DateTime<Utc>> {
    let malformed = |reason: String| CrlError::ExtensionDecode {
        oid: NEXT_PUBLISH_OID.to_string(),
        reason,
    };

    let (rem, time) = ASN1Time::from_der(value).map_err(|e| malformed(e.to_string()))?;
    if !rem.is_empty() {
        return Err(malformed(format!("{} trailing bytes", rem.len())));
    }
    asn1_time_to_utc(time).map_err(|e| malformed(e.to_string()))
}

/// Look up and decode the next-publish marker.
pub fn inspect_next_publish(extensions: &[CrlExtension]) -> NextPublish {
    match find_extension(extensions, NEXT_PUBLISH_OID) {
        None => NextPublish::Absent,
        Some(ext) => match decode_time_extension(&ext.value) {
            Ok(time) => NextPublish::Present(time),
            Err(e) => NextPublish::Malformed(e.to_string()),
        },
    }
}
