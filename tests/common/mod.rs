#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CertificateRevocationListParams, DnType,
    IsCa, KeyIdMethod, KeyPair, KeyUsagePurpose, SerialNumber,
};
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair};
use time::OffsetDateTime;
use trawler::crl::{CrlError, CrlFetcher, CrlResult};
use x509_parser::prelude::{FromDer, X509Certificate};

const OID_ECDSA_WITH_SHA256: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02];
const OID_CRL_NUMBER: &[u8] = &[0x55, 0x1d, 0x14];
const OID_NEXT_PUBLISH: &[u8] = &[0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0x37, 0x15, 0x04];
use trawler::storage::{CrlStore, StorageError};

/// A self-signed CA able to sign revocation lists
pub struct TestCa {
    pub name: String,
    pub cert: Certificate,
    pub key: KeyPair,
}

impl TestCa {
    pub fn new(common_name: &str) -> Self {
        let key = KeyPair::generate().expect("Failed to generate key pair");
        let cert = ca_params(
            common_name,
            IsCa::Ca(BasicConstraints::Unconstrained),
            vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign],
        )
        .self_signed(&key)
        .expect("Failed to create CA certificate");
        Self {
            name: common_name.to_string(),
            cert,
            key,
        }
    }

    /// Another certificate for the same name and key, with different
    /// constraints. Returns DER.
    pub fn reissue(&self, is_ca: IsCa, key_usages: Vec<KeyUsagePurpose>) -> Vec<u8> {
        ca_params(&self.name, is_ca, key_usages)
            .self_signed(&self.key)
            .expect("Failed to reissue certificate")
            .der()
            .to_vec()
    }

    pub fn cert_der(&self) -> Vec<u8> {
        self.cert.der().to_vec()
    }

    pub fn cert_pem(&self) -> String {
        self.cert.pem()
    }

    /// A CRL issued an hour ago, valid until `next_update`
    pub fn crl_until(&self, next_update: DateTime<Utc>, number: u64) -> Vec<u8> {
        self.crl(Utc::now() - Duration::hours(1), next_update, number)
    }

    /// A CRL that stays valid for a week
    pub fn fresh_crl(&self, number: u64) -> Vec<u8> {
        self.crl_until(Utc::now() + Duration::days(7), number)
    }

    pub fn crl(&self, this_update: DateTime<Utc>, next_update: DateTime<Utc>, number: u64) -> Vec<u8> {
        let params = CertificateRevocationListParams {
            this_update: to_offset(this_update),
            next_update: to_offset(next_update),
            crl_number: SerialNumber::from(number),
            issuing_distribution_point: None,
            revoked_certs: Vec::new(),
            key_identifier_method: KeyIdMethod::Sha256,
        };
        let crl = params
            .signed_by(&self.cert, &self.key)
            .expect("Failed to sign CRL");
        crl.der().to_vec()
    }

    /// A CRL assembled field by field, for shapes rcgen cannot produce: no
    /// nextUpdate, or an ADCS next-publish extension.
    pub fn custom_crl(
        &self,
        this_update: DateTime<Utc>,
        next_update: Option<DateTime<Utc>>,
        next_publish: Option<DateTime<Utc>>,
        number: u64,
    ) -> Vec<u8> {
        let (_, cert) = X509Certificate::from_der(self.cert.der()).expect("Failed to parse CA");
        let algorithm = der(0x30, &der(0x06, OID_ECDSA_WITH_SHA256));

        let mut extensions = extension(OID_CRL_NUMBER, &der(0x02, &integer(number)));
        if let Some(next_publish) = next_publish {
            extensions.extend(extension(OID_NEXT_PUBLISH, &utc_time(next_publish)));
        }

        let mut tbs = der(0x02, &[0x01]);
        tbs.extend(&algorithm);
        tbs.extend_from_slice(cert.subject().as_raw());
        tbs.extend(utc_time(this_update));
        if let Some(next_update) = next_update {
            tbs.extend(utc_time(next_update));
        }
        tbs.extend(der(0xa0, &der(0x30, &extensions)));
        let tbs = der(0x30, &tbs);

        let rng = SystemRandom::new();
        let signer =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &self.key.serialize_der(), &rng)
                .expect("Failed to load signing key");
        let signature = signer.sign(&rng, &tbs).expect("Failed to sign CRL");
        let mut bits = vec![0x00];
        bits.extend_from_slice(signature.as_ref());

        let mut list = tbs;
        list.extend(algorithm);
        list.extend(der(0x03, &bits));
        der(0x30, &list)
    }

    /// Write the certificate as DER into `dir/file_name`
    pub fn write_cert(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.cert_der()).expect("Failed to write certificate");
        path
    }
}

fn ca_params(common_name: &str, is_ca: IsCa, key_usages: Vec<KeyUsagePurpose>) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new())
        .expect("Failed to create certificate parameters");
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.is_ca = is_ca;
    params.key_usages = key_usages;
    params
}

fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(content);
    out
}

fn integer(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
    let mut out = bytes[skip..].to_vec();
    if out[0] & 0x80 != 0 {
        out.insert(0, 0x00);
    }
    out
}

fn utc_time(time: DateTime<Utc>) -> Vec<u8> {
    der(0x17, time.format("%y%m%d%H%M%SZ").to_string().as_bytes())
}

fn extension(oid: &[u8], value: &[u8]) -> Vec<u8> {
    let mut content = der(0x06, oid);
    content.extend(der(0x04, value));
    der(0x30, &content)
}

fn to_offset(time: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(time.timestamp()).expect("timestamp in range")
}

/// Wraps a backend and counts writes
pub struct CountingStore {
    inner: Arc<dyn CrlStore>,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn CrlStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            writes: AtomicUsize::new(0),
        })
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CrlStore for CountingStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(key, data).await
    }
}

/// An object store that cannot be reached
pub struct UnreachableStore;

#[async_trait]
impl CrlStore for UnreachableStore {
    fn name(&self) -> &str {
        "s3"
    }

    async fn read(&self, _key: &str) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::BackendUnavailable("connection refused".into()))
    }

    async fn write(&self, key: &str, _data: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::Write {
            key: key.to_string(),
            reason: "connection refused".into(),
        })
    }
}

/// Records fetched URLs and always fails; enough to drive the scheduler
#[derive(Default)]
pub struct RecordingFetcher {
    urls: Mutex<Vec<String>>,
}

impl RecordingFetcher {
    pub fn fetched(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CrlFetcher for RecordingFetcher {
    async fn fetch(&self, url: &str) -> CrlResult<Vec<u8>> {
        self.urls.lock().unwrap().push(url.to_string());
        Err(CrlError::Retrieval(format!("no server for {url}")))
    }
}

/// Collects formatted log lines emitted on the current thread
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
