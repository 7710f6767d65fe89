use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::alert::{Criticality, ErrorReport, ErrorSender, Severity};
use crate::config::CrlSource;
use crate::crl::validation::time_to_update;
use crate::crl::{CrlError, CrlFetcher, DecodedCrl, IssuerCertificate, validate};
use crate::storage::{Change, CrlStore, StorageError, detect_change, fingerprint};

/// Source of the current time, injectable for tests
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Pipeline stage at which a source was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Decode,
    LoadIssuerCert,
    Validate,
    Store,
}

/// Terminal state of one source in one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// Written to the listed backends
    Stored(Vec<String>),
    /// Every enabled backend already held identical bytes
    SkippedUnchanged,
    SkippedInvalid,
    /// Valid, but the next-publish marker is still in the future
    NotYetPublished,
    Failed(Stage),
}

#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    pub outcomes: Vec<(String, SourceOutcome)>,
}

impl CycleSummary {
    pub fn outcome(&self, source: &str) -> Option<&SourceOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, outcome)| outcome)
    }

    pub fn writes(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                SourceOutcome::Stored(backends) => backends.len(),
                _ => 0,
            })
            .sum()
    }
}

/// Drives fetch, decode, validate and store for every configured source.
///
/// Sources are handled one at a time in configuration order. A failure in any
/// stage only ends processing for that source.
pub struct SyncOrchestrator {
    fetcher: Arc<dyn CrlFetcher>,
    backends: Vec<Arc<dyn CrlStore>>,
    errors: ErrorSender,
    ca_path: PathBuf,
    clock: Clock,
}

impl SyncOrchestrator {
    pub fn new(
        fetcher: Arc<dyn CrlFetcher>,
        backends: Vec<Arc<dyn CrlStore>>,
        errors: ErrorSender,
        ca_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            backends,
            errors,
            ca_path: ca_path.into(),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Run one cycle over `sources`
    pub async fn process_crls(&self, sources: &[CrlSource]) -> CycleSummary {
        let mut summary = CycleSummary::default();

        for source in sources {
            info!("Processing CRL '{}' from URL: {}", source.name, source.url);
            let outcome = self.process_source(source).await;
            debug!("CRL '{}' finished with {:?}", source.name, outcome);
            summary.outcomes.push((source.name.clone(), outcome));
        }

        summary
    }

    async fn process_source(&self, source: &CrlSource) -> SourceOutcome {
        let raw = match self.fetcher.fetch(&source.url).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Error retrieving CRL '{}': {}", source.name, e);
                return SourceOutcome::Failed(Stage::Fetch);
            }
        };

        let decoded = match DecodedCrl::from_der(&raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                error!("Error parsing CRL '{}': {}", source.name, e);
                return SourceOutcome::Failed(Stage::Decode);
            }
        };

        let cert_path = source.issuer_certificate_path(&self.ca_path);
        let issuer = match IssuerCertificate::load(&cert_path).await {
            Ok(issuer) => issuer,
            Err(e) => {
                let severity = match e {
                    CrlError::CertificateLoad { .. } => Severity::Warning,
                    _ => Severity::Normal,
                };
                self.report(ErrorReport::new(
                    format!("Error loading issuer certificate for '{}'", source.name),
                    &e,
                    severity,
                    Criticality::Low,
                ))
                .await;
                return SourceOutcome::Failed(Stage::LoadIssuerCert);
            }
        };

        let now = (self.clock)();
        let verdict = validate(&decoded, &issuer, now);

        if let Some(reason) = &verdict.signature_error {
            error!("Signature check failed for CRL '{}': {}", source.name, reason);
            return SourceOutcome::Failed(Stage::Validate);
        }
        if !verdict.valid {
            warn!("CRL '{}' from {} is NOT valid", source.name, source.url);
            return SourceOutcome::SkippedInvalid;
        }
        info!("CRL '{}' is valid", source.name);

        if time_to_update(decoded.next_update, verdict.next_publish_time, Duration::hours(1), now) {
            debug!("CRL '{}' is due for republication within the hour", source.name);
        }

        if !verdict.publish_ready {
            info!(
                "CRL '{}' not yet published, next publish at {:?}",
                source.name, verdict.next_publish_time
            );
            return SourceOutcome::NotYetPublished;
        }

        self.store(source, &raw).await
    }

    async fn store(&self, source: &CrlSource, raw: &[u8]) -> SourceOutcome {
        let key = source.artifact_key();
        let mut stored = Vec::new();
        let mut failed = false;

        for backend in &self.backends {
            let label = backend.name();

            let mut existing_unknown = false;
            let previous = match backend.read(&key).await {
                Ok(previous) => Some(previous),
                Err(StorageError::NotFound(_)) => None,
                Err(e) => {
                    existing_unknown = true;
                    self.report(ErrorReport::new(
                        format!("[{label}] Error checking for existing CRL '{key}'"),
                        &e,
                        Severity::Warning,
                        Criticality::Medium,
                    ))
                    .await;
                    None
                }
            };

            match detect_change(raw, previous.as_deref()) {
                Change::NotPresent if existing_unknown => {
                    warn!(
                        "[{}] Existing content of '{}' unknown, overwriting",
                        label, key
                    );
                }
                Change::Unchanged => {
                    info!("[{}] No changes detected in CRL '{}', skipping save", label, source.name);
                    continue;
                }
                Change::Changed => {
                    info!("[{}] Changes detected in CRL '{}', updating", label, source.name);
                    if let Some(previous) = &previous {
                        debug!("[{}] Existing CRL hash: {}", label, fingerprint(previous));
                    }
                    debug!("[{}] New CRL hash:      {}", label, fingerprint(raw));
                }
                Change::NotPresent => {
                    info!("[{}] CRL '{}' not stored yet, saving new artifact", label, key);
                }
            }

            match backend.write(&key, raw).await {
                Ok(()) => {
                    info!("[{}] CRL saved as {}", label, key);
                    stored.push(label.to_string());
                }
                Err(e) => {
                    failed = true;
                    self.report(ErrorReport::new(
                        format!("[{label}] Error saving CRL '{key}'"),
                        &e,
                        Severity::Warning,
                        Criticality::Medium,
                    ))
                    .await;
                }
            }
        }

        if !stored.is_empty() {
            SourceOutcome::Stored(stored)
        } else if failed {
            SourceOutcome::Failed(Stage::Store)
        } else {
            SourceOutcome::SkippedUnchanged
        }
    }

    async fn report(&self, report: ErrorReport) {
        warn!("{}: {}", report.context, report.error);
        // Waits when the channel is full
        if self.errors.send(report).await.is_err() {
            warn!("Error channel closed, report dropped");
        }
    }
}
