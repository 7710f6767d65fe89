//! Error channel and webhook alerting
//!
//! The orchestrator pushes [`ErrorReport`]s into a bounded channel; a separate
//! worker drains it, logs every report and forwards it to the alert webhook
//! so that slow alert delivery never stalls a retrieval cycle.

mod payload;

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::config::AlertConfig;

pub use payload::AlertPayload;

/// Capacity of the error channel. Producers wait once it is full.
pub const ERROR_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Normal,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Low => "low",
            Severity::Normal => "normal",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        f.write_str(label)
    }
}

impl std::fmt::Display for Criticality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Criticality::Low => "low",
            Criticality::Medium => "medium",
            Criticality::High => "high",
            Criticality::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// A failure an operator may need to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub context: String,
    pub error: String,
    pub severity: Severity,
    pub criticality: Criticality,
    pub reported_at: DateTime<Utc>,
}

impl ErrorReport {
    pub fn new(
        context: impl Into<String>,
        error: &dyn std::error::Error,
        severity: Severity,
        criticality: Criticality,
    ) -> Self {
        Self {
            context: context.into(),
            error: error.to_string(),
            severity,
            criticality,
            reported_at: Utc::now(),
        }
    }
}

pub type ErrorSender = mpsc::Sender<ErrorReport>;
pub type ErrorReceiver = mpsc::Receiver<ErrorReport>;

pub fn error_channel() -> (ErrorSender, ErrorReceiver) {
    mpsc::channel(ERROR_CHANNEL_CAPACITY)
}

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Delivers alerts to the configured webhook
#[derive(Debug, Clone)]
pub struct AlertDispatcher {
    client: Client,
    config: AlertConfig,
    service_id: String,
}

impl AlertDispatcher {
    pub fn new(config: AlertConfig, service_id: impl Into<String>) -> Result<Self, AlertError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            config,
            service_id: service_id.into(),
        })
    }

    fn webhook_url(&self) -> Option<&str> {
        if self.config.activate {
            self.config.webhook_url.as_deref()
        } else {
            None
        }
    }

    pub fn payload(&self, report: &ErrorReport) -> AlertPayload {
        AlertPayload::from_report(report, &self.config, &self.service_id)
    }

    /// Posts the report. Does nothing when alerting is deactivated.
    pub async fn dispatch(&self, report: &ErrorReport) -> Result<(), AlertError> {
        let Some(url) = self.webhook_url() else {
            return Ok(());
        };

        let response = self.client.post(url).json(&self.payload(report)).send().await?;
        if !response.status().is_success() {
            return Err(AlertError::Status(response.status()));
        }
        Ok(())
    }
}

/// Drain the error channel until every sender is dropped.
///
/// Each report is logged; delivery failures are logged and dropped.
pub async fn run_alert_worker(mut rx: ErrorReceiver, dispatcher: AlertDispatcher) -> usize {
    let mut handled = 0;
    while let Some(report) = rx.recv().await {
        error!(
            severity = %report.severity,
            criticality = %report.criticality,
            "{}: {}",
            report.context,
            report.error
        );

        if let Err(e) = dispatcher.dispatch(&report).await {
            warn!("Failed to deliver alert for '{}': {}", report.context, e);
        }
        handled += 1;
    }
    handled
}
