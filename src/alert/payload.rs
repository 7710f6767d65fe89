use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::AlertConfig;

use super::ErrorReport;

/// Alertmanager style webhook body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub receiver: String,
    pub status: String,
    pub alerts: Vec<Alert>,
    pub group_labels: GroupLabels,
    pub common_labels: CommonLabels,
    pub version: String,
    pub group_key: String,
    pub truncated_alerts: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub fingerprint: String,
    pub status: String,
    pub labels: Labels,
    pub annotations: Annotations,
    pub starts_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Labels {
    pub alertname: String,
    pub instance: String,
    pub severity: String,
    pub criticality: String,
    pub service_id: String,
    pub team: String,
    pub cluster: String,
    pub app: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Annotations {
    pub description: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupLabels {
    pub alertname: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommonLabels {
    pub severity: String,
}

impl AlertPayload {
    pub fn from_report(report: &ErrorReport, config: &AlertConfig, service_id: &str) -> Self {
        let severity = report.severity.to_string();
        let identity = format!("{}:{}:{}", report.context, config.instance, severity);
        let fingerprint = hex::encode(Sha256::digest(identity.as_bytes()));

        Self {
            receiver: config.app.clone(),
            status: "firing".into(),
            alerts: vec![Alert {
                fingerprint,
                status: "firing".into(),
                labels: Labels {
                    alertname: report.context.clone(),
                    instance: config.instance.clone(),
                    severity: severity.clone(),
                    criticality: report.criticality.to_string(),
                    service_id: service_id.to_string(),
                    team: config.team.clone(),
                    cluster: config.cluster.clone(),
                    app: config.app.clone(),
                },
                annotations: Annotations {
                    description: report.error.clone(),
                    summary: report.context.clone(),
                },
                starts_at: report.reported_at.to_rfc3339(),
            }],
            group_labels: GroupLabels {
                alertname: report.context.clone(),
            },
            common_labels: CommonLabels { severity },
            version: "4".into(),
            group_key: format!("{{}}:{{alertname=\"{}\"}}", report.context),
            truncated_alerts: 0,
        }
    }
}
