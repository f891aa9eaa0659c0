//! Recompute classification and project mapping over stored rows.

use super::ReferenceContext;
use crate::db::{ClassUpdate, ProjectUpdate, Repository};
use crate::domain::{is_unresolved_project, AnomalyRecord, AMBIGUOUS_PROJECT, UNMAPPED_PROJECT};
use crate::engine::AnomalyKeySet;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReclassifyReport {
    pub scanned: usize,
    pub skipped_override: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemapReport {
    pub scanned: usize,
    pub candidates: usize,
    pub skipped_override: usize,
    pub updated: usize,
    pub anomalies_recorded: usize,
    pub still_unmapped: usize,
    pub still_ambiguous: usize,
}

#[derive(Debug, Error)]
pub enum RecomputeError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

pub struct Recomputer {
    repo: Arc<Repository>,
    context: Arc<ReferenceContext>,
}

impl Recomputer {
    pub fn new(repo: Arc<Repository>, context: Arc<ReferenceContext>) -> Self {
        Self { repo, context }
    }

    /// Re-run the classifier over rows without a class override.
    pub async fn reclassify(&self) -> Result<ReclassifyReport, RecomputeError> {
        let stored = self.repo.load_transfers().await?;
        let mut report = ReclassifyReport {
            scanned: stored.len(),
            ..Default::default()
        };

        let mut updates = Vec::new();
        for transfer in &stored {
            if transfer.row.has_class_override() {
                report.skipped_override += 1;
                continue;
            }
            let classification = self.context.classifier.classify(&transfer.row.to_transfer());
            let unchanged = transfer.row.class == classification.class
                && transfer.row.class_reason == Some(classification.class_reason);
            if unchanged {
                continue;
            }
            updates.push(ClassUpdate {
                id: transfer.id,
                class: classification.class,
                class_reason: classification.class_reason,
            });
        }

        report.updated = self.repo.apply_class_updates(&updates).await?;
        info!(
            scanned = report.scanned,
            skipped_override = report.skipped_override,
            updated = report.updated,
            "Reclassification finished"
        );
        Ok(report)
    }

    /// Re-run the mapper over unresolved rows without a project override.
    pub async fn remap(&self) -> Result<RemapReport, RecomputeError> {
        let stored = self.repo.load_transfers().await?;
        let mut anomaly_keys = AnomalyKeySet::from_keys(self.repo.existing_anomaly_keys().await?);
        let mut report = RemapReport {
            scanned: stored.len(),
            ..Default::default()
        };

        let now = Utc::now();
        let mut updates = Vec::new();
        let mut anomalies = Vec::new();
        for transfer in &stored {
            let row = &transfer.row;
            if !is_unresolved_project(&row.project_id) {
                continue;
            }
            if row.has_project_override() {
                report.skipped_override += 1;
                continue;
            }
            report.candidates += 1;

            let mapping = self
                .context
                .mapper
                .map(&row.to_transfer(), &self.context.indexes);
            match mapping.project_id() {
                UNMAPPED_PROJECT => report.still_unmapped += 1,
                AMBIGUOUS_PROJECT => report.still_ambiguous += 1,
                _ => {}
            }
            if let Some(anomaly) = mapping.anomaly() {
                if anomaly_keys.should_record(&row.tx_hash, anomaly.reason) {
                    anomalies.push(AnomalyRecord::new(&row.tx_hash, anomaly, now));
                }
            }

            let method = mapping.mapping_method();
            if row.project_id == mapping.project_id() && row.mapping_method == Some(method) {
                continue;
            }
            debug!(
                tx_hash = %row.tx_hash,
                op_id = %row.op_id,
                from = %row.project_id,
                to = %mapping.project_id(),
                "Remapping row"
            );
            updates.push(ProjectUpdate {
                id: transfer.id,
                project_id: mapping.project_id().to_string(),
                mapping_method: method,
            });
        }

        let (updated, inserted) = self.repo.apply_project_updates(&updates, &anomalies).await?;
        report.updated = updated;
        report.anomalies_recorded = inserted;
        info!(
            scanned = report.scanned,
            candidates = report.candidates,
            updated = report.updated,
            anomalies = report.anomalies_recorded,
            still_unmapped = report.still_unmapped,
            still_ambiguous = report.still_ambiguous,
            "Remapping finished"
        );
        Ok(report)
    }
}
