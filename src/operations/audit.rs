//! `audit report`: one fleet-wide report per run

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use super::Operation;
use crate::env::Environment;
use crate::outcome::{Event, EventCode};
use crate::ports::RemoteUrl;
use crate::repository::RepositoryState;

/// One repository's line in the audit report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRow {
    pub repository: String,
    pub path: PathBuf,
    pub current_branch: Option<String>,
    pub default_branch: String,
    pub clean: bool,
    pub origin: Option<String>,
    pub protocol: Option<String>,
    pub nested: bool,
}

impl AuditRow {
    pub fn from_repository(repository: &RepositoryState) -> Self {
        let origin = repository.snapshot.origin_url.clone();
        Self {
            repository: repository.identifier(),
            path: repository.path.clone(),
            current_branch: repository.snapshot.current_branch.clone(),
            default_branch: repository.default_branch().to_string(),
            clean: repository.snapshot.is_clean(),
            protocol: origin
                .as_deref()
                .and_then(RemoteUrl::parse)
                .map(|u| u.protocol.to_string()),
            origin,
            nested: repository.nested,
        }
    }
}

/// Whole-run operation. However many steps reach it, the report is
/// produced once per run.
#[derive(Debug, Clone, Default)]
pub struct AuditReportOperation {
    /// JSON file to write the rows to; the summary event is emitted either way
    pub output: Option<PathBuf>,
}

impl Operation for AuditReportOperation {
    fn name(&self) -> &str {
        "audit report"
    }

    fn kind(&self) -> &'static str {
        "audit_report"
    }

    fn execute(&self, env: &Environment, repositories: &mut [RepositoryState]) -> Result<()> {
        if !env.shared.claim_global_action() {
            tracing::debug!("audit report already produced for this run");
            return Ok(());
        }

        let rows: Vec<AuditRow> = repositories.iter().map(AuditRow::from_repository).collect();
        let dirty = rows.iter().filter(|r| !r.clean).count();

        let mut event = Event::info(
            EventCode::AuditReport,
            format!("{} repositories audited, {dirty} dirty", rows.len()),
        )
        .with_detail("repositories", rows.len().to_string())
        .with_detail("dirty", dirty.to_string());

        if let Some(output) = &self.output {
            if env.dry_run {
                event = event.with_detail("planned_output", output.display().to_string());
            } else {
                let json = serde_json::to_string_pretty(&rows)
                    .context("Failed to serialise audit report")?;
                env.fs
                    .write(output, &json)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                event = event.with_detail("output", output.display().to_string());
            }
        }

        env.emit(event);
        Ok(())
    }
}
