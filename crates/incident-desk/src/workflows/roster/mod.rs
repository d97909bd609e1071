//! Roster import from a CSV export.
//!
//! Rows are reconciled through the student identity resolver and upserted
//! through [`IncidentService::save_student`], so re-importing the same file
//! updates records instead of duplicating them.

mod mapping;
mod normalizer;
mod parser;

use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::workflows::incidents::{
    IncidentService, IncidentStore, RepositoryError, ServiceError, Student,
};
use parser::RosterRecord;

#[derive(Debug, thiserror::Error)]
pub enum RosterImportError {
    #[error("failed to read roster file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid roster CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("roster import aborted: {0}")]
    Service(#[from] ServiceError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
    pub rejected: Vec<RejectedRow>,
}

impl ImportSummary {
    pub fn processed(&self) -> usize {
        self.inserted + self.updated + self.rejected.len()
    }
}

pub struct RosterImporter<'a, S> {
    service: &'a IncidentService<S>,
    today: NaiveDate,
}

impl<'a, S> RosterImporter<'a, S>
where
    S: IncidentStore + 'static,
{
    pub fn new(service: &'a IncidentService<S>, today: NaiveDate) -> Self {
        Self { service, today }
    }

    pub async fn import_path<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<ImportSummary, RosterImportError> {
        let file = std::fs::File::open(path)?;
        self.import_reader(file).await
    }

    pub async fn import_reader<R: Read>(&self, reader: R) -> Result<ImportSummary, RosterImportError> {
        let mut summary = ImportSummary::default();

        for row in parser::parse_rows(reader)? {
            let outcome = match row.record {
                Ok(record) => self.apply_record(record).await?,
                Err(message) => Err(message),
            };

            match outcome {
                Ok(true) => summary.updated += 1,
                Ok(false) => summary.inserted += 1,
                Err(message) => {
                    warn!(line = row.line, %message, "roster row rejected");
                    summary.rejected.push(RejectedRow {
                        line: row.line,
                        message,
                    });
                }
            }
        }

        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            rejected = summary.rejected.len(),
            "roster imported"
        );
        Ok(summary)
    }

    /// Upsert one row. The inner result is `Ok(updated)` or the rejection
    /// message; the outer error aborts the import.
    async fn apply_record(
        &self,
        record: RosterRecord,
    ) -> Result<Result<bool, String>, RosterImportError> {
        let reference = record.reference();
        let existing = match self.service.resolve_student(&reference) {
            Ok(student) => Some(student),
            Err(ServiceError::Identity(_)) => None,
            Err(other) => return Err(other.into()),
        };

        let canonical = existing.as_ref().map(Student::reference);
        let student = record.apply_to(existing.unwrap_or_default());

        match self
            .service
            .save_student(student, canonical.as_ref(), self.today)
            .await
        {
            Ok(_) => Ok(Ok(canonical.is_some())),
            Err(ServiceError::Repository(err @ RepositoryError::Unavailable(_))) => {
                Err(ServiceError::Repository(err).into())
            }
            Err(rejected) => Ok(Err(rejected.to_string())),
        }
    }
}
