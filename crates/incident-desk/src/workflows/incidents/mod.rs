//! Incident intake, student reconciliation, aggregation, and scoring.
//!
//! Everything here operates on snapshots fetched from an [`IncidentStore`] at
//! call time. The store owns the records; this module never caches them.

pub mod aggregate;
pub mod domain;
pub mod identity;
pub mod memory;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use aggregate::{
    aggregate, attendance_tally, class_breakdown, student_breakdown, AttendanceTally,
    CategoryCounts, ClassStats, DateRange, RangeQuery, SeverityCounts, Stats, StudentStats,
};
pub use domain::{
    AttendanceRecord, AttendanceState, ClassAssignment, ContactInfo, EscalationTarget, Guardian,
    Incident, IncidentCategory, IncidentDraft, IncidentId, IncidentStatus, Severity, Student,
    StudentId, StudentRef, Tutor, ViewerRole,
};
pub use identity::{looks_like_uuid, resolve_position, resolve_student, IdentityError};
pub use memory::InMemoryIncidentStore;
pub use repository::{IncidentStore, RepositoryError};
pub use router::incident_router;
pub use scoring::{
    PerformanceBand, PerformanceIndex, RankedStudent, Rankings, ScoreCard, ScoringConfig,
    ScoringEngine, ScoringWeights, StudentProfile,
};
pub use service::{IncidentService, ServiceError};
pub use validation::ValidationError;
