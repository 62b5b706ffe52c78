//! crates/murojaah_core/src/ports.rs
//!
//! Defines the storage contracts (traits) the ledger depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of a specific database.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{
    DailyLog, DailyTotals, NewSessionDetail, Recommendation, SessionDetail, StudentSummary,
};
use crate::recap::DailyRecap;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the underlying store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Row Types Returned by Ports
//=========================================================================================

/// A session together with the student who owns its daily log.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedSession {
    pub session: SessionDetail,
    pub student_id: Uuid,
}

/// Number of completed sessions recorded under one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCount {
    pub label: String,
    pub completed_sessions: i64,
}

/// Summed page totals of one student over a date window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentPageTotals {
    pub student: StudentSummary,
    pub target_pages: i64,
    pub completed_pages: i64,
}

//=========================================================================================
// Ledger Ports (Traits)
//=========================================================================================

/// Entry point to the writable store.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Opens a unit of work. Dropping it without calling
    /// [`LedgerTransaction::commit`] discards every change made through it.
    async fn begin(&self) -> PortResult<Box<dyn LedgerTransaction>>;
}

/// A single database transaction over daily logs and their sessions.
///
/// Reads made through the transaction observe its own earlier writes.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Atomically fetches or inserts the log keyed by `(student_id, date)`, with its
    /// sessions loaded. Concurrent callers for the same key receive the same row, and
    /// the row stays locked for the rest of the transaction.
    async fn get_or_create_daily_log(
        &mut self,
        student_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<DailyLog>;

    /// Returns the mentor supervising a student.
    async fn mentor_of_student(&mut self, student_id: Uuid) -> PortResult<Uuid>;

    async fn find_recommendation(&mut self, recommendation_id: Uuid) -> PortResult<Recommendation>;

    /// Loads a session and locks its parent log for the rest of the transaction.
    async fn find_session(&mut self, session_id: Uuid) -> PortResult<OwnedSession>;

    async fn insert_session(
        &mut self,
        daily_log_id: Uuid,
        session: &NewSessionDetail,
    ) -> PortResult<SessionDetail>;

    /// Persists progress fields and the note, returning the stored row.
    async fn update_session(&mut self, session: &SessionDetail) -> PortResult<SessionDetail>;

    async fn delete_session(&mut self, session_id: Uuid) -> PortResult<()>;

    async fn list_sessions(&mut self, daily_log_id: Uuid) -> PortResult<Vec<SessionDetail>>;

    async fn write_totals(&mut self, daily_log_id: Uuid, totals: DailyTotals) -> PortResult<()>;

    async fn commit(self: Box<Self>) -> PortResult<()>;
}

//=========================================================================================
// Read-only Recap Port
//=========================================================================================

#[async_trait]
pub trait RecapStore: Send + Sync {
    /// Completed pages of each existing log in `from..=to`, ascending by date.
    async fn daily_completed_between(
        &self,
        student_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<DailyRecap>>;

    /// Completed pages of every log the student has, ascending by date.
    async fn daily_completed(&self, student_id: Uuid) -> PortResult<Vec<DailyRecap>>;

    /// Completed-session counts per label, ordered by label.
    async fn completed_label_counts(&self, student_id: Uuid) -> PortResult<Vec<LabelCount>>;

    /// Totals over `from..=to` for every student of a mentor. Students without logs in
    /// the window are included with zero totals.
    async fn mentor_student_totals(
        &self,
        mentor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<StudentPageTotals>>;

    /// Every existing log dated `date` belonging to a student of the mentor, with
    /// sessions loaded. Missing logs are not created.
    async fn mentor_daily_logs(
        &self,
        mentor_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<Vec<(StudentSummary, DailyLog)>>;
}
