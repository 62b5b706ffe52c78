//! crates/murojaah_core/src/memory.rs
//!
//! An in-process implementation of every storage port.
//!
//! A transaction holds the store's lock for its whole lifetime and works on a private
//! copy of the tables; `commit` swaps the copy in, dropping discards it. That gives
//! serializable transactions, which is stronger than what the ledger requires.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{
    DailyLog, DailyTotals, NewSessionDetail, Recommendation, SessionDetail, StudentSummary,
};
use crate::ports::{
    LabelCount, LedgerStore, LedgerTransaction, OwnedSession, PortError, PortResult, RecapStore,
    StudentPageTotals,
};
use crate::recap::DailyRecap;

#[derive(Debug, Clone)]
struct StudentRow {
    summary: StudentSummary,
    mentor_id: Uuid,
}

#[derive(Debug, Clone)]
struct LogRow {
    id: Uuid,
    student_id: Uuid,
    date: NaiveDate,
    totals: DailyTotals,
}

/// Rows kept in insertion order.
#[derive(Debug, Clone, Default)]
struct Tables {
    students: Vec<StudentRow>,
    logs: Vec<LogRow>,
    sessions: Vec<SessionDetail>,
    recommendations: Vec<Recommendation>,
}

impl Tables {
    fn sessions_of(&self, daily_log_id: Uuid) -> Vec<SessionDetail> {
        self.sessions
            .iter()
            .filter(|s| s.daily_log_id == daily_log_id)
            .cloned()
            .collect()
    }

    fn load_log(&self, row: &LogRow) -> DailyLog {
        DailyLog {
            id: row.id,
            student_id: row.student_id,
            date: row.date,
            totals: row.totals,
            sessions: self.sessions_of(row.id),
        }
    }

    fn students_of(&self, mentor_id: Uuid) -> Vec<StudentSummary> {
        let mut students: Vec<StudentSummary> = self
            .students
            .iter()
            .filter(|s| s.mentor_id == mentor_id)
            .map(|s| s.summary.clone())
            .collect();
        students.sort_by(|a, b| a.name.cmp(&b.name));
        students
    }

    fn logs_of(&self, student_id: Uuid) -> Vec<&LogRow> {
        let mut logs: Vec<&LogRow> = self
            .logs
            .iter()
            .filter(|l| l.student_id == student_id)
            .collect();
        logs.sort_by_key(|l| l.date);
        logs
    }
}

/// A shared, cloneable in-memory store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a student under a mentor and returns the new student id.
    pub async fn add_student(&self, mentor_id: Uuid, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().await.students.push(StudentRow {
            summary: StudentSummary {
                id,
                name: name.to_string(),
            },
            mentor_id,
        });
        id
    }

    pub async fn add_recommendation(&self, recommendation: Recommendation) {
        self.tables.lock().await.recommendations.push(recommendation);
    }

    /// Number of daily logs stored for a student.
    pub async fn daily_log_count(&self, student_id: Uuid) -> usize {
        self.tables.lock().await.logs_of(student_id).len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn begin(&self) -> PortResult<Box<dyn LedgerTransaction>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, working }))
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn get_or_create_daily_log(
        &mut self,
        student_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<DailyLog> {
        let existing = self
            .working
            .logs
            .iter()
            .position(|l| l.student_id == student_id && l.date == date);

        let index = match existing {
            Some(i) => i,
            None => {
                self.working.logs.push(LogRow {
                    id: Uuid::new_v4(),
                    student_id,
                    date,
                    totals: DailyTotals::default(),
                });
                self.working.logs.len() - 1
            }
        };
        Ok(self.working.load_log(&self.working.logs[index]))
    }

    async fn mentor_of_student(&mut self, student_id: Uuid) -> PortResult<Uuid> {
        self.working
            .students
            .iter()
            .find(|s| s.summary.id == student_id)
            .map(|s| s.mentor_id)
            .ok_or_else(|| PortError::NotFound(format!("Student {} not found", student_id)))
    }

    async fn find_recommendation(&mut self, recommendation_id: Uuid) -> PortResult<Recommendation> {
        self.working
            .recommendations
            .iter()
            .find(|r| r.id == recommendation_id)
            .cloned()
            .ok_or_else(|| {
                PortError::NotFound(format!("Recommendation {} not found", recommendation_id))
            })
    }

    async fn find_session(&mut self, session_id: Uuid) -> PortResult<OwnedSession> {
        let session = self
            .working
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;

        let student_id = self
            .working
            .logs
            .iter()
            .find(|l| l.id == session.daily_log_id)
            .map(|l| l.student_id)
            .ok_or_else(|| {
                PortError::Unexpected(format!("Session {} has no daily log", session_id))
            })?;

        Ok(OwnedSession { session, student_id })
    }

    async fn insert_session(
        &mut self,
        daily_log_id: Uuid,
        session: &NewSessionDetail,
    ) -> PortResult<SessionDetail> {
        if !self.working.logs.iter().any(|l| l.id == daily_log_id) {
            return Err(PortError::NotFound(format!("Daily log {} not found", daily_log_id)));
        }

        let detail = SessionDetail {
            id: Uuid::new_v4(),
            daily_log_id,
            label: session.label.clone(),
            target: session.target,
            target_pages: session.target_pages,
            completed_end: None,
            completed_pages: 0,
            note: session.note.clone(),
            updated_at: Utc::now(),
        };
        self.working.sessions.push(detail.clone());
        Ok(detail)
    }

    async fn update_session(&mut self, session: &SessionDetail) -> PortResult<SessionDetail> {
        let stored = self
            .working
            .sessions
            .iter_mut()
            .find(|s| s.id == session.id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session.id)))?;

        stored.completed_end = session.completed_end;
        stored.completed_pages = session.completed_pages;
        stored.note = session.note.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_session(&mut self, session_id: Uuid) -> PortResult<()> {
        let before = self.working.sessions.len();
        self.working.sessions.retain(|s| s.id != session_id);
        if self.working.sessions.len() == before {
            return Err(PortError::NotFound(format!("Session {} not found", session_id)));
        }
        Ok(())
    }

    async fn list_sessions(&mut self, daily_log_id: Uuid) -> PortResult<Vec<SessionDetail>> {
        Ok(self.working.sessions_of(daily_log_id))
    }

    async fn write_totals(&mut self, daily_log_id: Uuid, totals: DailyTotals) -> PortResult<()> {
        let log = self
            .working
            .logs
            .iter_mut()
            .find(|l| l.id == daily_log_id)
            .ok_or_else(|| PortError::NotFound(format!("Daily log {} not found", daily_log_id)))?;
        log.totals = totals;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        let InMemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl RecapStore for InMemoryStore {
    async fn daily_completed_between(
        &self,
        student_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<DailyRecap>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .logs_of(student_id)
            .into_iter()
            .filter(|l| l.date >= from && l.date <= to)
            .map(|l| DailyRecap {
                date: l.date,
                completed_pages: l.totals.completed_pages,
            })
            .collect())
    }

    async fn daily_completed(&self, student_id: Uuid) -> PortResult<Vec<DailyRecap>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .logs_of(student_id)
            .into_iter()
            .map(|l| DailyRecap {
                date: l.date,
                completed_pages: l.totals.completed_pages,
            })
            .collect())
    }

    async fn completed_label_counts(&self, student_id: Uuid) -> PortResult<Vec<LabelCount>> {
        let tables = self.tables.lock().await;
        let mut counts: Vec<LabelCount> = Vec::new();

        for log in tables.logs_of(student_id) {
            for session in tables.sessions_of(log.id) {
                if session.completed_pages < session.target_pages {
                    continue;
                }
                match counts.iter_mut().find(|c| c.label == session.label) {
                    Some(c) => c.completed_sessions += 1,
                    None => counts.push(LabelCount {
                        label: session.label,
                        completed_sessions: 1,
                    }),
                }
            }
        }

        counts.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(counts)
    }

    async fn mentor_student_totals(
        &self,
        mentor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<StudentPageTotals>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .students_of(mentor_id)
            .into_iter()
            .map(|student| {
                let (target_pages, completed_pages) = tables
                    .logs_of(student.id)
                    .into_iter()
                    .filter(|l| l.date >= from && l.date <= to)
                    .fold((0_i64, 0_i64), |(t, c), l| {
                        (
                            t + i64::from(l.totals.target_pages),
                            c + i64::from(l.totals.completed_pages),
                        )
                    });
                StudentPageTotals {
                    student,
                    target_pages,
                    completed_pages,
                }
            })
            .collect())
    }

    async fn mentor_daily_logs(
        &self,
        mentor_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<Vec<(StudentSummary, DailyLog)>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .students_of(mentor_id)
            .into_iter()
            .filter_map(|student| {
                let row = tables
                    .logs
                    .iter()
                    .find(|l| l.student_id == student.id && l.date == date)?;
                Some((student, tables.load_log(row)))
            })
            .collect())
    }
}
