//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `LedgerStore` and `RecapStore` ports from the `core` crate. It handles all
//! interactions with the PostgreSQL database using `sqlx`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use murojaah_core::domain::{
    DailyLog, DailyTotals, NewSessionDetail, PagePosition, Recommendation, SessionDetail,
    StudentSummary, TargetRange,
};
use murojaah_core::ports::{
    LabelCount, LedgerStore, LedgerTransaction, OwnedSession, PortError, PortResult, RecapStore,
    StudentPageTotals,
};
use murojaah_core::recap::DailyRecap;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Postgres error code for a foreign key violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

const SESSION_COLUMNS: &str = "s.id, s.daily_log_id, s.label, \
     s.target_start_juz, s.target_start_page, s.target_end_juz, s.target_end_page, \
     s.target_pages, s.completed_end_juz, s.completed_end_page, s.completed_pages, \
     s.note, s.updated_at";

const LOG_COLUMNS: &str =
    "l.id, l.student_id, l.log_date, l.total_target_pages, l.total_completed_pages";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == FOREIGN_KEY_VIOLATION)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DailyLogRecord {
    id: Uuid,
    student_id: Uuid,
    log_date: NaiveDate,
    total_target_pages: i32,
    total_completed_pages: i32,
}
impl DailyLogRecord {
    fn to_domain(self, sessions: Vec<SessionDetail>) -> DailyLog {
        DailyLog {
            id: self.id,
            student_id: self.student_id,
            date: self.log_date,
            totals: DailyTotals {
                target_pages: self.total_target_pages,
                completed_pages: self.total_completed_pages,
            },
            sessions,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    daily_log_id: Uuid,
    label: String,
    target_start_juz: i32,
    target_start_page: i32,
    target_end_juz: i32,
    target_end_page: i32,
    target_pages: i32,
    completed_end_juz: Option<i32>,
    completed_end_page: Option<i32>,
    completed_pages: i32,
    note: String,
    updated_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> SessionDetail {
        SessionDetail {
            id: self.id,
            daily_log_id: self.daily_log_id,
            label: self.label,
            target: TargetRange::new(
                PagePosition::new(self.target_start_juz, self.target_start_page),
                PagePosition::new(self.target_end_juz, self.target_end_page),
            ),
            target_pages: self.target_pages,
            completed_end: self
                .completed_end_juz
                .zip(self.completed_end_page)
                .map(|(juz, page)| PagePosition::new(juz, page)),
            completed_pages: self.completed_pages,
            note: self.note,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct OwnedSessionRecord {
    #[sqlx(flatten)]
    session: SessionRecord,
    owner_id: Uuid,
}

#[derive(FromRow)]
struct RecommendationRecord {
    id: Uuid,
    student_id: Option<Uuid>,
    mentor_id: Option<Uuid>,
    state: String,
    schedule: String,
    kind: String,
    q_value: Option<f64>,
    created_at: DateTime<Utc>,
}
impl RecommendationRecord {
    fn to_domain(self) -> Recommendation {
        Recommendation {
            id: self.id,
            student_id: self.student_id,
            mentor_id: self.mentor_id,
            state: self.state,
            schedule: self.schedule,
            kind: self.kind,
            q_value: self.q_value,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct DailyRecapRecord {
    log_date: NaiveDate,
    total_completed_pages: i32,
}
impl DailyRecapRecord {
    fn to_domain(self) -> DailyRecap {
        DailyRecap {
            date: self.log_date,
            completed_pages: self.total_completed_pages,
        }
    }
}

#[derive(FromRow)]
struct LabelCountRecord {
    label: String,
    completed_sessions: i64,
}

#[derive(FromRow)]
struct StudentTotalsRecord {
    student_id: Uuid,
    student_name: String,
    target_pages: i64,
    completed_pages: i64,
}

#[derive(FromRow)]
struct MentorLogRecord {
    student_name: String,
    #[sqlx(flatten)]
    log: DailyLogRecord,
}

//=========================================================================================
// `LedgerStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl LedgerStore for DbAdapter {
    async fn begin(&self) -> PortResult<Box<dyn LedgerTransaction>> {
        let tx = self.pool.begin().await.map_err(unexpected)?;
        Ok(Box::new(DbTransaction { tx }))
    }
}

/// One open Postgres transaction. Dropping it without committing rolls back.
pub struct DbTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for DbTransaction {
    async fn get_or_create_daily_log(
        &mut self,
        student_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<DailyLog> {
        // DO UPDATE (rather than DO NOTHING) makes RETURNING yield the existing row and
        // locks it until this transaction ends.
        let sql = format!(
            "INSERT INTO daily_logs AS l (student_id, log_date) VALUES ($1, $2) \
             ON CONFLICT (student_id, log_date) DO UPDATE SET updated_at = l.updated_at \
             RETURNING {LOG_COLUMNS}"
        );
        let record = sqlx::query_as::<_, DailyLogRecord>(&sql)
            .bind(student_id)
            .bind(date)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    PortError::NotFound(format!("Student {} not found", student_id))
                } else {
                    unexpected(e)
                }
            })?;

        let sessions = self.list_sessions(record.id).await?;
        Ok(record.to_domain(sessions))
    }

    async fn mentor_of_student(&mut self, student_id: Uuid) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>("SELECT mentor_id FROM students WHERE id = $1")
            .bind(student_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Student {} not found", student_id)))
    }

    async fn find_recommendation(&mut self, recommendation_id: Uuid) -> PortResult<Recommendation> {
        let record = sqlx::query_as::<_, RecommendationRecord>(
            "SELECT id, student_id, mentor_id, state, schedule, kind, q_value, created_at \
             FROM schedule_recommendations WHERE id = $1",
        )
        .bind(recommendation_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| {
            PortError::NotFound(format!("Recommendation {} not found", recommendation_id))
        })?;
        Ok(record.to_domain())
    }

    async fn find_session(&mut self, session_id: Uuid) -> PortResult<OwnedSession> {
        // Locking the parent log serialises concurrent mutations of the same day, so the
        // recompute that follows always sees every committed sibling.
        let sql = format!(
            "SELECT {SESSION_COLUMNS}, l.student_id AS owner_id \
             FROM session_details s JOIN daily_logs l ON l.id = s.daily_log_id \
             WHERE s.id = $1 FOR UPDATE OF l, s"
        );
        let record = sqlx::query_as::<_, OwnedSessionRecord>(&sql)
            .bind(session_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;

        Ok(OwnedSession {
            session: record.session.to_domain(),
            student_id: record.owner_id,
        })
    }

    async fn insert_session(
        &mut self,
        daily_log_id: Uuid,
        session: &NewSessionDetail,
    ) -> PortResult<SessionDetail> {
        let sql = format!(
            "INSERT INTO session_details AS s \
             (daily_log_id, label, target_start_juz, target_start_page, target_end_juz, \
              target_end_page, target_pages, note) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {SESSION_COLUMNS}"
        );
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(daily_log_id)
            .bind(&session.label)
            .bind(session.target.start.juz)
            .bind(session.target.start.page)
            .bind(session.target.end.juz)
            .bind(session.target.end.page)
            .bind(session.target_pages)
            .bind(&session.note)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    PortError::NotFound(format!("Daily log {} not found", daily_log_id))
                } else {
                    unexpected(e)
                }
            })?;
        Ok(record.to_domain())
    }

    async fn update_session(&mut self, session: &SessionDetail) -> PortResult<SessionDetail> {
        let sql = format!(
            "UPDATE session_details AS s SET \
             completed_end_juz = $2, completed_end_page = $3, completed_pages = $4, \
             note = $5, updated_at = now() \
             WHERE s.id = $1 RETURNING {SESSION_COLUMNS}"
        );
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(session.id)
            .bind(session.completed_end.map(|p| p.juz))
            .bind(session.completed_end.map(|p| p.page))
            .bind(session.completed_pages)
            .bind(&session.note)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session.id)))?;
        Ok(record.to_domain())
    }

    async fn delete_session(&mut self, session_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM session_details WHERE id = $1")
            .bind(session_id)
            .execute(&mut *self.tx)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Session {} not found", session_id)));
        }
        Ok(())
    }

    async fn list_sessions(&mut self, daily_log_id: Uuid) -> PortResult<Vec<SessionDetail>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM session_details s \
             WHERE s.daily_log_id = $1 ORDER BY s.created_at ASC, s.id ASC"
        );
        let records = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(daily_log_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn write_totals(&mut self, daily_log_id: Uuid, totals: DailyTotals) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE daily_logs SET total_target_pages = $2, total_completed_pages = $3, \
             updated_at = now() WHERE id = $1",
        )
        .bind(daily_log_id)
        .bind(totals.target_pages)
        .bind(totals.completed_pages)
        .execute(&mut *self.tx)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Daily log {} not found", daily_log_id)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        self.tx.commit().await.map_err(unexpected)
    }
}

//=========================================================================================
// `RecapStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RecapStore for DbAdapter {
    async fn daily_completed_between(
        &self,
        student_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<DailyRecap>> {
        let records = sqlx::query_as::<_, DailyRecapRecord>(
            "SELECT log_date, total_completed_pages FROM daily_logs \
             WHERE student_id = $1 AND log_date BETWEEN $2 AND $3 ORDER BY log_date ASC",
        )
        .bind(student_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn daily_completed(&self, student_id: Uuid) -> PortResult<Vec<DailyRecap>> {
        let records = sqlx::query_as::<_, DailyRecapRecord>(
            "SELECT log_date, total_completed_pages FROM daily_logs \
             WHERE student_id = $1 ORDER BY log_date ASC",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn completed_label_counts(&self, student_id: Uuid) -> PortResult<Vec<LabelCount>> {
        let records = sqlx::query_as::<_, LabelCountRecord>(
            "SELECT s.label, COUNT(s.id) AS completed_sessions \
             FROM session_details s JOIN daily_logs l ON l.id = s.daily_log_id \
             WHERE l.student_id = $1 AND s.completed_pages >= s.target_pages \
             GROUP BY s.label ORDER BY s.label ASC",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(|r| LabelCount {
                label: r.label,
                completed_sessions: r.completed_sessions,
            })
            .collect())
    }

    async fn mentor_student_totals(
        &self,
        mentor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<StudentPageTotals>> {
        let records = sqlx::query_as::<_, StudentTotalsRecord>(
            "SELECT st.id AS student_id, st.name AS student_name, \
                    COALESCE(SUM(l.total_target_pages), 0)::BIGINT AS target_pages, \
                    COALESCE(SUM(l.total_completed_pages), 0)::BIGINT AS completed_pages \
             FROM students st \
             LEFT JOIN daily_logs l \
                    ON l.student_id = st.id AND l.log_date BETWEEN $2 AND $3 \
             WHERE st.mentor_id = $1 \
             GROUP BY st.id, st.name ORDER BY st.name ASC",
        )
        .bind(mentor_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(|r| StudentPageTotals {
                student: StudentSummary {
                    id: r.student_id,
                    name: r.student_name,
                },
                target_pages: r.target_pages,
                completed_pages: r.completed_pages,
            })
            .collect())
    }

    async fn mentor_daily_logs(
        &self,
        mentor_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<Vec<(StudentSummary, DailyLog)>> {
        let sql = format!(
            "SELECT st.name AS student_name, {LOG_COLUMNS} \
             FROM students st JOIN daily_logs l ON l.student_id = st.id AND l.log_date = $2 \
             WHERE st.mentor_id = $1 ORDER BY st.name ASC"
        );
        let logs = sqlx::query_as::<_, MentorLogRecord>(&sql)
            .bind(mentor_id)
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let log_ids: Vec<Uuid> = logs.iter().map(|r| r.log.id).collect();
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM session_details s \
             WHERE s.daily_log_id = ANY($1) ORDER BY s.created_at ASC, s.id ASC"
        );
        let sessions = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(&log_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut by_log: HashMap<Uuid, Vec<SessionDetail>> = HashMap::new();
        for record in sessions {
            let session = record.to_domain();
            by_log.entry(session.daily_log_id).or_default().push(session);
        }

        Ok(logs
            .into_iter()
            .map(|r| {
                let student = StudentSummary {
                    id: r.log.student_id,
                    name: r.student_name,
                };
                let sessions = by_log.remove(&r.log.id).unwrap_or_default();
                (student, r.log.to_domain(sessions))
            })
            .collect())
    }
}
