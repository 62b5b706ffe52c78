//! crates/murojaah_core/src/ledger.rs
//!
//! The progress ledger: every mutation of a session runs inside one transaction
//! together with the recomputation of its daily log's cached totals.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    DailyLog, DailyTotals, NewSessionDetail, PagePosition, SessionDetail, TargetRange,
};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::{LedgerStore, LedgerTransaction, PortError};

/// Re-reads every session of a daily log and persists their sums as its totals.
///
/// Must run in the same transaction as the session write that preceded it.
pub async fn recalculate_totals(
    tx: &mut dyn LedgerTransaction,
    daily_log_id: Uuid,
) -> LedgerResult<DailyTotals> {
    let sessions = tx.list_sessions(daily_log_id).await?;
    let totals = DailyTotals::from_sessions(&sessions)?;
    tx.write_totals(daily_log_id, totals).await?;
    Ok(totals)
}

/// Orchestrates daily logs and their sessions on top of a [`LedgerStore`].
#[derive(Clone)]
pub struct ProgressLedger {
    store: Arc<dyn LedgerStore>,
}

impl ProgressLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Returns the student's log for `date`, creating an empty one on first access.
    pub async fn get_or_create(&self, student_id: Uuid, date: NaiveDate) -> LedgerResult<DailyLog> {
        let mut tx = self.store.begin().await?;
        let log = tx.get_or_create_daily_log(student_id, date).await?;
        tx.commit().await?;
        Ok(log)
    }

    /// Like [`Self::get_or_create`], on behalf of a mentor. Only the student's own
    /// mentor may read the log.
    pub async fn get_or_create_for_mentor(
        &self,
        mentor_id: Uuid,
        student_id: Uuid,
        date: NaiveDate,
    ) -> LedgerResult<DailyLog> {
        let mut tx = self.store.begin().await?;

        let supervisor = tx.mentor_of_student(student_id).await.map_err(|e| match e {
            PortError::NotFound(_) => not_supervised(student_id),
            other => other.into(),
        })?;
        if supervisor != mentor_id {
            warn!(%mentor_id, %student_id, "mentor tried to read an unsupervised student's log");
            return Err(not_supervised(student_id));
        }

        let log = tx.get_or_create_daily_log(student_id, date).await?;
        tx.commit().await?;
        Ok(log)
    }

    /// Adds a session to the student's log for `date`.
    pub async fn add_session(
        &self,
        student_id: Uuid,
        date: NaiveDate,
        label: String,
        target: TargetRange,
        note: String,
    ) -> LedgerResult<SessionDetail> {
        let new_session = NewSessionDetail::new(label, target, note)?;

        let mut tx = self.store.begin().await?;
        let session = insert_into_day(tx.as_mut(), student_id, date, &new_session).await?;
        tx.commit().await?;

        info!(
            %student_id,
            session_id = %session.id,
            target_pages = session.target_pages,
            "added muroja'ah session"
        );
        Ok(session)
    }

    /// Records how far a session has progressed.
    ///
    /// Progress is always measured from the session's target start.
    pub async fn update_progress(
        &self,
        student_id: Uuid,
        session_id: Uuid,
        completed_end: PagePosition,
        note: String,
    ) -> LedgerResult<SessionDetail> {
        let mut tx = self.store.begin().await?;

        let mut session = owned_session(tx.as_mut(), student_id, session_id).await?;
        let status = session.apply_progress(completed_end, note)?;

        let stored = tx.update_session(&session).await?;
        recalculate_totals(tx.as_mut(), stored.daily_log_id).await?;
        tx.commit().await?;

        info!(
            %student_id,
            %session_id,
            completed_pages = stored.completed_pages,
            status = %status,
            "updated muroja'ah progress"
        );
        Ok(stored)
    }

    pub async fn delete_session(&self, student_id: Uuid, session_id: Uuid) -> LedgerResult<()> {
        let mut tx = self.store.begin().await?;

        let session = owned_session(tx.as_mut(), student_id, session_id).await?;
        tx.delete_session(session.id).await?;
        recalculate_totals(tx.as_mut(), session.daily_log_id).await?;
        tx.commit().await?;

        info!(%student_id, %session_id, "deleted muroja'ah session");
        Ok(())
    }

    /// Adds a session labelled after one of the student's stored recommendations.
    pub async fn apply_recommendation(
        &self,
        student_id: Uuid,
        date: NaiveDate,
        recommendation_id: Uuid,
        target: TargetRange,
        note: String,
    ) -> LedgerResult<SessionDetail> {
        let mut tx = self.store.begin().await?;

        let recommendation = match tx.find_recommendation(recommendation_id).await {
            Ok(r) if r.is_owned_by_student(student_id) => r,
            Ok(_) | Err(PortError::NotFound(_)) => {
                return Err(LedgerError::NotFound(format!(
                    "recommendation {recommendation_id}"
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let new_session = NewSessionDetail::new(recommendation.session_label(), target, note)?;
        let session = insert_into_day(tx.as_mut(), student_id, date, &new_session).await?;
        tx.commit().await?;

        info!(
            %student_id,
            %recommendation_id,
            session_id = %session.id,
            "applied schedule recommendation"
        );
        Ok(session)
    }
}

async fn insert_into_day(
    tx: &mut dyn LedgerTransaction,
    student_id: Uuid,
    date: NaiveDate,
    new_session: &NewSessionDetail,
) -> LedgerResult<SessionDetail> {
    let log = tx.get_or_create_daily_log(student_id, date).await?;
    let session = tx.insert_session(log.id, new_session).await?;
    recalculate_totals(tx, log.id).await?;
    Ok(session)
}

/// Loads a session, hiding sessions of other students behind `NotFound`.
async fn owned_session(
    tx: &mut dyn LedgerTransaction,
    student_id: Uuid,
    session_id: Uuid,
) -> LedgerResult<SessionDetail> {
    let not_found = || LedgerError::NotFound(format!("session {session_id}"));

    match tx.find_session(session_id).await {
        Ok(owned) if owned.student_id == student_id => Ok(owned.session),
        Ok(_) | Err(PortError::NotFound(_)) => Err(not_found()),
        Err(e) => Err(e.into()),
    }
}

fn not_supervised(student_id: Uuid) -> LedgerError {
    LedgerError::Forbidden(format!("student {student_id} is not supervised by this mentor"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Recommendation, SessionStatus};
    use crate::memory::InMemoryStore;
    use crate::ports::{OwnedSession, PortResult};
    use async_trait::async_trait;
    use chrono::Utc;

    fn pos(juz: i32, page: i32) -> PagePosition {
        PagePosition::new(juz, page)
    }

    fn range(start: (i32, i32), end: (i32, i32)) -> TargetRange {
        TargetRange::new(pos(start.0, start.1), pos(end.0, end.1))
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    async fn setup() -> (InMemoryStore, ProgressLedger, Uuid) {
        let store = InMemoryStore::new();
        let student = store.add_student(Uuid::new_v4(), "Aisyah").await;
        let ledger = ProgressLedger::new(Arc::new(store.clone()));
        (store, ledger, student)
    }

    async fn assert_consistent(ledger: &ProgressLedger, student: Uuid) {
        let log = ledger.get_or_create(student, day()).await.unwrap();
        assert!(log.is_consistent(), "totals drifted: {log:?}");
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let (store, ledger, student) = setup().await;

        let first = ledger.get_or_create(student, day()).await.unwrap();
        let second = ledger.get_or_create(student, day()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.totals, DailyTotals::default());
        assert_eq!(store.daily_log_count(student).await, 1);
    }

    #[tokio::test]
    async fn concurrent_get_or_create_yields_one_log() {
        let (store, ledger, student) = setup().await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.get_or_create(student, day()).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();

        assert_eq!(ids.len(), 1);
        assert_eq!(store.daily_log_count(student).await, 1);
    }

    #[tokio::test]
    async fn add_session_updates_totals() {
        let (_, ledger, student) = setup().await;

        let session = ledger
            .add_session(student, day(), "Subuh".into(), range((1, 15), (2, 5)), "".into())
            .await
            .unwrap();

        assert_eq!(session.target_pages, 11);
        assert_eq!(session.completed_pages, 0);
        assert_eq!(session.completed_end, None);
        assert_eq!(session.status(), SessionStatus::NotStarted);

        let log = ledger.get_or_create(student, day()).await.unwrap();
        assert_eq!(log.totals.target_pages, 11);
        assert_eq!(log.sessions.len(), 1);
    }

    #[tokio::test]
    async fn invalid_target_persists_nothing() {
        let (store, ledger, student) = setup().await;

        let err = ledger
            .add_session(student, day(), "Subuh".into(), range((2, 1), (1, 20)), "".into())
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::InvalidRange { .. }));
        assert_eq!(store.daily_log_count(student).await, 0);
    }

    #[tokio::test]
    async fn overflowing_day_totals_roll_back_the_new_session() {
        let (_, ledger, student) = setup().await;
        let widest = range((1, 1), (1, i32::MAX));

        let first = ledger
            .add_session(student, day(), "Subuh".into(), widest, "".into())
            .await
            .unwrap();
        assert_eq!(first.target_pages, i32::MAX);

        let err = ledger
            .add_session(student, day(), "Isya".into(), widest, "".into())
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::TotalsOverflow);

        let log = ledger.get_or_create(student, day()).await.unwrap();
        assert_eq!(log.sessions.len(), 1);
        assert_eq!(log.totals.target_pages, i32::MAX);
    }

    #[tokio::test]
    async fn overshooting_progress_is_clamped_to_target() {
        let (_, ledger, student) = setup().await;
        let session = ledger
            .add_session(student, day(), "Subuh".into(), range((1, 1), (1, 10)), "".into())
            .await
            .unwrap();

        let updated = ledger
            .update_progress(student, session.id, pos(1, 15), "lancar".into())
            .await
            .unwrap();

        assert_eq!(updated.completed_pages, 10);
        assert_eq!(updated.status(), SessionStatus::Completed);
        assert_eq!(updated.note, "lancar");

        let log = ledger.get_or_create(student, day()).await.unwrap();
        assert_eq!(log.totals.completed_pages, 10);
    }

    #[tokio::test]
    async fn partial_progress_is_in_progress() {
        let (_, ledger, student) = setup().await;
        let session = ledger
            .add_session(student, day(), "Maghrib".into(), range((3, 10), (4, 10)), "".into())
            .await
            .unwrap();
        assert_eq!(session.target_pages, 21);

        let updated = ledger
            .update_progress(student, session.id, pos(3, 20), "".into())
            .await
            .unwrap();

        assert_eq!(updated.completed_pages, 11);
        assert_eq!(updated.status(), SessionStatus::InProgress);
    }

    #[tokio::test]
    async fn progress_before_target_start_is_rejected() {
        let (_, ledger, student) = setup().await;
        let session = ledger
            .add_session(student, day(), "Subuh".into(), range((5, 5), (5, 15)), "".into())
            .await
            .unwrap();

        let err = ledger
            .update_progress(student, session.id, pos(5, 4), "".into())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRange { .. }));

        let log = ledger.get_or_create(student, day()).await.unwrap();
        assert_eq!(log.sessions[0].completed_pages, 0);
    }

    #[tokio::test]
    async fn other_students_sessions_are_not_found() {
        let (store, ledger, student) = setup().await;
        let intruder = store.add_student(Uuid::new_v4(), "Budi").await;
        let session = ledger
            .add_session(student, day(), "Subuh".into(), range((1, 1), (1, 10)), "".into())
            .await
            .unwrap();

        let err = ledger
            .update_progress(intruder, session.id, pos(1, 5), "".into())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));

        let err = ledger.delete_session(intruder, session.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));

        let err = ledger.delete_session(student, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_only_session_zeroes_totals() {
        let (_, ledger, student) = setup().await;
        let session = ledger
            .add_session(student, day(), "Subuh".into(), range((1, 1), (1, 10)), "".into())
            .await
            .unwrap();
        ledger
            .update_progress(student, session.id, pos(1, 6), "".into())
            .await
            .unwrap();

        ledger.delete_session(student, session.id).await.unwrap();

        let log = ledger.get_or_create(student, day()).await.unwrap();
        assert_eq!(log.totals, DailyTotals::default());
        assert!(log.sessions.is_empty());
    }

    #[tokio::test]
    async fn totals_track_any_sequence_of_mutations() {
        let (_, ledger, student) = setup().await;
        let mut ids = Vec::new();

        for i in 0..6 {
            let start = (i % 3 + 1, (i * 3) % 20 + 1);
            let end = (start.0 + i % 2, 20);
            let s = ledger
                .add_session(student, day(), format!("sesi {i}"), range(start, end), "".into())
                .await
                .unwrap();
            ids.push((s.id, start));
            assert_consistent(&ledger, student).await;
        }

        for (n, (id, start)) in ids.iter().enumerate() {
            let reached = pos(start.0, (start.1 + n as i32 * 4).min(20));
            ledger
                .update_progress(student, *id, reached, "".into())
                .await
                .unwrap();
            assert_consistent(&ledger, student).await;
        }

        for (id, _) in ids.iter().step_by(2) {
            ledger.delete_session(student, *id).await.unwrap();
            assert_consistent(&ledger, student).await;
        }

        let log = ledger.get_or_create(student, day()).await.unwrap();
        assert_eq!(log.sessions.len(), 3);
    }

    #[tokio::test]
    async fn recommendation_becomes_labelled_session() {
        let (store, ledger, student) = setup().await;
        let rec = recommendation(Some(student), "Ba'da Subuh");
        store.add_recommendation(rec.clone()).await;

        let session = ledger
            .apply_recommendation(student, day(), rec.id, range((1, 1), (1, 5)), "".into())
            .await
            .unwrap();

        assert_eq!(session.label, "AI: Ba'da Subuh");
        let log = ledger.get_or_create(student, day()).await.unwrap();
        assert_eq!(log.totals.target_pages, 5);
    }

    #[tokio::test]
    async fn foreign_or_missing_recommendation_is_not_found() {
        let (store, ledger, student) = setup().await;
        let foreign = recommendation(Some(Uuid::new_v4()), "Ba'da Isya");
        store.add_recommendation(foreign.clone()).await;

        for id in [foreign.id, Uuid::new_v4()] {
            let err = ledger
                .apply_recommendation(student, day(), id, range((1, 1), (1, 5)), "".into())
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::NotFound(_)));
        }
        assert_eq!(store.daily_log_count(student).await, 0);
    }

    #[tokio::test]
    async fn mentor_reads_only_supervised_students() {
        let store = InMemoryStore::new();
        let mentor = Uuid::new_v4();
        let student = store.add_student(mentor, "Aisyah").await;
        let ledger = ProgressLedger::new(Arc::new(store.clone()));

        let log = ledger
            .get_or_create_for_mentor(mentor, student, day())
            .await
            .unwrap();
        assert_eq!(log.student_id, student);

        let err = ledger
            .get_or_create_for_mentor(Uuid::new_v4(), student, day())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden(_)));

        let err = ledger
            .get_or_create_for_mentor(mentor, Uuid::new_v4(), day())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden(_)));
    }

    #[tokio::test]
    async fn failed_recompute_rolls_back_the_session_write() {
        let store = InMemoryStore::new();
        let student = store.add_student(Uuid::new_v4(), "Aisyah").await;
        let healthy = ProgressLedger::new(Arc::new(store.clone()));
        let session = healthy
            .add_session(student, day(), "Subuh".into(), range((1, 1), (1, 10)), "".into())
            .await
            .unwrap();

        let broken = ProgressLedger::new(Arc::new(FailingTotals(store.clone())));

        let err = broken
            .add_session(student, day(), "Isya".into(), range((1, 1), (1, 4)), "".into())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Persistence(_)));

        let err = broken
            .update_progress(student, session.id, pos(1, 10), "".into())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Persistence(_)));

        let log = healthy.get_or_create(student, day()).await.unwrap();
        assert_eq!(log.sessions.len(), 1);
        assert_eq!(log.sessions[0].completed_pages, 0);
        assert_eq!(log.totals.target_pages, 10);
        assert!(log.is_consistent());
    }

    fn recommendation(student_id: Option<Uuid>, schedule: &str) -> Recommendation {
        Recommendation {
            id: Uuid::new_v4(),
            student_id,
            mentor_id: None,
            state: "sibuk_banyak".to_string(),
            schedule: schedule.to_string(),
            kind: "Spesifik".to_string(),
            q_value: Some(0.8),
            created_at: Utc::now(),
        }
    }

    /// A store whose transactions refuse to persist daily totals.
    struct FailingTotals(InMemoryStore);

    struct FailingTx(Box<dyn LedgerTransaction>);

    #[async_trait]
    impl LedgerStore for FailingTotals {
        async fn begin(&self) -> PortResult<Box<dyn LedgerTransaction>> {
            Ok(Box::new(FailingTx(self.0.begin().await?)))
        }
    }

    #[async_trait]
    impl LedgerTransaction for FailingTx {
        async fn get_or_create_daily_log(
            &mut self,
            student_id: Uuid,
            date: NaiveDate,
        ) -> PortResult<DailyLog> {
            self.0.get_or_create_daily_log(student_id, date).await
        }

        async fn mentor_of_student(&mut self, student_id: Uuid) -> PortResult<Uuid> {
            self.0.mentor_of_student(student_id).await
        }

        async fn find_recommendation(&mut self, id: Uuid) -> PortResult<Recommendation> {
            self.0.find_recommendation(id).await
        }

        async fn find_session(&mut self, session_id: Uuid) -> PortResult<OwnedSession> {
            self.0.find_session(session_id).await
        }

        async fn insert_session(
            &mut self,
            daily_log_id: Uuid,
            session: &NewSessionDetail,
        ) -> PortResult<SessionDetail> {
            self.0.insert_session(daily_log_id, session).await
        }

        async fn update_session(&mut self, session: &SessionDetail) -> PortResult<SessionDetail> {
            self.0.update_session(session).await
        }

        async fn delete_session(&mut self, session_id: Uuid) -> PortResult<()> {
            self.0.delete_session(session_id).await
        }

        async fn list_sessions(&mut self, daily_log_id: Uuid) -> PortResult<Vec<SessionDetail>> {
            self.0.list_sessions(daily_log_id).await
        }

        async fn write_totals(&mut self, _: Uuid, _: DailyTotals) -> PortResult<()> {
            Err(PortError::Unexpected("disk full".to_string()))
        }

        async fn commit(self: Box<Self>) -> PortResult<()> {
            self.0.commit().await
        }
    }
}
