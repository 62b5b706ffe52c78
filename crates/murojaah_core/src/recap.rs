//! crates/murojaah_core/src/recap.rs
//!
//! Read-only aggregation over stored daily logs.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use crate::domain::{DailyLog, StudentSummary};
use crate::error::LedgerResult;
use crate::ports::{LabelCount, RecapStore, StudentPageTotals};

/// Length of the weekly windows, today included.
pub const RECAP_WINDOW_DAYS: i64 = 7;

/// Pages completed on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyRecap {
    pub date: NaiveDate,
    pub completed_pages: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductivityStats {
    pub total_completed_pages: i64,
    /// Days whose log has at least one completed page.
    pub total_active_days: i64,
    pub average_pages_per_active_day: f64,
    pub most_productive_session_label: Option<String>,
    pub most_productive_day: Option<DailyRecap>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MentorRollupRow {
    pub student: StudentSummary,
    pub target_pages: i64,
    pub completed_pages: i64,
    pub achievement_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MentorDashboardEntry {
    pub student: StudentSummary,
    pub log: DailyLog,
}

/// The inclusive `(first, last)` dates of the week ending on `today`.
pub fn week_ending(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today - Duration::days(RECAP_WINDOW_DAYS - 1), today)
}

/// Folds per-day totals and per-label counts into productivity statistics.
///
/// Ties pick the earliest entry: the first day in `days`, the first label in `labels`.
pub fn summarize_productivity(days: &[DailyRecap], labels: &[LabelCount]) -> ProductivityStats {
    let active: Vec<&DailyRecap> = days.iter().filter(|d| d.completed_pages > 0).collect();

    let total_completed_pages: i64 = active.iter().map(|d| i64::from(d.completed_pages)).sum();
    let total_active_days = active.len() as i64;
    let average_pages_per_active_day = if total_active_days > 0 {
        total_completed_pages as f64 / total_active_days as f64
    } else {
        0.0
    };

    let most_productive_day = days
        .iter()
        .fold(None::<&DailyRecap>, |best, day| match best {
            Some(b) if b.completed_pages >= day.completed_pages => Some(b),
            _ => Some(day),
        })
        .copied();

    let most_productive_session_label = labels
        .iter()
        .filter(|l| l.completed_sessions > 0)
        .fold(None::<&LabelCount>, |best, label| match best {
            Some(b) if b.completed_sessions >= label.completed_sessions => Some(b),
            _ => Some(label),
        })
        .map(|l| l.label.clone());

    ProductivityStats {
        total_completed_pages,
        total_active_days,
        average_pages_per_active_day,
        most_productive_session_label,
        most_productive_day,
    }
}

/// Adds achievement percentages and orders students by completed pages, highest first.
pub fn rollup(totals: Vec<StudentPageTotals>) -> Vec<MentorRollupRow> {
    let mut rows: Vec<MentorRollupRow> = totals
        .into_iter()
        .map(|t| MentorRollupRow {
            achievement_percent: achievement_percent(t.completed_pages, t.target_pages),
            student: t.student,
            target_pages: t.target_pages,
            completed_pages: t.completed_pages,
        })
        .collect();
    rows.sort_by(|a, b| b.completed_pages.cmp(&a.completed_pages));
    rows
}

fn achievement_percent(completed: i64, target: i64) -> f64 {
    if target > 0 {
        completed as f64 / target as f64 * 100.0
    } else {
        0.0
    }
}

/// Read-only queries over a [`RecapStore`].
#[derive(Clone)]
pub struct RecapReader {
    store: Arc<dyn RecapStore>,
}

impl RecapReader {
    pub fn new(store: Arc<dyn RecapStore>) -> Self {
        Self { store }
    }

    /// Completed pages for each logged day of the week ending on `today`, oldest first.
    /// Days without a log are absent rather than zero.
    pub async fn weekly_recap(
        &self,
        student_id: Uuid,
        today: NaiveDate,
    ) -> LedgerResult<Vec<DailyRecap>> {
        let (from, to) = week_ending(today);
        Ok(self.store.daily_completed_between(student_id, from, to).await?)
    }

    pub async fn productivity(&self, student_id: Uuid) -> LedgerResult<ProductivityStats> {
        let days = self.store.daily_completed(student_id).await?;
        let labels = self.store.completed_label_counts(student_id).await?;
        Ok(summarize_productivity(&days, &labels))
    }

    pub async fn mentor_weekly_rollup(
        &self,
        mentor_id: Uuid,
        today: NaiveDate,
    ) -> LedgerResult<Vec<MentorRollupRow>> {
        let (from, to) = week_ending(today);
        let totals = self.store.mentor_student_totals(mentor_id, from, to).await?;
        Ok(rollup(totals))
    }

    pub async fn mentor_dashboard(
        &self,
        mentor_id: Uuid,
        date: NaiveDate,
    ) -> LedgerResult<Vec<MentorDashboardEntry>> {
        let logs = self.store.mentor_daily_logs(mentor_id, date).await?;
        Ok(logs
            .into_iter()
            .map(|(student, log)| MentorDashboardEntry { student, log })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PagePosition, TargetRange};
    use crate::ledger::ProgressLedger;
    use crate::memory::InMemoryStore;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn recap(d: u32, completed_pages: i32) -> DailyRecap {
        DailyRecap {
            date: date(d),
            completed_pages,
        }
    }

    fn label(label: &str, completed_sessions: i64) -> LabelCount {
        LabelCount {
            label: label.to_string(),
            completed_sessions,
        }
    }

    fn student(name: &str) -> StudentSummary {
        StudentSummary {
            id: Uuid::new_v4(),
            name: name.to_string(),
        }
    }

    #[test]
    fn week_includes_today_and_six_days_back() {
        assert_eq!(week_ending(date(10)), (date(4), date(10)));
    }

    #[test]
    fn productivity_ignores_idle_days() {
        let stats = summarize_productivity(
            &[recap(1, 4), recap(2, 0), recap(3, 8)],
            &[label("Subuh", 2)],
        );

        assert_eq!(stats.total_completed_pages, 12);
        assert_eq!(stats.total_active_days, 2);
        assert_eq!(stats.average_pages_per_active_day, 6.0);
        assert_eq!(stats.most_productive_day, Some(recap(3, 8)));
        assert_eq!(stats.most_productive_session_label.as_deref(), Some("Subuh"));
    }

    #[test]
    fn productivity_without_activity_is_zeroed() {
        let stats = summarize_productivity(&[recap(1, 0), recap(2, 0)], &[]);

        assert_eq!(stats.total_completed_pages, 0);
        assert_eq!(stats.total_active_days, 0);
        assert_eq!(stats.average_pages_per_active_day, 0.0);
        assert_eq!(stats.most_productive_day, Some(recap(1, 0)));
        assert_eq!(stats.most_productive_session_label, None);
    }

    #[test]
    fn productivity_without_logs_has_no_best_day() {
        let stats = summarize_productivity(&[], &[]);
        assert_eq!(stats.most_productive_day, None);
    }

    #[test]
    fn productivity_ties_pick_first_entry() {
        let stats = summarize_productivity(
            &[recap(1, 5), recap(2, 9), recap(3, 9)],
            &[label("Ashar", 3), label("Isya", 3), label("Subuh", 1)],
        );

        assert_eq!(stats.most_productive_day, Some(recap(2, 9)));
        assert_eq!(stats.most_productive_session_label.as_deref(), Some("Ashar"));
    }

    #[test]
    fn rollup_orders_by_completed_and_guards_zero_target() {
        let rows = rollup(vec![
            StudentPageTotals {
                student: student("Aisyah"),
                target_pages: 20,
                completed_pages: 5,
            },
            StudentPageTotals {
                student: student("Budi"),
                target_pages: 0,
                completed_pages: 0,
            },
            StudentPageTotals {
                student: student("Citra"),
                target_pages: 40,
                completed_pages: 30,
            },
        ]);

        let names: Vec<&str> = rows.iter().map(|r| r.student.name.as_str()).collect();
        assert_eq!(names, ["Citra", "Aisyah", "Budi"]);
        assert_eq!(rows[0].achievement_percent, 75.0);
        assert_eq!(rows[1].achievement_percent, 25.0);
        assert_eq!(rows[2].achievement_percent, 0.0);
    }

    #[tokio::test]
    async fn weekly_recap_reads_only_the_window() {
        let store = InMemoryStore::new();
        let student = store.add_student(Uuid::new_v4(), "Aisyah").await;
        let ledger = ProgressLedger::new(Arc::new(store.clone()));
        let reader = RecapReader::new(Arc::new(store.clone()));
        let target = TargetRange::new(PagePosition::new(1, 1), PagePosition::new(1, 10));

        for d in [2, 3, 9] {
            let s = ledger
                .add_session(student, date(d), "Subuh".into(), target, "".into())
                .await
                .unwrap();
            ledger
                .update_progress(student, s.id, PagePosition::new(1, d as i32), "".into())
                .await
                .unwrap();
        }
        // An untouched log inside the window still shows up, with zero pages.
        ledger.get_or_create(student, date(8)).await.unwrap();

        let rows = reader.weekly_recap(student, date(9)).await.unwrap();
        assert_eq!(rows, [recap(3, 3), recap(8, 0), recap(9, 9)]);
    }

    #[tokio::test]
    async fn mentor_rollup_includes_idle_students() {
        let store = InMemoryStore::new();
        let mentor = Uuid::new_v4();
        let active = store.add_student(mentor, "Aisyah").await;
        store.add_student(mentor, "Budi").await;
        store.add_student(Uuid::new_v4(), "Other mentor's").await;
        let ledger = ProgressLedger::new(Arc::new(store.clone()));
        let reader = RecapReader::new(Arc::new(store.clone()));

        let s = ledger
            .add_session(
                active,
                date(9),
                "Subuh".into(),
                TargetRange::new(PagePosition::new(1, 1), PagePosition::new(1, 8)),
                "".into(),
            )
            .await
            .unwrap();
        ledger
            .update_progress(active, s.id, PagePosition::new(1, 2), "".into())
            .await
            .unwrap();

        let rows = reader.mentor_weekly_rollup(mentor, date(10)).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].student.id, active);
        assert_eq!(rows[0].target_pages, 8);
        assert_eq!(rows[0].completed_pages, 2);
        assert_eq!(rows[0].achievement_percent, 25.0);
        assert_eq!(rows[1].student.name, "Budi");
        assert_eq!(rows[1].target_pages, 0);

        let dashboard = reader.mentor_dashboard(mentor, date(9)).await.unwrap();
        assert_eq!(dashboard.len(), 1);
        assert_eq!(dashboard[0].log.sessions.len(), 1);
        assert!(reader.mentor_dashboard(mentor, date(10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn productivity_counts_completed_sessions_per_label() {
        let store = InMemoryStore::new();
        let student = store.add_student(Uuid::new_v4(), "Aisyah").await;
        let ledger = ProgressLedger::new(Arc::new(store.clone()));
        let reader = RecapReader::new(Arc::new(store.clone()));
        let target = TargetRange::new(PagePosition::new(2, 1), PagePosition::new(2, 4));

        let sessions = [(1, "Isya", 4), (2, "Isya", 4), (2, "Subuh", 4), (3, "Subuh", 2)];
        for (d, label, reached) in sessions {
            let s = ledger
                .add_session(student, date(d), label.into(), target, "".into())
                .await
                .unwrap();
            ledger
                .update_progress(student, s.id, PagePosition::new(2, reached), "".into())
                .await
                .unwrap();
        }

        let stats = reader.productivity(student).await.unwrap();
        assert_eq!(stats.total_completed_pages, 14);
        assert_eq!(stats.total_active_days, 3);
        assert_eq!(stats.most_productive_session_label.as_deref(), Some("Isya"));
        assert_eq!(stats.most_productive_day, Some(recap(2, 8)));
    }
}
