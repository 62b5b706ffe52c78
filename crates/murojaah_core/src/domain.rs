//! crates/murojaah_core/src/domain.rs
//!
//! Defines the pure, core data structures for the progress ledger.
//! These structs are independent of any database or serialization format.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::pages;

//=========================================================================================
// Page Coordinates
//=========================================================================================

/// A point in the text, expressed as a page within a juz.
///
/// Ordering is lexicographic: juz first, then page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PagePosition {
    pub juz: i32,
    pub page: i32,
}

impl PagePosition {
    pub fn new(juz: i32, page: i32) -> Self {
        Self { juz, page }
    }
}

impl fmt::Display for PagePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "juz {} page {}", self.juz, self.page)
    }
}

/// An inclusive (start, end) interval of pages a session aims to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetRange {
    pub start: PagePosition,
    pub end: PagePosition,
}

impl TargetRange {
    pub fn new(start: PagePosition, end: PagePosition) -> Self {
        Self { start, end }
    }

    pub fn total_pages(&self) -> Result<i32, LedgerError> {
        pages::total_pages(self.start, self.end)
    }
}

//=========================================================================================
// Session Status
//=========================================================================================

/// Progress state of a single session, always derived from its page counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl SessionStatus {
    /// Derives the status from a completed page count and its target.
    pub fn from_pages(completed_pages: i32, target_pages: i32) -> Self {
        if completed_pages >= target_pages {
            Self::Completed
        } else if completed_pages > 0 {
            Self::InProgress
        } else {
            Self::NotStarted
        }
    }

    /// The label rendered to clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "Belum Selesai",
            Self::InProgress => "Berjalan",
            Self::Completed => "Selesai",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caps a raw completed page count to `0..=target_pages`.
pub fn clamp_completed(raw_completed: i32, target_pages: i32) -> i32 {
    raw_completed.clamp(0, target_pages.max(0))
}

//=========================================================================================
// Session Detail
//=========================================================================================

/// One practice session within a daily log.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDetail {
    pub id: Uuid,
    pub daily_log_id: Uuid,
    pub label: String,
    pub target: TargetRange,
    pub target_pages: i32,
    /// Furthest position reached so far. `None` until progress is first reported.
    pub completed_end: Option<PagePosition>,
    pub completed_pages: i32,
    pub note: String,
    pub updated_at: DateTime<Utc>,
}

impl SessionDetail {
    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_pages(self.completed_pages, self.target_pages)
    }

    /// Records progress up to `completed_end`, measured from the start of the target.
    ///
    /// Progress beyond the target is capped at the target's page count. On error the
    /// session is left untouched.
    pub fn apply_progress(
        &mut self,
        completed_end: PagePosition,
        note: String,
    ) -> Result<SessionStatus, LedgerError> {
        let raw = pages::total_pages(self.target.start, completed_end)?;

        self.completed_end = Some(completed_end);
        self.completed_pages = clamp_completed(raw, self.target_pages);
        self.note = note;
        Ok(self.status())
    }
}

/// A validated session waiting to be inserted into a daily log.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSessionDetail {
    pub label: String,
    pub target: TargetRange,
    pub target_pages: i32,
    pub note: String,
}

impl NewSessionDetail {
    /// Validates the target range and computes its page count.
    pub fn new(label: String, target: TargetRange, note: String) -> Result<Self, LedgerError> {
        let target_pages = target.total_pages()?;
        if target_pages <= 0 {
            return Err(LedgerError::NonPositiveTarget(target_pages));
        }
        Ok(Self {
            label,
            target,
            target_pages,
            note,
        })
    }
}

//=========================================================================================
// Daily Log
//=========================================================================================

/// Cached page totals of a daily log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyTotals {
    pub target_pages: i32,
    pub completed_pages: i32,
}

impl DailyTotals {
    /// Sums the page counts of every session.
    pub fn from_sessions(sessions: &[SessionDetail]) -> Result<Self, LedgerError> {
        sessions.iter().try_fold(Self::default(), |acc, s| {
            let target_pages = acc.target_pages.checked_add(s.target_pages);
            let completed_pages = acc.completed_pages.checked_add(s.completed_pages);
            match (target_pages, completed_pages) {
                (Some(target_pages), Some(completed_pages)) => Ok(Self {
                    target_pages,
                    completed_pages,
                }),
                _ => Err(LedgerError::TotalsOverflow),
            }
        })
    }
}

/// One student's revision record for one calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyLog {
    pub id: Uuid,
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub totals: DailyTotals,
    pub sessions: Vec<SessionDetail>,
}

impl DailyLog {
    /// Whether the cached totals agree with the loaded sessions.
    pub fn is_consistent(&self) -> bool {
        DailyTotals::from_sessions(&self.sessions).is_ok_and(|totals| totals == self.totals)
    }
}

/// Drops the time-of-day so every instant within a day maps to the same log key.
pub fn day_of(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

//=========================================================================================
// People and Recommendations
//=========================================================================================

/// The minimal view of a student needed by mentor-facing reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentSummary {
    pub id: Uuid,
    pub name: String,
}

/// A previously issued schedule recommendation.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub id: Uuid,
    pub student_id: Option<Uuid>,
    pub mentor_id: Option<Uuid>,
    pub state: String,
    pub schedule: String,
    pub kind: String,
    pub q_value: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Recommendation {
    pub fn is_owned_by_student(&self, student_id: Uuid) -> bool {
        self.student_id == Some(student_id)
    }

    /// Label used for a session created from this recommendation.
    pub fn session_label(&self) -> String {
        format!("AI: {}", self.schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(target_pages: i32) -> SessionDetail {
        SessionDetail {
            id: Uuid::new_v4(),
            daily_log_id: Uuid::new_v4(),
            label: "Subuh".to_string(),
            target: TargetRange::new(PagePosition::new(1, 1), PagePosition::new(1, target_pages)),
            target_pages,
            completed_end: None,
            completed_pages: 0,
            note: String::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn status_follows_page_counts() {
        assert_eq!(SessionStatus::from_pages(0, 10), SessionStatus::NotStarted);
        assert_eq!(SessionStatus::from_pages(1, 10), SessionStatus::InProgress);
        assert_eq!(SessionStatus::from_pages(9, 10), SessionStatus::InProgress);
        assert_eq!(SessionStatus::from_pages(10, 10), SessionStatus::Completed);
    }

    #[test]
    fn progress_past_target_is_capped() {
        let mut s = session(10);
        let status = s
            .apply_progress(PagePosition::new(1, 15), "lancar".to_string())
            .unwrap();

        assert_eq!(status, SessionStatus::Completed);
        assert_eq!(s.completed_pages, 10);
        assert_eq!(s.completed_end, Some(PagePosition::new(1, 15)));
        assert_eq!(s.note, "lancar");
    }

    #[test]
    fn completed_session_can_be_lowered_again() {
        let mut s = session(10);
        s.apply_progress(PagePosition::new(1, 10), String::new()).unwrap();
        assert_eq!(s.status(), SessionStatus::Completed);

        let status = s.apply_progress(PagePosition::new(1, 4), String::new()).unwrap();
        assert_eq!(status, SessionStatus::InProgress);
        assert_eq!(s.completed_pages, 4);
    }

    #[test]
    fn progress_before_target_start_leaves_session_untouched() {
        let mut s = session(10);
        s.target.start = PagePosition::new(2, 5);
        let before = s.clone();

        let err = s
            .apply_progress(PagePosition::new(2, 4), "x".to_string())
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRange { .. }));
        assert_eq!(s, before);
    }

    #[test]
    fn new_session_rejects_empty_span() {
        // Page 21 sits outside a 20-page juz, so the span collapses to zero pages.
        let target = TargetRange::new(PagePosition::new(1, 21), PagePosition::new(2, 0));
        let err = NewSessionDetail::new("Isya".to_string(), target, String::new()).unwrap_err();
        assert!(matches!(err, LedgerError::NonPositiveTarget(0)));
    }

    #[test]
    fn totals_sum_every_session() {
        let mut a = session(10);
        a.completed_pages = 4;
        let b = session(6);
        assert_eq!(
            DailyTotals::from_sessions(&[a, b]),
            Ok(DailyTotals {
                target_pages: 16,
                completed_pages: 4
            })
        );
        assert_eq!(DailyTotals::from_sessions(&[]), Ok(DailyTotals::default()));
    }

    #[test]
    fn totals_reject_sums_beyond_i32() {
        let huge = session(i32::MAX);
        let err = DailyTotals::from_sessions(&[huge.clone(), session(1)]).unwrap_err();
        assert_eq!(err, LedgerError::TotalsOverflow);

        let log = DailyLog {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            totals: DailyTotals::default(),
            sessions: vec![huge.clone(), huge],
        };
        assert!(!log.is_consistent());
    }

    #[test]
    fn day_of_discards_time() {
        let morning = "2024-03-05T01:02:03Z".parse::<DateTime<Utc>>().unwrap();
        let night = "2024-03-05T23:59:59Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(day_of(morning), day_of(night));
    }
}
