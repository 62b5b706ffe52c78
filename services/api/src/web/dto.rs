//! services/api/src/web/dto.rs
//!
//! Request and response payloads of the REST API, plus their conversions from the
//! core domain types.

use chrono::{DateTime, NaiveDate, Utc};
use murojaah_core::domain::{DailyLog, PagePosition, SessionDetail, TargetRange};
use murojaah_core::recap::{DailyRecap, MentorDashboardEntry, MentorRollupRow, ProductivityStats};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;

/// Date format used in responses.
pub const RESPONSE_DATE_FORMAT: &str = "%d-%m-%Y";
/// Date format accepted by the `tanggal` query filter.
pub const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn render_date(date: NaiveDate) -> String {
    date.format(RESPONSE_DATE_FORMAT).to_string()
}

//=========================================================================================
// Response Envelope
//=========================================================================================

/// The wrapper every endpoint responds with.
#[derive(Serialize, Debug)]
pub struct Envelope<T: Serialize> {
    pub status: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    /// A rejected request. `error` carries the detail when it is safe to show.
    pub fn failure(message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
            data: None,
            error,
        }
    }
}

impl Envelope<()> {
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            status: true,
            message: message.into(),
            data: None,
            error: None,
        }
    }
}

//=========================================================================================
// Requests
//=========================================================================================

#[derive(Deserialize, ToSchema, Debug)]
pub struct AddSessionRequest {
    /// Session label, usually a time of day.
    pub waktu: String,
    pub target_start_juz: i32,
    pub target_start_halaman: i32,
    pub target_end_juz: i32,
    pub target_end_halaman: i32,
    #[serde(default)]
    pub catatan: String,
}

impl AddSessionRequest {
    pub fn target(&self) -> TargetRange {
        TargetRange::new(
            PagePosition::new(self.target_start_juz, self.target_start_halaman),
            PagePosition::new(self.target_end_juz, self.target_end_halaman),
        )
    }
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct UpdateProgressRequest {
    pub selesai_end_juz: i32,
    pub selesai_end_halaman: i32,
    #[serde(default)]
    pub catatan: String,
}

impl UpdateProgressRequest {
    pub fn completed_end(&self) -> PagePosition {
        PagePosition::new(self.selesai_end_juz, self.selesai_end_halaman)
    }
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct ApplyRecommendationRequest {
    pub rekomendasi_id: Uuid,
    pub target_start_juz: i32,
    pub target_start_halaman: i32,
    pub target_end_juz: i32,
    pub target_end_halaman: i32,
    #[serde(default)]
    pub catatan: String,
}

impl ApplyRecommendationRequest {
    pub fn target(&self) -> TargetRange {
        TargetRange::new(
            PagePosition::new(self.target_start_juz, self.target_start_halaman),
            PagePosition::new(self.target_end_juz, self.target_end_halaman),
        )
    }
}

/// Optional `?tanggal=yyyy-mm-dd` filter.
#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct DateQuery {
    pub tanggal: Option<String>,
}

impl DateQuery {
    /// The requested date, or `today` when none was given.
    pub fn resolve(&self, today: NaiveDate) -> Result<NaiveDate, ApiError> {
        match self.tanggal.as_deref().map(str::trim) {
            None | Some("") => Ok(today),
            Some(raw) => NaiveDate::parse_from_str(raw, QUERY_DATE_FORMAT).map_err(|_| {
                ApiError::BadRequest("Invalid tanggal format, use YYYY-MM-DD".to_string())
            }),
        }
    }
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Serialize, ToSchema, Debug)]
pub struct SessionResponse {
    pub id: Uuid,
    pub waktu_murojaah: String,
    pub target_start_juz: i32,
    pub target_start_halaman: i32,
    pub target_end_juz: i32,
    pub target_end_halaman: i32,
    pub total_target_halaman: i32,
    pub selesai_end_juz: Option<i32>,
    pub selesai_end_halaman: Option<i32>,
    pub total_selesai_halaman: i32,
    /// One of `Belum Selesai`, `Berjalan`, `Selesai`.
    pub status: String,
    pub catatan: String,
    pub updated_at: DateTime<Utc>,
}

impl From<SessionDetail> for SessionResponse {
    fn from(s: SessionDetail) -> Self {
        Self {
            status: s.status().to_string(),
            id: s.id,
            waktu_murojaah: s.label,
            target_start_juz: s.target.start.juz,
            target_start_halaman: s.target.start.page,
            target_end_juz: s.target.end.juz,
            target_end_halaman: s.target.end.page,
            total_target_halaman: s.target_pages,
            selesai_end_juz: s.completed_end.map(|p| p.juz),
            selesai_end_halaman: s.completed_end.map(|p| p.page),
            total_selesai_halaman: s.completed_pages,
            catatan: s.note,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct DailyLogResponse {
    pub id: Uuid,
    /// `dd-mm-yyyy`
    pub tanggal: String,
    pub total_target_halaman: i32,
    pub total_selesai_halaman: i32,
    pub detail_logs: Vec<SessionResponse>,
}

impl From<DailyLog> for DailyLogResponse {
    fn from(log: DailyLog) -> Self {
        Self {
            id: log.id,
            tanggal: render_date(log.date),
            total_target_halaman: log.totals.target_pages,
            total_selesai_halaman: log.totals.completed_pages,
            detail_logs: log.sessions.into_iter().map(SessionResponse::from).collect(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct DailyRecapResponse {
    pub tanggal: String,
    pub total_selesai_halaman: i32,
}

impl From<DailyRecap> for DailyRecapResponse {
    fn from(r: DailyRecap) -> Self {
        Self {
            tanggal: render_date(r.date),
            total_selesai_halaman: r.completed_pages,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct StatisticsResponse {
    pub total_selesai_halaman: i64,
    pub total_hari_aktif: i64,
    pub rata_rata_halaman_per_hari: f64,
    pub sesi_paling_produktif: Option<String>,
    pub hari_paling_produktif: Option<DailyRecapResponse>,
}

impl From<ProductivityStats> for StatisticsResponse {
    fn from(s: ProductivityStats) -> Self {
        Self {
            total_selesai_halaman: s.total_completed_pages,
            total_hari_aktif: s.total_active_days,
            rata_rata_halaman_per_hari: s.average_pages_per_active_day,
            sesi_paling_produktif: s.most_productive_session_label,
            hari_paling_produktif: s.most_productive_day.map(DailyRecapResponse::from),
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct MentorRollupResponse {
    pub mahasantri_id: Uuid,
    pub nama_mahasantri: String,
    pub total_target_halaman_mingguan: i64,
    pub total_selesai_halaman_mingguan: i64,
    pub persentase_pencapaian: f64,
}

impl From<MentorRollupRow> for MentorRollupResponse {
    fn from(r: MentorRollupRow) -> Self {
        Self {
            mahasantri_id: r.student.id,
            nama_mahasantri: r.student.name,
            total_target_halaman_mingguan: r.target_pages,
            total_selesai_halaman_mingguan: r.completed_pages,
            persentase_pencapaian: r.achievement_percent,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct StudentInfo {
    pub id: Uuid,
    pub nama: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct MentorDashboardResponse {
    pub log_id: Uuid,
    pub tanggal: String,
    pub total_target_halaman: i32,
    pub total_selesai_halaman: i32,
    pub mahasantri: StudentInfo,
    pub detail_logs: Vec<SessionResponse>,
}

impl From<MentorDashboardEntry> for MentorDashboardResponse {
    fn from(entry: MentorDashboardEntry) -> Self {
        let MentorDashboardEntry { student, log } = entry;
        Self {
            log_id: log.id,
            tanggal: render_date(log.date),
            total_target_halaman: log.totals.target_pages,
            total_selesai_halaman: log.totals.completed_pages,
            mahasantri: StudentInfo {
                id: student.id,
                nama: student.name,
            },
            detail_logs: log.sessions.into_iter().map(SessionResponse::from).collect(),
        }
    }
}
