//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::dto::{
    AddSessionRequest, ApplyRecommendationRequest, DailyLogResponse, DailyRecapResponse,
    DateQuery, Envelope, MentorDashboardResponse, MentorRollupResponse, SessionResponse,
    StatisticsResponse, StudentInfo, UpdateProgressRequest,
};
use crate::web::extract::{ApiJson, ApiPath, ApiQuery};
use crate::web::middleware::Claims;
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{NaiveDate, Utc};
use murojaah_core::domain::day_of;
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_daily_log_handler,
        add_session_handler,
        update_progress_handler,
        delete_session_handler,
        weekly_recap_handler,
        statistics_handler,
        apply_recommendation_handler,
        mentor_student_log_handler,
        mentor_dashboard_handler,
        mentor_weekly_rollup_handler,
    ),
    components(
        schemas(
            AddSessionRequest,
            UpdateProgressRequest,
            ApplyRecommendationRequest,
            SessionResponse,
            DailyLogResponse,
            DailyRecapResponse,
            StatisticsResponse,
            MentorRollupResponse,
            MentorDashboardResponse,
            StudentInfo,
        )
    ),
    tags(
        (name = "Muroja'ah Ledger API", description = "Daily muroja'ah logs, sessions and recaps.")
    )
)]
pub struct ApiDoc;

fn today() -> NaiveDate {
    day_of(Utc::now())
}

//=========================================================================================
// Student Handlers
//=========================================================================================

/// Get (or lazily create) the caller's daily log.
#[utoipa::path(
    get,
    path = "/api/v1/log-harian",
    params(DateQuery),
    responses(
        (status = 200, description = "Daily log in the response envelope", body = DailyLogResponse),
        (status = 400, description = "Invalid tanggal format"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_daily_log_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let date = query.resolve(today())?;
    let log = app_state.ledger.get_or_create(claims.user_id, date).await?;

    Ok(Json(Envelope::success(
        "Daily log processed",
        DailyLogResponse::from(log),
    )))
}

/// Add a session to today's log.
#[utoipa::path(
    post,
    path = "/api/v1/log-harian/detail",
    request_body = AddSessionRequest,
    responses(
        (status = 201, description = "Session added", body = SessionResponse),
        (status = 400, description = "Target range is reversed or spans no pages"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn add_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<AddSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target = req.target();
    let session = app_state
        .ledger
        .add_session(claims.user_id, today(), req.waktu, target, req.catatan)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(
            "Muroja'ah session added",
            SessionResponse::from(session),
        )),
    ))
}

/// Report progress on one of the caller's sessions.
#[utoipa::path(
    put,
    path = "/api/v1/log-harian/detail/{id}",
    request_body = UpdateProgressRequest,
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Progress recorded", body = SessionResponse),
        (status = 400, description = "Progress ends before the target start"),
        (status = 404, description = "Session not found or not owned by the caller"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_progress_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiPath(session_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateProgressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let completed_end = req.completed_end();
    let session = app_state
        .ledger
        .update_progress(claims.user_id, session_id, completed_end, req.catatan)
        .await?;

    Ok(Json(Envelope::success(
        "Muroja'ah session updated",
        SessionResponse::from(session),
    )))
}

/// Delete one of the caller's sessions.
#[utoipa::path(
    delete,
    path = "/api/v1/log-harian/detail/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session deleted"),
        (status = 404, description = "Session not found or not owned by the caller"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiPath(session_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .ledger
        .delete_session(claims.user_id, session_id)
        .await?;

    Ok(Json(Envelope::empty("Muroja'ah session deleted")))
}

/// Completed pages per logged day over the last seven days.
#[utoipa::path(
    get,
    path = "/api/v1/log-harian/rekap/mingguan",
    responses(
        (status = 200, description = "Weekly recap, oldest day first", body = [DailyRecapResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn weekly_recap_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = app_state.recap.weekly_recap(claims.user_id, today()).await?;
    let rows: Vec<DailyRecapResponse> = rows.into_iter().map(DailyRecapResponse::from).collect();

    Ok(Json(Envelope::success("Weekly recap retrieved", rows)))
}

/// All-time productivity statistics of the caller.
#[utoipa::path(
    get,
    path = "/api/v1/log-harian/statistik",
    responses(
        (status = 200, description = "Statistics", body = StatisticsResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn statistics_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = app_state.recap.productivity(claims.user_id).await?;

    Ok(Json(Envelope::success(
        "Muroja'ah statistics retrieved",
        StatisticsResponse::from(stats),
    )))
}

/// Add a session to today's log from a stored schedule recommendation.
#[utoipa::path(
    post,
    path = "/api/v1/log-harian/detail/dari-rekomendasi",
    request_body = ApplyRecommendationRequest,
    responses(
        (status = 201, description = "Session added", body = SessionResponse),
        (status = 400, description = "Target range is reversed or spans no pages"),
        (status = 404, description = "Recommendation not found or not owned by the caller"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn apply_recommendation_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<ApplyRecommendationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target = req.target();
    let session = app_state
        .ledger
        .apply_recommendation(claims.user_id, today(), req.rekomendasi_id, target, req.catatan)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(
            "Recommendation applied to the daily log",
            SessionResponse::from(session),
        )),
    ))
}

//=========================================================================================
// Mentor Handlers
//=========================================================================================

/// Get (or lazily create) the daily log of a supervised student.
#[utoipa::path(
    get,
    path = "/api/v1/mentor/mahasantri/{student_id}/log-harian",
    params(
        ("student_id" = Uuid, Path, description = "Student id"),
        DateQuery
    ),
    responses(
        (status = 200, description = "Daily log", body = DailyLogResponse),
        (status = 400, description = "Invalid tanggal format"),
        (status = 403, description = "Student is not supervised by the caller"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mentor_student_log_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiPath(student_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let date = query.resolve(today())?;
    let log = app_state
        .ledger
        .get_or_create_for_mentor(claims.user_id, student_id, date)
        .await?;

    Ok(Json(Envelope::success(
        "Daily log processed",
        DailyLogResponse::from(log),
    )))
}

/// Every existing log of the caller's students for one date.
#[utoipa::path(
    get,
    path = "/api/v1/mentor/log-harian-mahasantri",
    params(DateQuery),
    responses(
        (status = 200, description = "Student logs", body = [MentorDashboardResponse]),
        (status = 400, description = "Invalid tanggal format"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mentor_dashboard_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let date = query.resolve(today())?;
    let entries = app_state.recap.mentor_dashboard(claims.user_id, date).await?;
    info!(mentor_id = %claims.user_id, %date, count = entries.len(), "mentor dashboard served");

    let entries: Vec<MentorDashboardResponse> = entries
        .into_iter()
        .map(MentorDashboardResponse::from)
        .collect();
    Ok(Json(Envelope::success("Daily logs retrieved", entries)))
}

/// Seven-day target vs completed totals for every supervised student.
#[utoipa::path(
    get,
    path = "/api/v1/mentor/rekap-bimbingan/mingguan",
    responses(
        (status = 200, description = "Ordered by completed pages", body = [MentorRollupResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mentor_weekly_rollup_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = app_state
        .recap
        .mentor_weekly_rollup(claims.user_id, today())
        .await?;
    let rows: Vec<MentorRollupResponse> =
        rows.into_iter().map(MentorRollupResponse::from).collect();

    Ok(Json(Envelope::success("Weekly roll-up retrieved", rows)))
}
