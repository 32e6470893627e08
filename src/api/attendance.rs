use crate::attendance::lifecycle::{CheckIn, CheckInOutcome, SessionLifecycle, SweepReport};
use crate::auth::auth::AuthUser;
use crate::model::session::{ClosedSession, OpenSessionView, RecapFilter, RecapPage};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CheckInPayload {
    /// Reference returned by the photo upload service
    #[schema(example = "uploads/1001/20240301-0803.jpg")]
    pub photo_ref: Option<String>,
    /// Reference returned by the geolocation service
    #[schema(example = "-6.2088,106.8456")]
    pub geo_ref: Option<String>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct CheckOutPayload {
    /// Defaults to now
    #[schema(example = "2024-03-01T16:05:00", value_type = Option<String>, format = "date-time")]
    pub departure: Option<NaiveDateTime>,
}

#[derive(Serialize, ToSchema)]
pub struct UnfinishedResponse {
    /// `null` when the employee has no open session
    pub data: Option<OpenSessionView>,
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body(content = CheckInPayload, content_type = "application/json"),
    responses(
        (status = 200, description = "Checked in", body = CheckInOutcome),
        (status = 409, description = "An open session already exists", body = Object, example = json!({
            "error": "duplicate_open_session",
            "message": "You already have an open attendance session; check out first"
        })),
        (status = 422, description = "No shift scheduled or shift code unknown"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 503, description = "Storage unavailable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    lifecycle: web::Data<SessionLifecycle>,
    payload: web::Json<CheckInPayload>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let payload = payload.into_inner();

    let outcome = lifecycle
        .check_in(CheckIn {
            employee_id,
            arrival: lifecycle.now(),
            photo_ref: payload.photo_ref,
            geo_ref: payload.geo_ref,
        })
        .await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/attendance",
    request_body(content = CheckOutPayload, content_type = "application/json"),
    responses(
        (status = 200, description = "Checked out", body = ClosedSession),
        (status = 400, description = "No open session, or invalid departure", body = Object, example = json!({
            "error": "no_open_session",
            "message": "You have no open attendance session to check out"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Transaction failed"),
        (status = 504, description = "Storage timeout")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    lifecycle: web::Data<SessionLifecycle>,
    payload: Option<web::Json<CheckOutPayload>>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let departure = payload.and_then(|p| p.into_inner().departure);

    let closed = lifecycle.checkout(employee_id, departure).await?;

    Ok(HttpResponse::Ok().json(closed))
}

/// Auto-checkout endpoint: closes an overdue session at its scheduled end
#[utoipa::path(
    post,
    path = "/api/attendance/auto-checkout",
    responses(
        (status = 200, description = "Session auto-closed", body = ClosedSession),
        (status = 409, description = "Shift has not ended long enough ago", body = Object, example = json!({
            "error": "not_overdue",
            "message": "Your shift has not ended yet: 1h 0m until auto-checkout is allowed",
            "until_eligible": "1h 0m",
            "remaining": "1h 0m overdue",
            "expected_end": "2024-03-02T06:00:00",
            "eligible_at": "2024-03-02T08:00:00"
        })),
        (status = 400, description = "No open session"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn auto_checkout(
    auth: AuthUser,
    lifecycle: web::Data<SessionLifecycle>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;

    let closed = lifecycle.auto_checkout_now(employee_id).await?;

    Ok(HttpResponse::Ok().json(closed))
}

/// Unfinished-session query; read-only and safe to poll
#[utoipa::path(
    get,
    path = "/api/attendance/unfinished",
    responses(
        (status = 200, description = "Open session with shift timing, or null", body = UnfinishedResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn unfinished(
    auth: AuthUser,
    lifecycle: web::Data<SessionLifecycle>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;

    let data = lifecycle.unfinished(employee_id, lifecycle.now()).await?;

    Ok(HttpResponse::Ok().json(UnfinishedResponse { data }))
}

/// Completed sessions. Employees see their own; HR/Admin may filter by employee.
#[utoipa::path(
    get,
    path = "/api/attendance/recap",
    params(RecapFilter),
    responses(
        (status = 200, description = "Paginated recap", body = RecapPage),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn recap(
    auth: AuthUser,
    lifecycle: web::Data<SessionLifecycle>,
    query: web::Query<RecapFilter>,
) -> actix_web::Result<impl Responder> {
    let mut filter = query.into_inner();
    if !auth.role.supervises_attendance() {
        filter.employee_id = Some(auth.require_employee()?);
    }

    let page = lifecycle.recap(&filter).await?;

    Ok(HttpResponse::Ok().json(page))
}

/// Auto-checkout every overdue open session (HR/Admin/System)
#[utoipa::path(
    post,
    path = "/api/attendance/sweep",
    responses(
        (status = 200, description = "Sweep report", body = SweepReport),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn sweep(
    auth: AuthUser,
    lifecycle: web::Data<SessionLifecycle>,
) -> actix_web::Result<impl Responder> {
    auth.require_supervisor()?;

    tracing::info!(user_id = auth.user_id, username = %auth.username, "Overdue sweep requested");
    let report = lifecycle.sweep_overdue(lifecycle.now()).await?;

    Ok(HttpResponse::Ok().json(report))
}
