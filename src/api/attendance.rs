use actix_web::{HttpRequest, HttpResponse, Responder, http::header, web};
use chrono::{Duration, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::auth::auth::AuthStaff;
use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, GeoPoint, Shift};
use crate::model::report::{AttendanceOverview, AttendanceSummary};
use crate::model::staff::{StaffCategory, StaffRef};
use crate::service::SharedAttendanceService;
use crate::service::attendance::{AmendAttendance, ClockContext};
use crate::store::{AttendanceFilter, DateRange};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ClockInRequest {
    pub shift: Option<Shift>,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ClockOutRequest {
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BreakStartRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttendanceListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
    pub staff_category: Option<StaffCategory>,
    pub staff_id: Option<u64>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: Option<NaiveDate>,
    #[schema(example = "2026-01-31", format = "date", value_type = String)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RangeQuery {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: Option<NaiveDate>,
    #[schema(example = "2026-01-31", format = "date", value_type = String)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceRecord>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 57)]
    pub total: i64,
}

fn clock_context(req: &HttpRequest, location: Option<GeoPoint>) -> ClockContext {
    ClockContext {
        location,
        device: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string),
        ip_address: req
            .connection_info()
            .realip_remote_addr()
            .map(str::to_string),
    }
}

/// Day-inclusive range; defaults to first-of-current-month .. today.
fn range_from(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> DateRange {
    let today = Utc::now().date_naive();
    let start = start_date.unwrap_or_else(|| today.with_day(1).unwrap_or(today));
    let end = end_date.unwrap_or(today);
    DateRange {
        start: start.and_time(NaiveTime::MIN).and_utc(),
        end: (end + Duration::days(1)).and_time(NaiveTime::MIN).and_utc(),
    }
}

/// Clock-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/clock-in",
    request_body = ClockInRequest,
    responses(
        (status = 201, description = "Clocked in successfully", body = Object, example = json!({
            "message": "Clocked in successfully"
        })),
        (status = 400, description = "Already clocked in today", body = Object, example = json!({
            "message": "Already clocked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Concurrent clock-in lost the race"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn clock_in(
    auth: AuthStaff,
    svc: web::Data<SharedAttendanceService>,
    req: HttpRequest,
    body: Option<web::Json<ClockInRequest>>,
) -> actix_web::Result<impl Responder> {
    let body = body.map(|b| b.into_inner()).unwrap_or_default();
    let ctx = clock_context(&req, body.location);
    let record = svc.clock_in(auth.staff, body.shift, ctx).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Clocked in successfully",
        "attendance": record
    })))
}

/// Clock-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/clock-out",
    request_body = ClockOutRequest,
    responses(
        (status = 200, description = "Clocked out successfully", body = Object, example = json!({
            "message": "Clocked out successfully"
        })),
        (status = 404, description = "No active clock-in found for today", body = Object, example = json!({
            "message": "No active clock-in found for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn clock_out(
    auth: AuthStaff,
    svc: web::Data<SharedAttendanceService>,
    req: HttpRequest,
    body: Option<web::Json<ClockOutRequest>>,
) -> actix_web::Result<impl Responder> {
    let body = body.map(|b| b.into_inner()).unwrap_or_default();
    let ctx = clock_context(&req, body.location);
    let record = svc.clock_out(auth.staff, ctx).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Clocked out successfully",
        "attendance": record
    })))
}

/// Start a break
#[utoipa::path(
    post,
    path = "/api/attendance/break/start",
    request_body = BreakStartRequest,
    responses(
        (status = 200, description = "Break started", body = Object, example = json!({
            "message": "Break started"
        })),
        (status = 400, description = "A break is already in progress"),
        (status = 404, description = "No attendance record found for today"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn break_start(
    auth: AuthStaff,
    svc: web::Data<SharedAttendanceService>,
    body: Option<web::Json<BreakStartRequest>>,
) -> actix_web::Result<impl Responder> {
    let reason = body.and_then(|b| b.into_inner().reason);
    let record = svc.break_start(auth.staff, reason).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Break started",
        "attendance": record
    })))
}

/// End the open break
#[utoipa::path(
    post,
    path = "/api/attendance/break/end",
    responses(
        (status = 200, description = "Break ended", body = Object, example = json!({
            "message": "Break ended"
        })),
        (status = 400, description = "No active break found"),
        (status = 404, description = "No attendance record found for today"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn break_end(
    auth: AuthStaff,
    svc: web::Data<SharedAttendanceService>,
) -> actix_web::Result<impl Responder> {
    let record = svc.break_end(auth.staff).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Break ended",
        "attendance": record
    })))
}

/// Today's record for the calling staff member
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's attendance record, or null", body = AttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthStaff,
    svc: web::Data<SharedAttendanceService>,
) -> actix_web::Result<impl Responder> {
    let record = svc.get_today(auth.staff).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// List attendance records (admin)
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(
        ("page", Query, description = "Page number"),
        ("per_page", Query, description = "Items per page"),
        ("status", Query, description = "Filter by attendance status"),
        ("staff_category", Query, description = "Filter by staff category (with staff_id)"),
        ("staff_id", Query, description = "Filter by staff id (with staff_category)"),
        ("start_date", Query, description = "Range start (YYYY-MM-DD)"),
        ("end_date", Query, description = "Range end (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "Paginated attendance list", body = AttendanceListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list(
    auth: AuthStaff,
    svc: web::Data<SharedAttendanceService>,
    query: web::Query<AttendanceListQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);

    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<AttendanceStatus>()
                .map_err(|_| AttendanceError::Validation(format!("unknown status '{s}'")))
        })
        .transpose()?;

    let staff = match (query.staff_category, query.staff_id) {
        (Some(category), Some(id)) => Some(StaffRef::new(category, id)),
        (None, None) => None,
        _ => {
            return Err(AttendanceError::Validation(
                "staff_category and staff_id must be supplied together".into(),
            )
            .into());
        }
    };

    let range = match (query.start_date, query.end_date) {
        (None, None) => None,
        (start, end) => Some(range_from(start, end)),
    };

    let filter = AttendanceFilter {
        status,
        staff,
        range,
    };
    let (records, total) = svc.list(filter, page, per_page).await?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data: records,
        page,
        per_page,
        total,
    }))
}

/// Fetch a record by id
#[utoipa::path(
    get,
    path = "/api/attendance/{id}",
    params(
        ("id", Path, description = "Attendance record id")
    ),
    responses(
        (status = 200, description = "Attendance record", body = AttendanceRecord),
        (status = 404, description = "Attendance record not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn get_record(
    _auth: AuthStaff,
    svc: web::Data<SharedAttendanceService>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let record = svc.get(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Amend a record (admin)
#[utoipa::path(
    put,
    path = "/api/attendance/{id}",
    params(
        ("id", Path, description = "Attendance record id")
    ),
    request_body = AmendAttendance,
    responses(
        (status = 200, description = "Attendance updated successfully", body = Object, example = json!({
            "message": "Attendance updated successfully"
        })),
        (status = 404, description = "Attendance record not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn amend(
    auth: AuthStaff,
    svc: web::Data<SharedAttendanceService>,
    path: web::Path<String>,
    body: web::Json<AmendAttendance>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let record = svc
        .amend(&path.into_inner(), body.into_inner(), auth.staff.id)
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Attendance updated successfully",
        "attendance": record
    })))
}

/// Delete a record (admin)
#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(
        ("id", Path, description = "Attendance record id")
    ),
    responses(
        (status = 200, description = "Attendance record deleted successfully", body = Object, example = json!({
            "message": "Attendance record deleted successfully"
        })),
        (status = 404, description = "Attendance record not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn remove(
    auth: AuthStaff,
    svc: web::Data<SharedAttendanceService>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    svc.remove(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Attendance record deleted successfully"
    })))
}

/// Per-staff summary over a date range
#[utoipa::path(
    get,
    path = "/api/attendance/summary/{category}/{staff_id}",
    params(
        ("category", Path, description = "Staff category (Employee or Doctor)"),
        ("staff_id", Path, description = "Staff id"),
        ("start_date", Query, description = "Range start (YYYY-MM-DD), defaults to first of month"),
        ("end_date", Query, description = "Range end (YYYY-MM-DD), defaults to today")
    ),
    responses(
        (status = 200, description = "Attendance summary", body = AttendanceSummary),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn summary(
    auth: AuthStaff,
    svc: web::Data<SharedAttendanceService>,
    path: web::Path<(StaffCategory, u64)>,
    query: web::Query<RangeQuery>,
) -> actix_web::Result<impl Responder> {
    let (category, staff_id) = path.into_inner();
    let staff = StaffRef::new(category, staff_id);
    auth.require_self_or_admin(staff)?;

    let range = range_from(query.start_date, query.end_date);
    let summary = svc.summarize(staff, range).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Organization-wide statistics (admin)
#[utoipa::path(
    get,
    path = "/api/attendance/stats/overview",
    params(
        ("start_date", Query, description = "Range start (YYYY-MM-DD), defaults to first of month"),
        ("end_date", Query, description = "Range end (YYYY-MM-DD), defaults to today")
    ),
    responses(
        (status = 200, description = "Per-status counts and distinct staff", body = AttendanceOverview),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn stats_overview(
    auth: AuthStaff,
    svc: web::Data<SharedAttendanceService>,
    query: web::Query<RangeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let range = range_from(query.start_date, query.end_date);
    let stats = svc.overview(range).await?;
    Ok(HttpResponse::Ok().json(stats))
}
