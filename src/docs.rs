use crate::api::attendance::{
    AttendanceListQuery, AttendanceListResponse, BreakStartRequest, ClockInRequest,
    ClockOutRequest, RangeQuery,
};
use crate::model::attendance::{
    AttendanceRecord, AttendanceStatus, BreakEntry, ClockEvent, GeoPoint, Shift,
};
use crate::model::report::{
    AttendanceOverview, AttendanceSummary, DateRangeOut, StatusBucket,
};
use crate::model::staff::{StaffCategory, StaffRef};
use crate::service::attendance::AmendAttendance;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Staff Attendance API",
        version = "1.0.0",
        description = r#"
## Hospital Staff Time & Attendance

Tracks the working day of hospital staff (employees and doctors): clock-in,
breaks, clock-out, derived worked hours, and attendance status per day.

### Key Features
- **Attendance lifecycle**
  - Clock in/out with optional geolocation and device capture
  - Break start/end with per-break durations
- **Reporting**
  - Per-staff summaries over a date range
  - Organization-wide per-status statistics

### Security
All endpoints require **JWT Bearer authentication** issued by the hospital
application; listing, amendment, deletion and statistics are admin-only.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::break_start,
        crate::api::attendance::break_end,
        crate::api::attendance::today,
        crate::api::attendance::list,
        crate::api::attendance::get_record,
        crate::api::attendance::amend,
        crate::api::attendance::remove,
        crate::api::attendance::summary,
        crate::api::attendance::stats_overview
    ),
    components(
        schemas(
            AttendanceRecord,
            AttendanceStatus,
            BreakEntry,
            ClockEvent,
            GeoPoint,
            Shift,
            StaffCategory,
            StaffRef,
            ClockInRequest,
            ClockOutRequest,
            BreakStartRequest,
            AmendAttendance,
            AttendanceListQuery,
            AttendanceListResponse,
            RangeQuery,
            AttendanceSummary,
            AttendanceOverview,
            StatusBucket,
            DateRangeOut
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Attendance lifecycle and reporting APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
