use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::attendance::{AttendanceRecord, AttendanceStatus};

/// Per-staff reduction of a date range of attendance records.
#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceSummary {
    pub total_days: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub half_day: usize,
    pub on_leave: usize,
    pub total_hours: f64,
    /// `total_hours / present`, two decimals; zero when nothing is `Present`.
    pub average_hours: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusBucket {
    pub status: AttendanceStatus,
    pub count: usize,
    pub total_hours: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DateRangeOut {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Organization-wide grouping of records by status over a date range.
#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceOverview {
    pub stats: Vec<StatusBucket>,
    pub total_staff: usize,
    pub date_range: DateRangeOut,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Reduces one staff member's records to day counts, per-status counts and
/// the present-day hour average.
pub fn summarize(records: &[AttendanceRecord]) -> AttendanceSummary {
    let count = |s: AttendanceStatus| records.iter().filter(|r| r.status == s).count();

    let present = count(AttendanceStatus::Present);
    let total_hours: f64 = records.iter().map(|r| r.total_hours).sum();
    let average_hours = if present > 0 {
        round2(total_hours / present as f64)
    } else {
        0.0
    };

    AttendanceSummary {
        total_days: records.len(),
        present,
        absent: count(AttendanceStatus::Absent),
        late: count(AttendanceStatus::Late),
        half_day: count(AttendanceStatus::HalfDay),
        on_leave: count(AttendanceStatus::OnLeave),
        total_hours,
        average_hours,
    }
}

/// Groups records by status and counts distinct staff across the whole
/// population. Read-only; the caller supplies the already-loaded range.
pub fn overview(
    records: &[AttendanceRecord],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> AttendanceOverview {
    let mut buckets: BTreeMap<String, StatusBucket> = BTreeMap::new();
    let mut staff = HashSet::new();

    for rec in records {
        staff.insert(rec.staff);
        let bucket = buckets
            .entry(rec.status.to_string())
            .or_insert_with(|| StatusBucket {
                status: rec.status,
                count: 0,
                total_hours: 0.0,
            });
        bucket.count += 1;
        bucket.total_hours += rec.total_hours;
    }

    AttendanceOverview {
        stats: buckets.into_values().collect(),
        total_staff: staff.len(),
        date_range: DateRangeOut { start, end },
    }
}
