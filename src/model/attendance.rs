use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::error::AttendanceError;
use crate::model::staff::StaffRef;

/// Day-level attendance outcome. Defaults to `Present`; only administrative
/// amendment changes it, it is never derived from the recorded times.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    #[serde(rename = "Half Day")]
    #[strum(serialize = "Half Day")]
    HalfDay,
    #[serde(rename = "On Leave")]
    #[strum(serialize = "On Leave")]
    OnLeave,
    Holiday,
}

impl Default for AttendanceStatus {
    fn default() -> Self {
        AttendanceStatus::Present
    }
}

/// Informational only; does not affect the hour arithmetic.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum Shift {
    Morning,
    Evening,
    Night,
    General,
}

impl Default for Shift {
    fn default() -> Self {
        Shift::General
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Timestamp plus capture metadata for a clock-in or clock-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClockEvent {
    pub time: DateTime<Utc>,
    pub location: Option<GeoPoint>,
    pub device: Option<String>,
    pub ip_address: Option<String>,
}

impl ClockEvent {
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            time,
            location: None,
            device: None,
            ip_address: None,
        }
    }
}

/// One interruption of the workday. `end` absent means the break is still
/// open; `duration_minutes` is recorded when the break ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BreakEntry {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub reason: Option<String>,
}

/// One staff member's attendance for one calendar day.
///
/// Invariants: `breaks` is non-decreasing in `start`, at most one break has
/// no `end`, and `total_hours` always reflects the duration arithmetic once
/// both clock times are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    #[schema(example = "ATT202601150001")]
    pub id: String,
    pub staff: StaffRef,
    pub date: DateTime<Utc>,
    pub clock_in: Option<ClockEvent>,
    pub clock_out: Option<ClockEvent>,
    pub breaks: Vec<BreakEntry>,
    #[schema(example = 7.5)]
    pub total_hours: f64,
    pub status: AttendanceStatus,
    pub shift: Shift,
    pub notes: Option<String>,
    pub approved_by: Option<u64>,
    pub is_approved: bool,
}

/// Builds the human-readable record id: `ATT` + `YYYYMMDD` + zero-padded
/// sequence. Uniqueness is ultimately the store's job; callers retry on a
/// primary-key conflict.
pub fn attendance_id(day: NaiveDate, sequence: u64) -> String {
    format!("ATT{}{:04}", day.format("%Y%m%d"), sequence)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl AttendanceRecord {
    pub fn new(id: String, staff: StaffRef, date: DateTime<Utc>) -> Self {
        Self {
            id,
            staff,
            date,
            clock_in: None,
            clock_out: None,
            breaks: Vec::new(),
            total_hours: 0.0,
            status: AttendanceStatus::default(),
            shift: Shift::default(),
            notes: None,
            approved_by: None,
            is_approved: true,
        }
    }

    /// The currently open break, if any. By invariant it can only be the
    /// most recently added entry.
    pub fn open_break(&self) -> Option<&BreakEntry> {
        self.breaks.last().filter(|b| b.end.is_none())
    }

    pub fn is_clocked_in(&self) -> bool {
        self.clock_in.is_some() && self.clock_out.is_none()
    }

    /// Appends a new open break. Fails when another break is still open.
    pub fn start_break(
        &mut self,
        now: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<(), AttendanceError> {
        if self.open_break().is_some() {
            return Err(AttendanceError::BreakAlreadyOpen);
        }
        self.breaks.push(BreakEntry {
            start: now,
            end: None,
            duration_minutes: None,
            reason,
        });
        Ok(())
    }

    /// Closes the open break and records its duration in whole minutes.
    pub fn end_break(&mut self, now: DateTime<Utc>) -> Result<(), AttendanceError> {
        let last = match self.breaks.last_mut() {
            Some(b) if b.end.is_none() => b,
            _ => return Err(AttendanceError::NoActiveBreak),
        };
        last.end = Some(now);
        last.duration_minutes = Some((now - last.start).num_minutes());
        Ok(())
    }

    /// Total minutes of recorded break time. Breaks without a recorded
    /// duration contribute zero.
    pub fn break_minutes(&self) -> i64 {
        self.breaks.iter().filter_map(|b| b.duration_minutes).sum()
    }

    /// Recomputes `total_hours` when both clock times are present:
    /// net minutes = floor(elapsed / 1 min) - recorded break minutes,
    /// expressed in hours to two decimals. A negative net (break time
    /// exceeding the shift) is stored as-is for audit.
    pub fn recalculate_total_hours(&mut self) {
        if let (Some(clock_in), Some(clock_out)) = (&self.clock_in, &self.clock_out) {
            let raw_minutes = (clock_out.time - clock_in.time).num_minutes();
            let net_minutes = raw_minutes - self.break_minutes();
            self.total_hours = round2(net_minutes as f64 / 60.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::staff::StaffCategory;

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2026, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
            .and_utc()
    }

    fn record() -> AttendanceRecord {
        AttendanceRecord::new(
            "ATT202601150001".into(),
            StaffRef::new(StaffCategory::Employee, 7),
            ts(8, 55),
        )
    }

    #[test]
    fn id_format_is_prefix_date_and_padded_sequence() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(attendance_id(day, 1), "ATT202601150001");
        assert_eq!(attendance_id(day, 42), "ATT202601150042");
        // Sequences beyond four digits widen rather than truncate.
        assert_eq!(attendance_id(day, 12345), "ATT2026011512345");
    }

    #[test]
    fn full_day_without_breaks_is_eight_hours() {
        let mut rec = record();
        rec.clock_in = Some(ClockEvent::at(ts(9, 0)));
        rec.clock_out = Some(ClockEvent::at(ts(17, 0)));
        rec.recalculate_total_hours();
        assert_eq!(rec.total_hours, 8.00);
    }

    #[test]
    fn half_hour_break_is_subtracted() {
        let mut rec = record();
        rec.clock_in = Some(ClockEvent::at(ts(9, 0)));
        rec.start_break(ts(12, 0), Some("lunch".into())).unwrap();
        rec.end_break(ts(12, 30)).unwrap();
        rec.clock_out = Some(ClockEvent::at(ts(17, 0)));
        rec.recalculate_total_hours();
        assert_eq!(rec.breaks[0].duration_minutes, Some(30));
        assert_eq!(rec.total_hours, 7.50);
    }

    #[test]
    fn sub_minute_remainder_is_floored_before_conversion() {
        let mut rec = record();
        rec.clock_in = Some(ClockEvent::at(ts(9, 0)));
        // 7h 0m 59s elapses; the stray seconds never count.
        rec.clock_out = Some(ClockEvent::at(ts(16, 0) + chrono::Duration::seconds(59)));
        rec.recalculate_total_hours();
        assert_eq!(rec.total_hours, 7.00);
    }

    #[test]
    fn hours_round_to_two_decimals() {
        let mut rec = record();
        rec.clock_in = Some(ClockEvent::at(ts(9, 0)));
        rec.clock_out = Some(ClockEvent::at(ts(16, 20)));
        rec.recalculate_total_hours();
        // 440 minutes = 7.3333... hours
        assert_eq!(rec.total_hours, 7.33);
    }

    #[test]
    fn overlong_break_leaves_negative_total_uncorrected() {
        // Misrecorded break time exceeding the shift is preserved for audit,
        // not clamped to zero.
        let mut rec = record();
        rec.clock_in = Some(ClockEvent::at(ts(9, 0)));
        rec.breaks.push(BreakEntry {
            start: ts(9, 10),
            end: Some(ts(10, 40)),
            duration_minutes: Some(90),
            reason: None,
        });
        rec.clock_out = Some(ClockEvent::at(ts(10, 0)));
        rec.recalculate_total_hours();
        assert_eq!(rec.total_hours, -0.50);
    }

    #[test]
    fn open_break_contributes_zero_minutes() {
        let mut rec = record();
        rec.clock_in = Some(ClockEvent::at(ts(9, 0)));
        rec.start_break(ts(12, 0), None).unwrap();
        rec.clock_out = Some(ClockEvent::at(ts(17, 0)));
        rec.recalculate_total_hours();
        assert_eq!(rec.total_hours, 8.00);
    }

    #[test]
    fn second_open_break_is_rejected() {
        let mut rec = record();
        rec.start_break(ts(10, 0), None).unwrap();
        let err = rec.start_break(ts(10, 5), None).unwrap_err();
        assert!(matches!(err, AttendanceError::BreakAlreadyOpen));
        assert_eq!(rec.breaks.len(), 1);
    }

    #[test]
    fn ending_without_open_break_is_rejected() {
        let mut rec = record();
        assert!(matches!(
            rec.end_break(ts(10, 0)),
            Err(AttendanceError::NoActiveBreak)
        ));

        rec.start_break(ts(10, 0), None).unwrap();
        rec.end_break(ts(10, 15)).unwrap();
        assert!(matches!(
            rec.end_break(ts(10, 20)),
            Err(AttendanceError::NoActiveBreak)
        ));
    }

    #[test]
    fn sequential_breaks_stay_ordered_with_one_open_at_most() {
        let mut rec = record();
        rec.start_break(ts(10, 0), None).unwrap();
        rec.end_break(ts(10, 10)).unwrap();
        rec.start_break(ts(12, 0), Some("lunch".into())).unwrap();
        rec.end_break(ts(12, 45)).unwrap();
        rec.start_break(ts(15, 0), None).unwrap();

        let starts: Vec<_> = rec.breaks.iter().map(|b| b.start).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
        assert_eq!(rec.breaks.iter().filter(|b| b.end.is_none()).count(), 1);
    }

    #[test]
    fn status_serde_matches_wire_labels() {
        let s: AttendanceStatus = serde_json::from_str("\"Half Day\"").unwrap();
        assert!(matches!(s, AttendanceStatus::HalfDay));
        assert_eq!(
            serde_json::to_value(AttendanceStatus::OnLeave).unwrap(),
            serde_json::json!("On Leave")
        );
        assert!(serde_json::from_str::<AttendanceStatus>("\"Presentish\"").is_err());
    }

    #[test]
    fn status_round_trips_through_display_and_parse() {
        for s in [
            AttendanceStatus::Present,
            AttendanceStatus::Absent,
            AttendanceStatus::Late,
            AttendanceStatus::HalfDay,
            AttendanceStatus::OnLeave,
            AttendanceStatus::Holiday,
        ] {
            assert_eq!(s.to_string().parse::<AttendanceStatus>().unwrap(), s);
        }
    }
}
