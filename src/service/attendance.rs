use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::clock::{Clock, day_start};
use crate::error::AttendanceError;
use crate::model::attendance::{
    AttendanceRecord, AttendanceStatus, ClockEvent, GeoPoint, Shift, attendance_id,
};
use crate::model::report::{self, AttendanceOverview, AttendanceSummary};
use crate::model::staff::StaffRef;
use crate::store::{AttendanceFilter, AttendanceStore, DateRange, StoreError};

/// How often a fresh id is retried when it collides with one allocated by a
/// concurrent clock-in before giving up.
const MAX_ID_ATTEMPTS: u64 = 5;

/// Capture metadata accompanying a clock-in or clock-out.
#[derive(Debug, Default, Clone)]
pub struct ClockContext {
    pub location: Option<GeoPoint>,
    pub device: Option<String>,
    pub ip_address: Option<String>,
}

/// Administrative amendment: field-level overwrite that bypasses the state
/// machine. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AmendAttendance {
    pub status: Option<AttendanceStatus>,
    pub shift: Option<Shift>,
    pub notes: Option<String>,
    pub clock_in_time: Option<DateTime<Utc>>,
    pub clock_out_time: Option<DateTime<Utc>>,
    pub is_approved: Option<bool>,
}

/// Attendance lifecycle engine. Every mutation is a read-modify-write of the
/// single record keyed by `(staff, day)`; the store's uniqueness constraints
/// arbitrate races.
pub struct AttendanceService<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: AttendanceStore> AttendanceService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn event(&self, time: DateTime<Utc>, ctx: ClockContext) -> ClockEvent {
        ClockEvent {
            time,
            location: ctx.location,
            device: ctx.device,
            ip_address: ctx.ip_address,
        }
    }

    /// Starts the day. Reuses a pre-created record without a clock-in time;
    /// otherwise allocates a fresh per-day id, retrying on an id lost to a
    /// concurrent creation. Whoever loses the same-staff race gets
    /// `DuplicateAttendance`.
    pub async fn clock_in(
        &self,
        staff: StaffRef,
        shift: Option<Shift>,
        ctx: ClockContext,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let now = self.clock.now();
        let today = day_start(now);

        if let Some(mut record) = self.store.find_for_day(&staff, today).await? {
            if record.clock_in.is_some() {
                return Err(AttendanceError::AlreadyClockedIn);
            }
            // Amended-in shell for today: take it over instead of creating.
            record.clock_in = Some(self.event(now, ctx));
            if let Some(shift) = shift {
                record.shift = shift;
            }
            self.store.update(&record).await?;
            return Ok(record);
        }

        let sequence = self.store.count_for_day(today).await? + 1;
        for attempt in 0..MAX_ID_ATTEMPTS {
            let mut record = AttendanceRecord::new(
                attendance_id(now.date_naive(), sequence + attempt),
                staff,
                now,
            );
            record.clock_in = Some(self.event(now, ctx.clone()));
            record.shift = shift.unwrap_or_default();

            match self.store.insert(&record).await {
                Ok(()) => {
                    info!(id = %record.id, staff_id = staff.id, "Clocked in");
                    return Ok(record);
                }
                Err(StoreError::DuplicateId) => {
                    debug!(id = %record.id, "Attendance id taken, retrying");
                    continue;
                }
                Err(StoreError::DuplicateDay) => return Err(AttendanceError::DuplicateAttendance),
                Err(e) => return Err(e.into()),
            }
        }
        Err(AttendanceError::Store(anyhow::anyhow!(
            "attendance id allocation exhausted after {MAX_ID_ATTEMPTS} attempts"
        )))
    }

    /// Ends the day and recomputes the worked-hours total.
    pub async fn clock_out(
        &self,
        staff: StaffRef,
        ctx: ClockContext,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let now = self.clock.now();
        let mut record = match self.store.find_for_day(&staff, day_start(now)).await? {
            Some(r) if r.is_clocked_in() => r,
            // Missing, never started, or already completed: from the
            // caller's view there is simply no active clock-in.
            _ => return Err(AttendanceError::NoActiveClockIn),
        };

        record.clock_out = Some(self.event(now, ctx));
        record.recalculate_total_hours();
        self.store.update(&record).await?;
        info!(id = %record.id, staff_id = staff.id, total_hours = record.total_hours, "Clocked out");
        Ok(record)
    }

    pub async fn break_start(
        &self,
        staff: StaffRef,
        reason: Option<String>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let now = self.clock.now();
        let mut record = match self.store.find_for_day(&staff, day_start(now)).await? {
            Some(r) if r.clock_in.is_some() => r,
            _ => return Err(AttendanceError::NoActiveAttendance),
        };
        record.start_break(now, reason)?;
        self.store.update(&record).await?;
        Ok(record)
    }

    pub async fn break_end(&self, staff: StaffRef) -> Result<AttendanceRecord, AttendanceError> {
        let now = self.clock.now();
        let mut record = self
            .store
            .find_for_day(&staff, day_start(now))
            .await?
            .ok_or(AttendanceError::NoActiveAttendance)?;
        record.end_break(now)?;
        self.store.update(&record).await?;
        Ok(record)
    }

    pub async fn get_today(
        &self,
        staff: StaffRef,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        let today = day_start(self.clock.now());
        Ok(self.store.find_for_day(&staff, today).await?)
    }

    pub async fn get(&self, id: &str) -> Result<AttendanceRecord, AttendanceError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AttendanceError::NotFound)
    }

    pub async fn list(
        &self,
        filter: AttendanceFilter,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<AttendanceRecord>, i64), AttendanceError> {
        Ok(self.store.list(&filter, page, per_page).await?)
    }

    /// Field-level correction by an authorized actor; re-runs the duration
    /// arithmetic whenever both clock times are present afterwards.
    pub async fn amend(
        &self,
        id: &str,
        patch: AmendAttendance,
        approver_id: u64,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let mut record = self.get(id).await?;

        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(shift) = patch.shift {
            record.shift = shift;
        }
        if let Some(notes) = patch.notes {
            record.notes = Some(notes);
        }
        if let Some(time) = patch.clock_in_time {
            match record.clock_in.as_mut() {
                Some(event) => event.time = time,
                None => record.clock_in = Some(ClockEvent::at(time)),
            }
        }
        if let Some(time) = patch.clock_out_time {
            match record.clock_out.as_mut() {
                Some(event) => event.time = time,
                None => record.clock_out = Some(ClockEvent::at(time)),
            }
        }
        if let Some(approved) = patch.is_approved {
            record.is_approved = approved;
        }
        record.approved_by = Some(approver_id);
        record.recalculate_total_hours();

        self.store.update(&record).await?;
        info!(id = %record.id, approver_id, "Attendance amended");
        Ok(record)
    }

    /// Unconditional, irreversible removal.
    pub async fn remove(&self, id: &str) -> Result<(), AttendanceError> {
        self.store.delete(id).await?;
        info!(id, "Attendance record deleted");
        Ok(())
    }

    pub async fn summarize(
        &self,
        staff: StaffRef,
        range: DateRange,
    ) -> Result<AttendanceSummary, AttendanceError> {
        let records = self.store.list_for_staff(&staff, &range).await?;
        Ok(report::summarize(&records))
    }

    pub async fn overview(&self, range: DateRange) -> Result<AttendanceOverview, AttendanceError> {
        let records = self.store.list_in_range(&range).await?;
        Ok(report::overview(&records, range.start, range.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::staff::StaffCategory;
    use crate::store::MemoryAttendanceStore;
    use chrono::{Duration, NaiveDate};
    use std::sync::Mutex;

    /// Deterministic clock the tests wind forward by hand.
    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn starting_at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(now),
            })
        }

        fn set(&self, h: u32, m: u32) {
            let mut now = self.now.lock().unwrap();
            *now = now
                .date_naive()
                .and_hms_opt(h, m, 0)
                .unwrap()
                .and_utc();
        }

        fn advance_days(&self, days: i64) {
            let mut now = self.now.lock().unwrap();
            *now += Duration::days(days);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn morning() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            .and_utc()
    }

    fn service() -> (
        AttendanceService<MemoryAttendanceStore>,
        Arc<ManualClock>,
    ) {
        let clock = ManualClock::starting_at(morning());
        let svc = AttendanceService::new(MemoryAttendanceStore::new(), clock.clone());
        (svc, clock)
    }

    fn employee(id: u64) -> StaffRef {
        StaffRef::new(StaffCategory::Employee, id)
    }

    #[tokio::test]
    async fn clock_in_creates_todays_record() {
        let (svc, _clock) = service();
        let rec = svc
            .clock_in(employee(1), Some(Shift::Morning), ClockContext::default())
            .await
            .unwrap();

        assert_eq!(rec.id, "ATT202603020001");
        assert_eq!(rec.shift, Shift::Morning);
        assert_eq!(rec.status, AttendanceStatus::Present);
        assert!(rec.is_approved);
        assert_eq!(rec.clock_in.as_ref().unwrap().time, morning());
        assert!(rec.clock_out.is_none());
    }

    #[tokio::test]
    async fn sequence_increments_across_staff_on_the_same_day() {
        let (svc, _clock) = service();
        svc.clock_in(employee(1), None, ClockContext::default())
            .await
            .unwrap();
        let second = svc
            .clock_in(
                StaffRef::new(StaffCategory::Doctor, 9),
                None,
                ClockContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(second.id, "ATT202603020002");
    }

    #[tokio::test]
    async fn second_clock_in_same_day_is_rejected() {
        let (svc, _clock) = service();
        svc.clock_in(employee(1), None, ClockContext::default())
            .await
            .unwrap();
        let err = svc
            .clock_in(employee(1), None, ClockContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::AlreadyClockedIn));
    }

    #[tokio::test]
    async fn clock_in_after_clock_out_is_still_rejected() {
        // One record per staff per day; a finished day cannot be restarted.
        let (svc, clock) = service();
        svc.clock_in(employee(1), None, ClockContext::default())
            .await
            .unwrap();
        clock.set(17, 0);
        svc.clock_out(employee(1), ClockContext::default())
            .await
            .unwrap();
        let err = svc
            .clock_in(employee(1), None, ClockContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::AlreadyClockedIn));
    }

    #[tokio::test]
    async fn next_day_gets_a_fresh_record() {
        let (svc, clock) = service();
        svc.clock_in(employee(1), None, ClockContext::default())
            .await
            .unwrap();
        clock.advance_days(1);
        let rec = svc
            .clock_in(employee(1), None, ClockContext::default())
            .await
            .unwrap();
        assert_eq!(rec.id, "ATT202603030001");
    }

    #[tokio::test]
    async fn full_day_with_lunch_break_totals_seven_and_a_half_hours() {
        let (svc, clock) = service();
        let staff = employee(1);

        svc.clock_in(staff, None, ClockContext::default())
            .await
            .unwrap();
        clock.set(12, 0);
        svc.break_start(staff, Some("lunch".into())).await.unwrap();
        clock.set(12, 30);
        let rec = svc.break_end(staff).await.unwrap();
        assert_eq!(rec.breaks[0].duration_minutes, Some(30));

        clock.set(17, 0);
        let rec = svc.clock_out(staff, ClockContext::default()).await.unwrap();
        assert_eq!(rec.total_hours, 7.50);
    }

    #[tokio::test]
    async fn full_day_without_breaks_totals_eight_hours() {
        let (svc, clock) = service();
        let staff = employee(1);
        svc.clock_in(staff, None, ClockContext::default())
            .await
            .unwrap();
        clock.set(17, 0);
        let rec = svc.clock_out(staff, ClockContext::default()).await.unwrap();
        assert_eq!(rec.total_hours, 8.00);
    }

    #[tokio::test]
    async fn clock_out_without_clock_in_is_rejected() {
        let (svc, _clock) = service();
        let err = svc
            .clock_out(employee(1), ClockContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::NoActiveClockIn));
    }

    #[tokio::test]
    async fn double_clock_out_is_rejected() {
        let (svc, clock) = service();
        let staff = employee(1);
        svc.clock_in(staff, None, ClockContext::default())
            .await
            .unwrap();
        clock.set(17, 0);
        svc.clock_out(staff, ClockContext::default()).await.unwrap();
        let err = svc
            .clock_out(staff, ClockContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::NoActiveClockIn));
    }

    #[tokio::test]
    async fn break_guards_fire_in_order() {
        let (svc, clock) = service();
        let staff = employee(1);

        assert!(matches!(
            svc.break_start(staff, None).await.unwrap_err(),
            AttendanceError::NoActiveAttendance
        ));
        assert!(matches!(
            svc.break_end(staff).await.unwrap_err(),
            AttendanceError::NoActiveAttendance
        ));

        svc.clock_in(staff, None, ClockContext::default())
            .await
            .unwrap();
        assert!(matches!(
            svc.break_end(staff).await.unwrap_err(),
            AttendanceError::NoActiveBreak
        ));

        clock.set(10, 0);
        svc.break_start(staff, None).await.unwrap();
        assert!(matches!(
            svc.break_start(staff, None).await.unwrap_err(),
            AttendanceError::BreakAlreadyOpen
        ));
    }

    #[tokio::test]
    async fn get_today_is_idempotent_and_scoped_to_staff() {
        let (svc, _clock) = service();
        let staff = employee(1);
        assert!(svc.get_today(staff).await.unwrap().is_none());

        svc.clock_in(staff, None, ClockContext::default())
            .await
            .unwrap();
        let first = svc.get_today(staff).await.unwrap().unwrap();
        let second = svc.get_today(staff).await.unwrap().unwrap();
        assert_eq!(first, second);

        // Same numeric id under the other category is someone else.
        let doctor = StaffRef::new(StaffCategory::Doctor, 1);
        assert!(svc.get_today(doctor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_clock_ins_admit_exactly_one() {
        let (svc, _clock) = service();
        let staff = employee(1);

        let (a, b) = tokio::join!(
            svc.clock_in(staff, None, ClockContext::default()),
            svc.clock_in(staff, None, ClockContext::default()),
        );

        let oks = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(oks, 1);
        let err = if a.is_err() {
            a.unwrap_err()
        } else {
            b.unwrap_err()
        };
        assert!(matches!(
            err,
            AttendanceError::AlreadyClockedIn | AttendanceError::DuplicateAttendance
        ));
    }

    #[tokio::test]
    async fn amend_overwrites_fields_and_recomputes_hours() {
        let (svc, clock) = service();
        let staff = employee(1);
        let rec = svc
            .clock_in(staff, None, ClockContext::default())
            .await
            .unwrap();
        clock.set(17, 0);
        svc.clock_out(staff, ClockContext::default()).await.unwrap();

        // Correct the clock-out to 18:00 and mark the day late.
        let patch = AmendAttendance {
            status: Some(AttendanceStatus::Late),
            clock_out_time: Some(morning() + Duration::hours(9)),
            notes: Some("forgot to clock out".into()),
            ..Default::default()
        };
        let amended = svc.amend(&rec.id, patch, 77).await.unwrap();

        assert_eq!(amended.status, AttendanceStatus::Late);
        assert_eq!(amended.approved_by, Some(77));
        assert_eq!(amended.total_hours, 9.00);
        assert_eq!(amended.notes.as_deref(), Some("forgot to clock out"));
        // The id never changes.
        assert_eq!(amended.id, rec.id);
    }

    #[tokio::test]
    async fn amend_missing_record_is_not_found() {
        let (svc, _clock) = service();
        let err = svc.amend("ATT202603020042", AmendAttendance::default(), 1).await;
        assert!(matches!(err.unwrap_err(), AttendanceError::NotFound));
    }

    #[tokio::test]
    async fn remove_is_unconditional_and_reports_missing() {
        let (svc, _clock) = service();
        let rec = svc
            .clock_in(employee(1), None, ClockContext::default())
            .await
            .unwrap();
        svc.remove(&rec.id).await.unwrap();
        assert!(matches!(
            svc.remove(&rec.id).await.unwrap_err(),
            AttendanceError::NotFound
        ));
        assert!(matches!(
            svc.get(&rec.id).await.unwrap_err(),
            AttendanceError::NotFound
        ));
    }

    #[tokio::test]
    async fn summary_over_a_week_averages_present_days() {
        let (svc, clock) = service();
        let staff = employee(1);

        for _ in 0..3 {
            svc.clock_in(staff, None, ClockContext::default())
                .await
                .unwrap();
            clock.set(17, 0);
            svc.clock_out(staff, ClockContext::default()).await.unwrap();
            clock.set(9, 0);
            clock.advance_days(1);
        }
        // Mark the middle day as on leave after the fact.
        let middle = svc.get("ATT202603030001").await.unwrap();
        svc.amend(
            &middle.id,
            AmendAttendance {
                status: Some(AttendanceStatus::OnLeave),
                ..Default::default()
            },
            5,
        )
        .await
        .unwrap();

        let range = DateRange {
            start: morning() - Duration::days(1),
            end: morning() + Duration::days(7),
        };
        let summary = svc.summarize(staff, range).await.unwrap();
        assert_eq!(summary.total_days, 3);
        assert_eq!(summary.present, 2);
        assert_eq!(summary.on_leave, 1);
        assert_eq!(summary.total_hours, 24.0);
        // All hours in range divided by present days only.
        assert_eq!(summary.average_hours, 12.0);
    }

    #[tokio::test]
    async fn overview_spans_both_staff_categories() {
        let (svc, clock) = service();
        let nurse = employee(1);
        let doctor = StaffRef::new(StaffCategory::Doctor, 2);

        svc.clock_in(nurse, None, ClockContext::default())
            .await
            .unwrap();
        svc.clock_in(doctor, None, ClockContext::default())
            .await
            .unwrap();
        clock.set(17, 0);
        svc.clock_out(nurse, ClockContext::default()).await.unwrap();
        svc.clock_out(doctor, ClockContext::default()).await.unwrap();

        let range = DateRange {
            start: morning() - Duration::days(1),
            end: morning() + Duration::days(1),
        };
        let out = svc.overview(range).await.unwrap();
        assert_eq!(out.total_staff, 2);
        assert_eq!(out.stats.len(), 1);
        assert_eq!(out.stats[0].count, 2);
        assert_eq!(out.stats[0].total_hours, 16.0);
    }
}
