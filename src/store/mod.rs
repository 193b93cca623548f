pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::staff::StaffRef;

pub use memory::MemoryAttendanceStore;
pub use mysql::MySqlAttendanceStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate attendance id")]
    DuplicateId,
    #[error("attendance already recorded for this staff member and day")]
    DuplicateDay,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Half-open time window: `start <= t < end`.
#[derive(Debug, Copy, Clone)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

#[derive(Debug, Default, Clone)]
pub struct AttendanceFilter {
    pub status: Option<AttendanceStatus>,
    pub staff: Option<StaffRef>,
    pub range: Option<DateRange>,
}

/// Persistence boundary for attendance records.
///
/// Implementations must reject an insert that reuses an `id`
/// (`DuplicateId`) or that lands a second record on the same staff member
/// and calendar day (`DuplicateDay`); the clock-in race of two concurrent
/// requests is resolved here, not in the lifecycle.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn insert(&self, record: &AttendanceRecord) -> Result<(), StoreError>;

    /// Replaces the stored record with the same `id`.
    async fn update(&self, record: &AttendanceRecord) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<AttendanceRecord>, StoreError>;

    /// The staff member's record whose `date` falls on or after `day_start`.
    /// A range query rather than an exact match, to tolerate sub-day `date`
    /// values; the earliest match wins.
    async fn find_for_day(
        &self,
        staff: &StaffRef,
        day_start: DateTime<Utc>,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    /// Filtered page of records, newest date first, plus the unpaginated
    /// match count.
    async fn list(
        &self,
        filter: &AttendanceFilter,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<AttendanceRecord>, i64), StoreError>;

    async fn list_for_staff(
        &self,
        staff: &StaffRef,
        range: &DateRange,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;

    async fn list_in_range(&self, range: &DateRange) -> Result<Vec<AttendanceRecord>, StoreError>;

    /// Number of records dated within the calendar day beginning at
    /// `day_start`; seeds the id sequence.
    async fn count_for_day(&self, day_start: DateTime<Utc>) -> Result<u64, StoreError>;
}
