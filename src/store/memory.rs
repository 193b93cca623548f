use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::clock::day_start;
use crate::model::attendance::AttendanceRecord;
use crate::model::staff::StaffRef;
use crate::store::{AttendanceFilter, AttendanceStore, DateRange, StoreError};

/// In-memory store with the same uniqueness guarantees as the MySQL backend.
/// Backs the test suite; useful anywhere a database is overkill.
#[derive(Default)]
pub struct MemoryAttendanceStore {
    records: RwLock<Vec<AttendanceRecord>>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn same_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

fn matches(filter: &AttendanceFilter, rec: &AttendanceRecord) -> bool {
    if let Some(status) = filter.status {
        if rec.status != status {
            return false;
        }
    }
    if let Some(staff) = filter.staff {
        if rec.staff != staff {
            return false;
        }
    }
    if let Some(range) = filter.range {
        if !range.contains(rec.date) {
            return false;
        }
    }
    true
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn insert(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap();
        // Day uniqueness first: a same-staff conflict is a lost clock-in
        // race, not an id allocation problem.
        if records
            .iter()
            .any(|r| r.staff == record.staff && same_day(r.date, record.date))
        {
            return Err(StoreError::DuplicateDay);
        }
        if records.iter().any(|r| r.id == record.id) {
            return Err(StoreError::DuplicateId);
        }
        records.push(record.clone());
        Ok(())
    }

    async fn update(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<AttendanceRecord>, StoreError> {
        let records = self.records.read().unwrap();
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn find_for_day(
        &self,
        staff: &StaffRef,
        day_start: DateTime<Utc>,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let records = self.records.read().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.staff == *staff && r.date >= day_start)
            .min_by_key(|r| r.date)
            .cloned())
    }

    async fn list(
        &self,
        filter: &AttendanceFilter,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<AttendanceRecord>, i64), StoreError> {
        let records = self.records.read().unwrap();
        let mut hits: Vec<AttendanceRecord> = records
            .iter()
            .filter(|r| matches(filter, r))
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            b.date.cmp(&a.date).then(
                b.clock_in
                    .as_ref()
                    .map(|c| c.time)
                    .cmp(&a.clock_in.as_ref().map(|c| c.time)),
            )
        });

        let total = hits.len() as i64;
        // Widen before multiplying; page is caller-controlled and u32 math
        // would overflow on large page numbers.
        let offset = (page.max(1) as usize - 1) * per_page as usize;
        let page_hits = hits
            .into_iter()
            .skip(offset)
            .take(per_page as usize)
            .collect();
        Ok((page_hits, total))
    }

    async fn list_for_staff(
        &self,
        staff: &StaffRef,
        range: &DateRange,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let records = self.records.read().unwrap();
        let mut hits: Vec<AttendanceRecord> = records
            .iter()
            .filter(|r| r.staff == *staff && range.contains(r.date))
            .cloned()
            .collect();
        hits.sort_by_key(|r| r.date);
        Ok(hits)
    }

    async fn list_in_range(&self, range: &DateRange) -> Result<Vec<AttendanceRecord>, StoreError> {
        let records = self.records.read().unwrap();
        let mut hits: Vec<AttendanceRecord> = records
            .iter()
            .filter(|r| range.contains(r.date))
            .cloned()
            .collect();
        hits.sort_by_key(|r| r.date);
        Ok(hits)
    }

    async fn count_for_day(&self, day: DateTime<Utc>) -> Result<u64, StoreError> {
        let start = day_start(day);
        let end = start + Duration::days(1);
        let records = self.records.read().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.date >= start && r.date < end)
            .count() as u64)
    }
}
