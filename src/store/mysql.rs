use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

use crate::model::attendance::{
    AttendanceRecord, AttendanceStatus, BreakEntry, ClockEvent, Shift,
};
use crate::model::staff::{StaffCategory, StaffRef};
use crate::store::{AttendanceFilter, AttendanceStore, DateRange, StoreError};

/// MySQL-backed store. The table carries a primary key on `id` and a unique
/// key on `(staff_category, staff_id, work_day)` (see `schema.sql`), so both
/// id reuse and the concurrent clock-in race surface as SQLSTATE 23000 here
/// instead of silently overwriting.
pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str = "id, staff_category, staff_id, date, work_day, clock_in, clock_out, \
                       breaks, total_hours, status, shift, notes, approved_by, is_approved";

/// Bindable value for dynamically assembled queries.
enum SqlValue {
    String(String),
    U64(u64),
    DateTime(NaiveDateTime),
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>,
    values: &'q [SqlValue],
) -> sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments> {
    for value in values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
        };
    }
    query
}

fn backend(e: impl Into<anyhow::Error>) -> StoreError {
    StoreError::Backend(e.into())
}

fn map_write_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23000") {
            return if db.message().contains("PRIMARY") {
                StoreError::DuplicateId
            } else {
                StoreError::DuplicateDay
            };
        }
    }
    backend(e)
}

fn event_json(event: &Option<ClockEvent>) -> Result<Option<String>, StoreError> {
    event
        .as_ref()
        .map(|e| serde_json::to_string(e).map_err(backend))
        .transpose()
}

fn row_to_record(row: &MySqlRow) -> Result<AttendanceRecord, StoreError> {
    let category: String = row.try_get("staff_category").map_err(backend)?;
    let category = category
        .parse::<StaffCategory>()
        .map_err(|_| backend(anyhow!("unknown staff category in row")))?;
    let status: String = row.try_get("status").map_err(backend)?;
    let shift: String = row.try_get("shift").map_err(backend)?;

    let clock_in: Option<String> = row.try_get("clock_in").map_err(backend)?;
    let clock_out: Option<String> = row.try_get("clock_out").map_err(backend)?;
    let breaks: String = row.try_get("breaks").map_err(backend)?;
    let date: NaiveDateTime = row.try_get("date").map_err(backend)?;

    Ok(AttendanceRecord {
        id: row.try_get("id").map_err(backend)?,
        staff: StaffRef::new(category, row.try_get("staff_id").map_err(backend)?),
        date: date.and_utc(),
        clock_in: clock_in
            .map(|s| serde_json::from_str::<ClockEvent>(&s).map_err(backend))
            .transpose()?,
        clock_out: clock_out
            .map(|s| serde_json::from_str::<ClockEvent>(&s).map_err(backend))
            .transpose()?,
        breaks: serde_json::from_str::<Vec<BreakEntry>>(&breaks).map_err(backend)?,
        total_hours: row.try_get("total_hours").map_err(backend)?,
        status: status
            .parse::<AttendanceStatus>()
            .map_err(|_| backend(anyhow!("unknown attendance status in row")))?,
        shift: shift
            .parse::<Shift>()
            .map_err(|_| backend(anyhow!("unknown shift in row")))?,
        notes: row.try_get("notes").map_err(backend)?,
        approved_by: row.try_get("approved_by").map_err(backend)?,
        is_approved: row.try_get("is_approved").map_err(backend)?,
    })
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn insert(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO attendance ({COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        sqlx::query(&sql)
            .bind(&record.id)
            .bind(record.staff.category.to_string())
            .bind(record.staff.id)
            .bind(record.date.naive_utc())
            .bind(record.date.date_naive())
            .bind(event_json(&record.clock_in)?)
            .bind(event_json(&record.clock_out)?)
            .bind(serde_json::to_string(&record.breaks).map_err(backend)?)
            .bind(record.total_hours)
            .bind(record.status.to_string())
            .bind(record.shift.to_string())
            .bind(&record.notes)
            .bind(record.approved_by)
            .bind(record.is_approved)
            .execute(&self.pool)
            .await
            .map_err(map_write_err)?;
        Ok(())
    }

    async fn update(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE attendance SET clock_in = ?, clock_out = ?, breaks = ?, total_hours = ?, \
             status = ?, shift = ?, notes = ?, approved_by = ?, is_approved = ? WHERE id = ?",
        )
        .bind(event_json(&record.clock_in)?)
        .bind(event_json(&record.clock_out)?)
        .bind(serde_json::to_string(&record.breaks).map_err(backend)?)
        .bind(record.total_hours)
        .bind(record.status.to_string())
        .bind(record.shift.to_string())
        .bind(&record.notes)
        .bind(record.approved_by)
        .bind(record.is_approved)
        .bind(&record.id)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM attendance WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<AttendanceRecord>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM attendance WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn find_for_day(
        &self,
        staff: &StaffRef,
        day_start: DateTime<Utc>,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM attendance \
             WHERE staff_category = ? AND staff_id = ? AND date >= ? \
             ORDER BY date ASC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(staff.category.to_string())
            .bind(staff.id)
            .bind(day_start.naive_utc())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn list(
        &self,
        filter: &AttendanceFilter,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<AttendanceRecord>, i64), StoreError> {
        // Dynamic WHERE assembly; every fragment binds through SqlValue.
        let mut conditions: Vec<&str> = Vec::new();
        let mut bindings: Vec<SqlValue> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            bindings.push(SqlValue::String(status.to_string()));
        }
        if let Some(staff) = filter.staff {
            conditions.push("staff_category = ? AND staff_id = ?");
            bindings.push(SqlValue::String(staff.category.to_string()));
            bindings.push(SqlValue::U64(staff.id));
        }
        if let Some(range) = filter.range {
            conditions.push("date >= ? AND date < ?");
            bindings.push(SqlValue::DateTime(range.start.naive_utc()));
            bindings.push(SqlValue::DateTime(range.end.naive_utc()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM attendance {where_clause}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for value in &bindings {
            count_query = match value {
                SqlValue::String(v) => count_query.bind(v),
                SqlValue::U64(v) => count_query.bind(v),
                SqlValue::DateTime(v) => count_query.bind(v),
            };
        }
        let total = count_query.fetch_one(&self.pool).await.map_err(backend)?;

        let offset = (page.max(1) - 1) as i64 * per_page as i64;
        let data_sql = format!(
            "SELECT {COLUMNS} FROM attendance {where_clause} \
             ORDER BY date DESC, id DESC LIMIT ? OFFSET ?"
        );
        let data_query = bind_all(sqlx::query(&data_sql), &bindings)
            .bind(per_page as i64)
            .bind(offset);
        let rows = data_query.fetch_all(&self.pool).await.map_err(backend)?;

        let records = rows
            .iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((records, total))
    }

    async fn list_for_staff(
        &self,
        staff: &StaffRef,
        range: &DateRange,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM attendance \
             WHERE staff_category = ? AND staff_id = ? AND date >= ? AND date < ? \
             ORDER BY date ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(staff.category.to_string())
            .bind(staff.id)
            .bind(range.start.naive_utc())
            .bind(range.end.naive_utc())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter().map(row_to_record).collect()
    }

    async fn list_in_range(&self, range: &DateRange) -> Result<Vec<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM attendance WHERE date >= ? AND date < ? ORDER BY date ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(range.start.naive_utc())
            .bind(range.end.naive_utc())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter().map(row_to_record).collect()
    }

    async fn count_for_day(&self, day_start: DateTime<Utc>) -> Result<u64, StoreError> {
        let day: NaiveDate = day_start.date_naive();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE work_day = ?")
            .bind(day)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        Ok(count as u64)
    }
}
