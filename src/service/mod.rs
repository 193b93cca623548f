pub mod attendance;

use crate::store::MySqlAttendanceStore;

/// Concrete service type the HTTP layer shares via app data.
pub type SharedAttendanceService = attendance::AttendanceService<MySqlAttendanceStore>;
