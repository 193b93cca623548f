use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Which staff collection a reference resolves against. Ordinary employees
/// and clinical doctors share the attendance record type but live in
/// different source collections.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum StaffCategory {
    Employee,
    Doctor,
}

/// Tagged reference to a staff entity.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
pub struct StaffRef {
    pub category: StaffCategory,
    #[schema(example = 42, value_type = u64)]
    pub id: u64,
}

impl StaffRef {
    pub fn new(category: StaffCategory, id: u64) -> Self {
        Self { category, id }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    Staff = 2,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Staff),
            _ => None,
        }
    }
}
