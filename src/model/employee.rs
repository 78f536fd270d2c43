use serde::{Deserialize, Serialize};

/// The slice of the employee directory the attendance engine reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub id: u64,
    pub company_id: Option<u64>,
    pub branch_id: Option<u64>,
    pub first_name: String,
    pub last_name: String,
    /// Device identifier the employee is currently bound to.
    pub device_id: Option<String>,
    pub status: String,
}

impl EmployeeProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}
