use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// A named wall-clock working window, resolved against a date by the shift resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: u64,
    pub company_id: u64,
    pub name: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub punch_in_rule: Option<String>,
    pub punch_out_rule: Option<String>,
}
