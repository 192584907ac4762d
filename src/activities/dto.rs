use serde::{Deserialize, Serialize};

use super::repo_types::{Diaper, Feeding, Health, Sleep};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub scheduled_time: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

/// Newest entry of each kind.
#[derive(Debug, Serialize)]
pub struct LatestActivities {
    pub feeding: Option<Feeding>,
    pub sleep: Option<Sleep>,
    pub diaper: Option<Diaper>,
    pub health: Option<Health>,
}

#[derive(Debug, Serialize)]
pub struct RefreshStatus {
    pub refreshing: bool,
}
