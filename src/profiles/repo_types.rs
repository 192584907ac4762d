use serde::{Deserialize, Serialize};

use crate::clock::now_ms;

/// Parent profile, stored at `users/{parentID}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Parent {
    #[serde(rename = "parentID")]
    pub parent_id: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub role: String,
    pub is_primary_guardian: bool,
    pub baby_id: String,
    pub created_at: i64,
}

impl Default for Parent {
    fn default() -> Self {
        Self {
            parent_id: String::new(),
            name: String::new(),
            surname: String::new(),
            email: String::new(),
            role: "Parent".into(),
            is_primary_guardian: true,
            baby_id: String::new(),
            created_at: now_ms(),
        }
    }
}

/// Baby profile, stored at `babies/{babyID}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Baby {
    #[serde(rename = "babyID")]
    pub baby_id: String,
    pub name: String,
    pub surname: String,
    pub date_of_birth: String, // yyyy-MM-dd
    pub gender: String,
    pub weight: f64,
    pub height: f64,
    pub created_at: i64,
}

impl Default for Baby {
    fn default() -> Self {
        Self {
            baby_id: String::new(),
            name: String::new(),
            surname: String::new(),
            date_of_birth: String::new(),
            gender: "Unknown".into(),
            weight: 0.0,
            height: 0.0,
            created_at: now_ms(),
        }
    }
}
