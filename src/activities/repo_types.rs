use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::clock::now_ms;
use crate::store::{Direction, Query};

/// A record kind mirrored from a per-user collection and scoped to one baby.
pub trait ActivityRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
    const ORDER_FIELD: &'static str;
    const DIRECTION: Direction;
    /// Human name used in log lines and confirmations.
    const KIND: &'static str;
    /// Reload every mirrored collection once a write of this kind succeeds.
    const REFRESH_AFTER_WRITE: bool = false;

    /// Every epoch-millisecond time the record carries.
    fn times(&self) -> Vec<i64>;

    /// Assigns the generated id and the owning baby before the first write.
    fn stamp(self, entry_id: String, baby_id: String, now_ms: i64) -> Self;

    fn scoped_query(baby_id: &str) -> Query {
        Query::where_eq("babyID", baby_id).order_by(Self::ORDER_FIELD, Self::DIRECTION)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Feeding {
    #[serde(rename = "entryID")]
    pub entry_id: String,
    #[serde(rename = "babyID")]
    pub baby_id: String,
    #[serde(default = "now_ms")]
    pub timestamp: i64,
    pub feeding_type: String,
    pub side: Option<String>,
    pub amount: Option<f64>,
    pub amount_unit: Option<String>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Sleep {
    #[serde(rename = "entryID")]
    pub entry_id: String,
    #[serde(rename = "babyID")]
    pub baby_id: String,
    #[serde(default = "now_ms")]
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub duration_minutes: i32,
    pub sleep_location: Option<String>,
    pub is_nap: bool,
    pub notes: Option<String>,
}

impl Default for Sleep {
    fn default() -> Self {
        Self {
            entry_id: String::new(),
            baby_id: String::new(),
            start_time: 0,
            end_time: None,
            duration_minutes: 0,
            sleep_location: None,
            is_nap: true,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Diaper {
    #[serde(rename = "entryID")]
    pub entry_id: String,
    #[serde(rename = "babyID")]
    pub baby_id: String,
    #[serde(default = "now_ms")]
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: String, // WET, DIRTY, MIXED
    pub color: Option<String>,
    pub consistency: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Health {
    #[serde(rename = "entryID")]
    pub entry_id: String,
    #[serde(rename = "babyID")]
    pub baby_id: String,
    #[serde(default = "now_ms")]
    pub timestamp: i64,
    pub metric_type: String, // TEMPERATURE, WEIGHT, HEIGHT
    pub value: f64,
    pub unit: String,
    pub medication_name: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScheduledActivity {
    pub id: String,
    #[serde(rename = "babyID")]
    pub baby_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub scheduled_time: i64,
    pub notes: Option<String>,
}

impl ActivityRecord for Feeding {
    const COLLECTION: &'static str = "feedings";
    const ORDER_FIELD: &'static str = "timestamp";
    const DIRECTION: Direction = Direction::Descending;
    const KIND: &'static str = "Feeding";

    fn times(&self) -> Vec<i64> {
        vec![self.timestamp]
    }
    fn stamp(self, entry_id: String, baby_id: String, _now_ms: i64) -> Self {
        Self { entry_id, baby_id, ..self }
    }
}

impl ActivityRecord for Sleep {
    const COLLECTION: &'static str = "sleeps";
    const ORDER_FIELD: &'static str = "startTime";
    const DIRECTION: Direction = Direction::Descending;
    const KIND: &'static str = "Sleep";

    fn times(&self) -> Vec<i64> {
        std::iter::once(self.start_time).chain(self.end_time).collect()
    }
    fn stamp(self, entry_id: String, baby_id: String, _now_ms: i64) -> Self {
        Self { entry_id, baby_id, ..self }
    }
}

impl ActivityRecord for Diaper {
    const COLLECTION: &'static str = "diapers";
    const ORDER_FIELD: &'static str = "timestamp";
    const DIRECTION: Direction = Direction::Descending;
    const KIND: &'static str = "Diaper";
    const REFRESH_AFTER_WRITE: bool = true;

    fn times(&self) -> Vec<i64> {
        vec![self.timestamp]
    }
    // diapers are always stamped with the write time
    fn stamp(self, entry_id: String, baby_id: String, now_ms: i64) -> Self {
        Self {
            entry_id,
            baby_id,
            timestamp: now_ms,
            ..self
        }
    }
}

impl ActivityRecord for Health {
    const COLLECTION: &'static str = "health";
    const ORDER_FIELD: &'static str = "timestamp";
    const DIRECTION: Direction = Direction::Descending;
    const KIND: &'static str = "Health";

    fn times(&self) -> Vec<i64> {
        vec![self.timestamp]
    }
    fn stamp(self, entry_id: String, baby_id: String, _now_ms: i64) -> Self {
        Self { entry_id, baby_id, ..self }
    }
}

impl ActivityRecord for ScheduledActivity {
    const COLLECTION: &'static str = "scheduledActivities";
    const ORDER_FIELD: &'static str = "scheduledTime";
    const DIRECTION: Direction = Direction::Ascending;
    const KIND: &'static str = "Scheduled";

    fn times(&self) -> Vec<i64> {
        vec![self.scheduled_time]
    }
    fn stamp(self, id: String, baby_id: String, _now_ms: i64) -> Self {
        Self { id, baby_id, ..self }
    }
}

#[cfg(test)]
mod record_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stored_field_names() {
        let d = Diaper {
            entry_id: "e".into(),
            baby_id: "b".into(),
            kind: "WET".into(),
            ..Diaper::default()
        };
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["entryID"], "e");
        assert_eq!(v["babyID"], "b");
        assert_eq!(v["type"], "WET");
        assert!(v["color"].is_null());

        let s = serde_json::to_value(Sleep::default()).unwrap();
        assert_eq!(s["isNap"], true);
        assert!(s.get("startTime").is_some());
    }

    #[test]
    fn diaper_stamp_overrides_caller_time() {
        let d = Diaper {
            timestamp: 5,
            ..Diaper::default()
        }
        .stamp("id1".into(), "b1".into(), 1_000);
        assert_eq!(d.timestamp, 1_000);
        assert_eq!(d.entry_id, "id1");
        assert_eq!(d.baby_id, "b1");
    }

    #[test]
    fn feeding_stamp_keeps_caller_time() {
        let f = Feeding {
            timestamp: 5,
            ..Feeding::default()
        }
        .stamp("id1".into(), "b1".into(), 1_000);
        assert_eq!(f.timestamp, 5);
    }

    #[test]
    fn missing_time_means_now() {
        let before = now_ms();
        let f: Feeding = serde_json::from_value(json!({"feedingType": "BOTTLE"})).unwrap();
        assert!(f.timestamp >= before);
        let s: Sleep = serde_json::from_value(json!({"endTime": 9})).unwrap();
        assert!(s.start_time >= before);
        assert_eq!(s.times(), vec![s.start_time, 9]);
        let h: Health = serde_json::from_value(json!({"timestamp": 12})).unwrap();
        assert_eq!(h.timestamp, 12);
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let r = serde_json::from_value::<Feeding>(json!({"timestamp": "yesterday"}));
        assert!(r.is_err());
    }

    #[test]
    fn scheduled_query_is_ascending() {
        let q = ScheduledActivity::scoped_query("b1");
        assert_eq!(q.order_by, Some(("scheduledTime".to_string(), Direction::Ascending)));
        assert_eq!(q.equals, json!("b1"));
    }
}
