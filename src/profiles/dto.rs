use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SelectBabyRequest {
    pub baby_id: Option<String>,
}

/// Current session scope as seen by the activity mirror.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub uid: Option<String>,
    pub baby_id: Option<String>,
}
