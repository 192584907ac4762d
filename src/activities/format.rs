use crate::clock::MILLIS_PER_MINUTE;

/// Coarse relative time, e.g. "3 hr ago".
pub fn time_ago(timestamp_ms: i64, now_ms: i64) -> String {
    let minutes = now_ms.saturating_sub(timestamp_ms) / MILLIS_PER_MINUTE;
    if minutes < 1 {
        return "Just now".to_string();
    }
    if minutes < 60 {
        return format!("{} min ago", minutes);
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{} hr ago", hours);
    }
    format!("{} days ago", hours / 24)
}

pub fn format_duration(minutes: i32) -> String {
    if minutes >= 60 {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else {
        format!("{} min", minutes)
    }
}

#[cfg(test)]
mod format_tests {
    use super::*;

    const NOW: i64 = 1_760_000_000_000;

    #[test]
    fn time_ago_steps() {
        assert_eq!(time_ago(NOW - 30_000, NOW), "Just now");
        assert_eq!(time_ago(NOW + 60_000, NOW), "Just now");
        assert_eq!(time_ago(NOW - 59 * 60_000, NOW), "59 min ago");
        assert_eq!(time_ago(NOW - 60 * 60_000, NOW), "1 hr ago");
        assert_eq!(time_ago(NOW - 25 * 60 * 60_000, NOW), "1 days ago");
        assert_eq!(time_ago(i64::MAX, NOW), "Just now");
        assert!(time_ago(i64::MIN, NOW).ends_with("days ago"));
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(45), "45 min");
        assert_eq!(format_duration(60), "1h 0m");
        assert_eq!(format_duration(135), "2h 15m");
    }
}
