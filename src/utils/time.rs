use chrono::{DateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{} {}", n, unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// "2 minutes 5 seconds", or just "45 seconds" under a minute.
pub fn format_time(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let minutes = seconds / 60;
    let rest = seconds % 60;
    if minutes > 0 {
        format!("{} {}", plural(minutes, "minute"), plural(rest, "second"))
    } else {
        plural(rest, "second")
    }
}

/// "2m 5s", used in exports.
pub fn format_compact(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{}m {}s", seconds / 60, seconds % 60)
}

pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
