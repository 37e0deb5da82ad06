use chrono::{DateTime, Utc};

/// Truncate a string to at most `max_len` bytes on a char boundary, noting the cut.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &s[..end], s.len())
}

/// Describe `at` relative to `now`: "just now", "5m ago", "in 2h", "3d ago".
pub fn format_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = at - now;
    let future = delta.num_seconds() > 0;
    let minutes = delta.num_minutes().abs();

    let amount = if minutes < 1 {
        return "just now".to_string();
    } else if minutes < 60 {
        format!("{}m", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        // Round up: 1h 30m+ becomes 2h
        if minutes % 60 >= 30 {
            format!("{}h", hours + 1)
        } else {
            format!("{}h", hours)
        }
    } else {
        let days = minutes / 1440;
        // Round up: 1d 12h+ becomes 2d
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d", days + 1)
        } else {
            format!("{}d", days)
        }
    };

    if future {
        format!("in {}", amount)
    } else {
        format!("{} ago", amount)
    }
}

/// Absolute timestamp for display
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
