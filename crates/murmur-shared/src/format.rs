//! Human-readable time and badge labels.
//!
//! All functions take `now` explicitly so callers (and tests) control the
//! clock.  Times are rendered in UTC; converting to the viewer's zone is left
//! to the UI.

use chrono::{DateTime, Utc};

use crate::constants::UNREAD_BADGE_CAP;

fn plural(n: i64, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// 12-hour clock time, e.g. `3:05 PM`.
pub fn message_time(at: DateTime<Utc>) -> String {
    at.format("%-I:%M %p").to_string()
}

/// Presence line for an offline peer.
pub fn last_seen_text(last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(last_seen) = last_seen else {
        return "Offline".to_string();
    };

    let diff = now - last_seen;
    let minutes = diff.num_minutes();
    let hours = diff.num_hours();
    let days = diff.num_days();

    if minutes < 1 {
        "Last seen just now".to_string()
    } else if minutes < 60 {
        format!("Last seen {} ago", plural(minutes, "min", "mins"))
    } else if hours < 24 {
        format!("Last seen {} ago", plural(hours, "hour", "hours"))
    } else if days == 1 {
        "Last seen yesterday".to_string()
    } else {
        format!("Last seen {}", last_seen.format("%b %-d, %Y, %-I:%M %p"))
    }
}

/// Relative timestamp shown under a message.
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - at).num_seconds();

    if seconds < 60 {
        return "Just now".to_string();
    }
    if seconds < 3_600 {
        return format!("{} ago", plural(seconds / 60, "min", "mins"));
    }
    if seconds < 86_400 {
        return format!("{} ago", plural(seconds / 3_600, "hour", "hours"));
    }
    if seconds < 604_800 {
        return format!("{} at {}", at.format("%a"), message_time(at));
    }
    format!("{} at {}", at.format("%b %-d, %Y"), message_time(at))
}

/// Sidebar badge: nothing for zero, the count up to the cap, `9+` beyond.
pub fn unread_badge(count: u32) -> Option<String> {
    match count {
        0 => None,
        n if n > UNREAD_BADGE_CAP => Some(format!("{UNREAD_BADGE_CAP}+")),
        n => Some(n.to_string()),
    }
}
