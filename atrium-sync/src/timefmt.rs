//! 12-hour clock labels for thread timestamps.

use chrono::{DateTime, TimeZone, Timelike};

/// Hour on the 12-hour clock, without padding: 0 and 12 render as "12",
/// 13 renders as "1".
pub fn hour_label(hour: u32) -> String {
    let twelve = hour % 12;
    if twelve == 0 {
        "12".to_string()
    } else {
        twelve.to_string()
    }
}

/// Minute, always two digits.
pub fn minute_label(minute: u32) -> String {
    format!("{minute:02}")
}

/// "am" for hours 0..=11, "pm" for 12..=23.
pub fn meridiem(hour: u32) -> &'static str {
    if hour < 12 {
        "am"
    } else {
        "pm"
    }
}

/// Render a timestamp as e.g. "12:05 am" or "1:30 pm", in the
/// timestamp's own zone.
pub fn format_time<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    let hour = at.hour();
    format!(
        "{}:{} {}",
        hour_label(hour),
        minute_label(at.minute()),
        meridiem(hour)
    )
}

// ===================================================================
// Tests
// ===================================================================
