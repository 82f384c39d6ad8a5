//! Display formatting suited to first-grade readers

use chrono::{DateTime, Datelike, Local, Utc};

/// Relative description of `timestamp` as seen now
pub fn format_relative_time(timestamp: DateTime<Utc>) -> String {
    format_relative_time_from(timestamp, Utc::now())
}

/// Relative description of `timestamp` as seen at `now`
///
/// Older than a week falls back to the local calendar date ("3月5日").
pub fn format_relative_time_from(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(timestamp);
    let secs = elapsed.num_seconds();
    let mins = secs.div_euclid(60);
    let hours = mins.div_euclid(60);
    let days = hours.div_euclid(24);

    if secs < 60 {
        return "刚刚".to_string();
    }
    if mins < 60 {
        return format!("{}分钟前", mins);
    }
    if hours < 24 {
        return format!("{}小时前", hours);
    }
    match days {
        1 => "昨天".to_string(),
        2 => "前天".to_string(),
        d if d < 7 => format!("{}天前", d),
        _ => {
            let local = timestamp.with_timezone(&Local);
            format!("{}月{}日", local.month(), local.day())
        }
    }
}

/// Study time such as "45秒", "1分30秒" or "1小时1分"
///
/// Seconds are dropped once the duration reaches an hour.
pub fn format_study_duration(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{}秒", seconds);
    }

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}小时", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}分", minutes));
    }
    if secs > 0 && hours == 0 {
        out.push_str(&format!("{}秒", secs));
    }
    out
}

/// Rounded percentage, "0%" when there is nothing to measure against
pub fn format_progress(current: u64, total: u64) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    let percentage = (current as f64 / total as f64 * 100.0).round();
    format!("{}%", percentage as i64)
}

const CHINESE_DIGITS: [&str; 11] = ["零", "一", "二", "三", "四", "五", "六", "七", "八", "九", "十"];

/// Chinese numeral up to ten; larger numbers stay as digits
pub fn format_number_chinese(num: u32) -> String {
    CHINESE_DIGITS
        .get(num as usize)
        .map(|s| s.to_string())
        .unwrap_or_else(|| num.to_string())
}
