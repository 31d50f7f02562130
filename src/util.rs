use std::time::Duration;
use time_humanize::{Accuracy, HumanTime, Tense};

/// `mm:ss`, minutes unbounded.
pub fn format_elapsed(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Elapsed time with hundredths, e.g. `1:02.35` or `9.80s`.
pub fn format_record_time(ms: u64) -> String {
    let hundredths = (ms % 1000) / 10;
    let secs = ms / 1000;
    match secs / 60 {
        0 => format!("{}.{:02}s", secs, hundredths),
        mins => format!("{}:{:02}.{:02}", mins, secs % 60, hundredths),
    }
}

/// "3 days ago" style rendering of a completion timestamp.
pub fn humanize_completed_at(completed_at_ms: i64, now_ms: i64) -> String {
    let ago = now_ms.saturating_sub(completed_at_ms).max(0) as u64;
    HumanTime::from(Duration::from_millis(ago)).to_text_en(Accuracy::Rough, Tense::Past)
}
