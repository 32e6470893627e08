use chrono::Duration;

/// Renders a span as `HH:MM:SS`. Hours are not wrapped at 24; negative spans render as zero.
pub fn format_hms(span: Duration) -> String {
    let total = span.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Renders the magnitude of a span as `Xh Ym`, dropping seconds.
pub fn format_hm(span: Duration) -> String {
    let minutes = span.num_minutes().abs();
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// `Xh Ym remaining` before the deadline, `Xh Ym overdue` after it.
pub fn format_remaining(remaining: Duration) -> String {
    if remaining < Duration::zero() {
        format!("{} overdue", format_hm(remaining))
    } else {
        format!("{} remaining", format_hm(remaining))
    }
}
