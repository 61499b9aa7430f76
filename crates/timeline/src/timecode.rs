/// `MM:SS.cc`, or `H:MM:SS.cc` from one hour on.
pub fn format_time(seconds: f64) -> String {
    let total_centis = (seconds.max(0.0) * 100.0).round() as u64;
    let centis = total_centis % 100;
    let total_secs = total_centis / 100;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}.{centis:02}")
    } else {
        format!("{minutes:02}:{secs:02}.{centis:02}")
    }
}

/// Accepts plain seconds (`12.5`), `MM:SS(.cc)` or `H:MM:SS(.cc)`.
pub fn parse_time(text: &str) -> Option<f64> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    let nums: Option<Vec<f64>> = parts.iter().map(|p| p.parse::<f64>().ok()).collect();
    let nums = nums?;
    if nums.iter().any(|n| !n.is_finite() || *n < 0.0) {
        return None;
    }
    let value = match nums.as_slice() {
        [s] => *s,
        [m, s] if *s < 60.0 => m * 60.0 + s,
        [h, m, s] if *m < 60.0 && *s < 60.0 => h * 3600.0 + m * 60.0 + s,
        _ => return None,
    };
    Some(value)
}
