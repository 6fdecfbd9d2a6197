//! Display formatting for durations and paces.
//!
//! Both formatters return an empty string for missing, non-finite or
//! non-positive input so tables can render the cell blank.

fn positive_whole_seconds(value: Option<f64>) -> Option<i64> {
    let v = value?;
    if !v.is_finite() || v <= 0.0 {
        return None;
    }
    Some(v.round() as i64)
}

/// `H:MM:SS`, e.g. `5400.0` → `"1:30:00"`.
pub fn format_seconds_to_hms(seconds: Option<f64>) -> String {
    match positive_whole_seconds(seconds) {
        Some(total) => {
            let h = total / 3600;
            let m = (total % 3600) / 60;
            let s = total % 60;
            format!("{h}:{m:02}:{s:02}")
        }
        None => String::new(),
    }
}

/// `MM:SS min/km`, e.g. `330.0` → `"05:30 min/km"`.
pub fn format_pace(sec_per_km: Option<f64>) -> String {
    match positive_whole_seconds(sec_per_km) {
        Some(total) => format!("{:02}:{:02} min/km", total / 60, total % 60),
        None => String::new(),
    }
}
