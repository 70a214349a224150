//! BirdNET upstream constants and the footer data-source text.

/// Origin of the BirdNET data provider.
pub const UPSTREAM_ORIGIN: &str = "https://birdnet.cornell.edu";

/// Live statistics endpoint.
pub const API_URL: &str = "https://birdnet.cornell.edu/api2/requeststats";

/// Path of the statistics endpoint on the upstream origin.
pub const API_PATH: &str = "/api2/requeststats";

/// Path prefix of species images on the upstream origin.
pub const BIRD_IMAGE_PREFIX: &str = "/api2/bird/";

/// Shared application icon.
pub const ICON_URL: &str = "https://birdnet.cornell.edu/img/logo-birdnet-circle.png";

/// Theme colour used by every front-end.
pub const THEME_COLOR: &str = "#1976d2";

/// Window covered by the live statistics, in hours.
pub const DATA_WINDOW_HOURS: u32 = 24;

/// Format the footer text describing live BirdNET data.
///
/// Non-finite counts render as `0`; a non-finite or non-positive window
/// falls back to [`DATA_WINDOW_HOURS`].
pub fn format_live_data(total_observations: f64, unique_species: f64, hours: Option<f64>) -> String {
    let hours = match hours {
        Some(h) if h.is_finite() && h > 0.0 => h.round().to_string(),
        _ => DATA_WINDOW_HOURS.to_string(),
    };
    format!(
        "Live data from BirdNET ({} observations, {} species in last {}h)",
        format_count(total_observations),
        format_count(unique_species),
        hours
    )
}

fn format_count(value: f64) -> String {
    if value.is_finite() {
        format_grouped(value)
    } else {
        "0".to_string()
    }
}

/// en-US number formatting: comma thousands separators, at most three
/// fraction digits.
fn format_grouped(value: f64) -> String {
    let rendered = format!("{:.3}", value.abs());
    let (int_part, frac_part) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let negative = value < 0.0 && (grouped != "0" || !frac_part.is_empty());
    let sign = if negative { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac_part}")
    }
}
