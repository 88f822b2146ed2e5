//! Human-readable rendering of raw telemetry numbers.
//!
//! Byte counts scale by 1024 while link speeds scale by 1000. Dashboards built
//! against the producer expect exactly these strings, so keep both bases.

const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Formats a non-negative byte count with the largest fitting unit up to TB.
///
/// The value is rounded to two decimals and trailing zeros are dropped, so
/// `1536` becomes `"1.5 KB"` and `1024` becomes `"1 KB"`. Counts beyond the
/// TB range stay in TB.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut scaled = bytes as f64;
    let mut unit = 0;
    while scaled >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }

    format!("{} {}", trim_fraction(format!("{scaled:.2}")), BYTE_UNITS[unit])
}

/// Formats a link speed given in bits per second as Kbps, Mbps or Gbps with
/// one decimal.
pub fn format_speed(bits_per_second: u64) -> String {
    let bps = bits_per_second as f64;
    if bps >= 1_000_000_000.0 {
        format!("{:.1} Gbps", bps / 1_000_000_000.0)
    } else if bps >= 1_000_000.0 {
        format!("{:.1} Mbps", bps / 1_000_000.0)
    } else {
        format!("{:.1} Kbps", bps / 1000.0)
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

fn trim_fraction(mut text: String) -> String {
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    text
}
