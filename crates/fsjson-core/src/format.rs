//! Display formatting and hashing helpers shared by every snapshot producer.

const UNITS: [&str; 6] = ["KB", "MB", "GB", "TB", "PB", "EB"];

/// Format a byte count with 1024-based units and two decimals.
///
/// Values under 1 KB are printed as a plain byte count (`"512 B"`).
pub fn human_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp < UNITS.len() - 1 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.2} {}", bytes as f64 / div as f64, UNITS[exp])
}

/// Placeholder hash for directories, derived from the name only.
pub fn name_hash(name: &str) -> String {
    blake3::hash(name.as_bytes()).to_hex().to_string()
}
