//! Deterministic overlay colors.
//!
//! A server legend wins for any index it covers; otherwise colors cycle a
//! fixed palette whose first entry (red) marks the primary overlay.

use crate::template::LegendEntry;

/// Cycling palette. Index 0 is reserved as the primary color.
pub const PALETTE: [&str; 7] = [
    "#FF3B30", // primary red
    "#34C759", "#007AFF", "#FFCC00", "#AF52DE", "#FF9500", "#5AC8FA",
];

/// Color of the first overlay in every scene.
pub const PRIMARY_COLOR: &str = PALETTE[0];

/// Resolve the display color for the overlay at `index`.
pub fn color_for(index: usize, legend: Option<&[LegendEntry]>) -> String {
    legend
        .and_then(|entries| entries.get(index))
        .and_then(|entry| entry.color_hex.as_deref())
        .map(str::trim)
        .filter(|hex| is_hex_color(hex))
        .map(str::to_string)
        .unwrap_or_else(|| PALETTE[index % PALETTE.len()].to_string())
}

/// Accepts `#RGB`, `#RRGGBB` and `#RRGGBBAA`.
pub fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(digits) => {
            matches!(digits.len(), 3 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}
