//! Display labels for detected objects and polygons.
//!
//! Resolution order: the scene's own localized text, then the static
//! dictionary below (exact match, then substring containment), then the
//! raw label.

/// Shown when an overlay has no label at all.
pub const UNKNOWN_LABEL: &str = "Không xác định";

/// Raw detection label -> Vietnamese display label.
///
/// Order matters: substring lookups take the first entry that matches, so
/// multi-word keys are listed before the single words they contain.
pub const LABEL_DICTIONARY: &[(&str, &str)] = &[
    ("cell phone", "Điện thoại"),
    ("dining table", "Bàn ăn"),
    ("potted plant", "Chậu cây"),
    ("teddy bear", "Gấu bông"),
    ("wine glass", "Ly rượu"),
    ("hair drier", "Máy sấy tóc"),
    ("person", "Người"),
    ("chair", "Ghế"),
    ("couch", "Ghế sofa"),
    ("sofa", "Ghế sofa"),
    ("table", "Bàn"),
    ("desk", "Bàn làm việc"),
    ("bed", "Giường"),
    ("tv", "Tivi"),
    ("laptop", "Máy tính xách tay"),
    ("keyboard", "Bàn phím"),
    ("mouse", "Chuột"),
    ("phone", "Điện thoại"),
    ("book", "Sách"),
    ("clock", "Đồng hồ"),
    ("vase", "Bình hoa"),
    ("cup", "Cốc"),
    ("bottle", "Chai"),
    ("bowl", "Bát"),
    ("plant", "Cây"),
    ("window", "Cửa sổ"),
    ("door", "Cửa"),
    ("lamp", "Đèn"),
    ("mirror", "Gương"),
    ("shelf", "Kệ"),
    ("product", "Sản phẩm"),
    ("logo", "Logo"),
    ("face", "Khuôn mặt"),
    ("hand", "Bàn tay"),
];

/// Resolve the display label for an overlay.
pub fn localize(raw_label: &str, explicit_localized: Option<&str>) -> String {
    if let Some(localized) = explicit_localized.map(str::trim).filter(|s| !s.is_empty()) {
        return localized.to_string();
    }

    let trimmed = raw_label.trim();
    if trimmed.is_empty() {
        return UNKNOWN_LABEL.to_string();
    }

    lookup(trimmed)
        .map(str::to_string)
        .unwrap_or_else(|| raw_label.to_string())
}

/// Dictionary lookup: exact (case-insensitive) first, then containment in
/// either direction. Among containment matches the earliest dictionary
/// entry wins; that is a deliberate tie-break, not a ranking.
pub fn lookup(raw_label: &str) -> Option<&'static str> {
    let needle = raw_label.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    if let Some((_, display)) = LABEL_DICTIONARY.iter().find(|(key, _)| *key == needle) {
        return Some(display);
    }

    LABEL_DICTIONARY
        .iter()
        .find(|(key, _)| key.contains(needle.as_str()) || needle.contains(key))
        .map(|(_, display)| *display)
}
