const INVISIBLE: [char; 4] = ['\u{feff}', '\u{200b}', '\u{200c}', '\u{200d}'];

/// Strip byte-order marks and zero-width characters, collapse whitespace.
/// Case is preserved: name matching is case-sensitive.
pub(crate) fn normalize_name(value: &str) -> String {
    let cleaned = value.replace(INVISIBLE, "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| normalize_name(&value))
        .filter(|value| !value.is_empty())
}
