/// Trim surrounding whitespace, then drop non-breaking spaces and every other
/// non-ASCII character. Nothing is substituted in their place.
pub fn normalize(raw: &str) -> String {
    raw.trim().chars().filter(char::is_ascii).collect()
}

/// Like `normalize`, but also removes interior whitespace. Used for course
/// codes such as `COMP\u{a0}110.` so they join cleanly against requisite ids.
pub fn compact_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_whitespace())
        .collect()
}
