//! Cross-platform filename sanitization for track names.

/// Characters that are invalid in filenames on at least one supported platform.
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Leaves room for a " (k)" suffix and an extension within NAME_MAX (255).
const BASE_MAX: usize = 200;

/// Sanitizes a candidate base name (no extension).
///
/// - Drops `<>:"/\|?*` and control characters
/// - Collapses runs of whitespace to one space
/// - Trims leading/trailing spaces, dashes and dots
/// - Limits length to 200 bytes on a char boundary
pub fn sanitize_base_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_space = false;

    for c in name.chars() {
        if c.is_whitespace() {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
        } else if FORBIDDEN.contains(&c) || c.is_control() {
            continue;
        } else {
            out.push(c);
            prev_space = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '-' || c == '.');

    if trimmed.len() > BASE_MAX {
        let mut take = BASE_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].trim_end().to_string()
    } else {
        trimmed.to_string()
    }
}
